use sqlx::{Executor, Sqlite, SqlitePool};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub tx_ref: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub provider_reference: Option<String>,
    pub checkout_url: Option<String>,
    pub failure_reason: Option<String>,
    pub created_ts: i64,
    pub updated_ts: i64,
}

const PAYMENT_COLUMNS: &str = "id, user_id, plan_id, tx_ref, amount_cents, currency, status, \
                               provider_reference, checkout_url, failure_reason, created_ts, updated_ts";

/// Record a pending payment before redirecting the user to checkout.
pub async fn create_pending(
    pool: &SqlitePool,
    user_id: &str,
    plan_id: &str,
    tx_ref: &str,
    amount_cents: i64,
    currency: &str,
) -> Result<PaymentRow, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = crate::now_ts();

    sqlx::query(
        "INSERT INTO payment (id, user_id, plan_id, tx_ref, amount_cents, currency, status, \
         created_ts, updated_ts) VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(plan_id)
    .bind(tx_ref)
    .bind(amount_cents)
    .bind(currency)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(PaymentRow {
        id,
        user_id: user_id.to_string(),
        plan_id: plan_id.to_string(),
        tx_ref: tx_ref.to_string(),
        amount_cents,
        currency: currency.to_string(),
        status: "pending".to_string(),
        provider_reference: None,
        checkout_url: None,
        failure_reason: None,
        created_ts: now,
        updated_ts: now,
    })
}

pub async fn set_checkout_url(
    pool: &SqlitePool,
    tx_ref: &str,
    checkout_url: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payment SET checkout_url = ?, updated_ts = ? WHERE tx_ref = ?")
        .bind(checkout_url)
        .bind(crate::now_ts())
        .bind(tx_ref)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_by_tx_ref<'e, E>(db: E, tx_ref: &str) -> Result<Option<PaymentRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(&format!("SELECT {PAYMENT_COLUMNS} FROM payment WHERE tx_ref = ?"))
        .bind(tx_ref)
        .fetch_optional(db)
        .await
}

/// Transition a payment to `completed`. Returns false if it already was,
/// so concurrent confirmations of the same tx_ref apply only once.
pub async fn mark_completed<'e, E>(
    db: E,
    tx_ref: &str,
    provider_reference: Option<&str>,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE payment SET status = 'completed', provider_reference = coalesce(?, provider_reference), \
         failure_reason = NULL, updated_ts = ? WHERE tx_ref = ? AND status != 'completed'",
    )
    .bind(provider_reference)
    .bind(crate::now_ts())
    .bind(tx_ref)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Mark a not-yet-completed payment as failed.
pub async fn mark_failed<'e, E>(db: E, tx_ref: &str, reason: &str) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE payment SET status = 'failed', failure_reason = ?, updated_ts = ? \
         WHERE tx_ref = ? AND status != 'completed'",
    )
    .bind(reason)
    .bind(crate::now_ts())
    .bind(tx_ref)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Fail pending payments created before `cutoff_ts`. Returns how many changed.
pub async fn fail_stale_pending(pool: &SqlitePool, cutoff_ts: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE payment SET status = 'failed', failure_reason = 'checkout abandoned', updated_ts = ? \
         WHERE status = 'pending' AND created_ts < ?",
    )
    .bind(crate::now_ts())
    .bind(cutoff_ts)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Payments, newest first, optionally scoped to one user and/or status.
pub async fn list_payments(
    pool: &SqlitePool,
    user_id: Option<&str>,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<PaymentRow>, i64), sqlx::Error> {
    let filter = "WHERE (?1 IS NULL OR user_id = ?1) AND (?2 IS NULL OR status = ?2)";

    let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payment {filter} \
         ORDER BY created_ts DESC, id LIMIT ?3 OFFSET ?4"
    ))
    .bind(user_id)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM payment {filter}"))
        .bind(user_id)
        .bind(status)
        .fetch_one(pool)
        .await?;

    Ok((rows, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{plans, users};

    #[tokio::test]
    async fn completion_happens_once() {
        let pool = crate::connect(":memory:").await.unwrap();
        crate::migrate::run(&pool).await.unwrap();
        let user = users::create_user(&pool, "pay@example.com", None, None, "user")
            .await
            .unwrap();
        let plan = plans::create_plan(
            &pool,
            &plans::PlanFields {
                name: "Basic".into(),
                description: None,
                price_cents: 10000,
                currency: "ETB".into(),
                interval: "month".into(),
                features: vec![],
                is_active: true,
            },
        )
        .await
        .unwrap();

        create_pending(&pool, &user.id, &plan.id, "mq-abc", 10000, "ETB")
            .await
            .unwrap();

        assert!(mark_completed(&pool, "mq-abc", Some("CHref")).await.unwrap());
        assert!(!mark_completed(&pool, "mq-abc", Some("CHref")).await.unwrap());
        // completed payments never regress to failed
        assert!(!mark_failed(&pool, "mq-abc", "late failure").await.unwrap());

        let payment = get_by_tx_ref(&pool, "mq-abc").await.unwrap().unwrap();
        assert_eq!(payment.status, "completed");
        assert_eq!(payment.provider_reference.as_deref(), Some("CHref"));

        let (mine, total) = list_payments(&pool, Some(&user.id), None, 10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(mine[0].tx_ref, "mq-abc");
    }
}
