use sqlx::{Executor, Sqlite, SqlitePool};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionRow {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub status: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
    pub created_ts: i64,
    pub updated_ts: i64,
}

impl SubscriptionRow {
    /// Active or canceled-but-paid-up subscriptions grant access until the period ends.
    pub fn grants_access(&self, now: i64) -> bool {
        (self.status == "active" || self.status == "canceled") && self.current_period_end > now
    }
}

/// Subscription joined with its user and plan (admin listing).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionListRow {
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub plan_id: String,
    pub plan_name: String,
    pub status: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
    pub updated_ts: i64,
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, status, current_period_start, \
                                    current_period_end, cancel_at_period_end, created_ts, updated_ts";

pub async fn get_for_user<'e, E>(db: E, user_id: &str) -> Result<Option<SubscriptionRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscription WHERE user_id = ?"
    ))
    .bind(user_id)
    .fetch_optional(db)
    .await
}

/// Create or replace the user's subscription with a fresh active period.
pub async fn upsert_active<'e, E>(
    db: E,
    user_id: &str,
    plan_id: &str,
    period_start: i64,
    period_end: i64,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = crate::now_ts();
    sqlx::query(
        "INSERT INTO subscription (id, user_id, plan_id, status, current_period_start, \
         current_period_end, cancel_at_period_end, created_ts, updated_ts) \
         VALUES (?, ?, ?, 'active', ?, ?, 0, ?, ?) \
         ON CONFLICT(user_id) DO UPDATE SET \
         plan_id = excluded.plan_id, status = 'active', \
         current_period_start = excluded.current_period_start, \
         current_period_end = excluded.current_period_end, \
         cancel_at_period_end = 0, updated_ts = excluded.updated_ts",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(plan_id)
    .bind(period_start)
    .bind(period_end)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;
    Ok(())
}

/// Flip between `active` and `canceled` while the period is still running.
pub async fn set_cancel_at_period_end(
    pool: &SqlitePool,
    user_id: &str,
    cancel: bool,
) -> Result<bool, sqlx::Error> {
    let (from, to) = if cancel {
        ("active", "canceled")
    } else {
        ("canceled", "active")
    };
    let now = crate::now_ts();
    let result = sqlx::query(
        "UPDATE subscription SET status = ?, cancel_at_period_end = ?, updated_ts = ? \
         WHERE user_id = ? AND status = ? AND current_period_end > ?",
    )
    .bind(to)
    .bind(cancel)
    .bind(now)
    .bind(user_id)
    .bind(from)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// End a subscription immediately.
pub async fn revoke(pool: &SqlitePool, user_id: &str) -> Result<bool, sqlx::Error> {
    let now = crate::now_ts();
    let result = sqlx::query(
        "UPDATE subscription SET status = 'expired', current_period_end = min(current_period_end, ?), \
         updated_ts = ? WHERE user_id = ? AND status != 'expired'",
    )
    .bind(now)
    .bind(now)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Expire one user's subscription if its period has ended.
pub async fn expire_if_lapsed(pool: &SqlitePool, user_id: &str, now: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE subscription SET status = 'expired', updated_ts = ? \
         WHERE user_id = ? AND status IN ('active', 'canceled') AND current_period_end <= ?",
    )
    .bind(now)
    .bind(user_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Mark every lapsed active/canceled subscription as expired. Returns how many changed.
pub async fn expire_lapsed(pool: &SqlitePool, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE subscription SET status = 'expired', updated_ts = ? \
         WHERE status IN ('active', 'canceled') AND current_period_end <= ?",
    )
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn list_subscriptions(
    pool: &SqlitePool,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<SubscriptionListRow>, i64), sqlx::Error> {
    let rows: Vec<SubscriptionListRow> = sqlx::query_as(
        "SELECT s.id, s.user_id, u.email AS user_email, s.plan_id, p.name AS plan_name, s.status, \
         s.current_period_start, s.current_period_end, s.cancel_at_period_end, s.updated_ts \
         FROM subscription s JOIN user u ON u.id = s.user_id JOIN plan p ON p.id = s.plan_id \
         WHERE (?1 IS NULL OR s.status = ?1) \
         ORDER BY s.updated_ts DESC, s.id LIMIT ?2 OFFSET ?3",
    )
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM subscription WHERE (?1 IS NULL OR status = ?1)")
            .bind(status)
            .fetch_one(pool)
            .await?;

    Ok((rows, total))
}
