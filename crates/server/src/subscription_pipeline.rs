//! Turning gateway results into payment and subscription state.

use marquee_billing::{TransactionStatus, TransactionVerification, period_end};
use marquee_core::error::ApiError;
use marquee_core::types::{PaymentStatus, PlanInterval};
use marquee_db::repo::payments::{self, PaymentRow};
use marquee_db::repo::{plans, subscriptions};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::AppError;

/// What applying a gateway result did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Payment completed and the subscription now runs until `period_end`.
    Activated { period_start: i64, period_end: i64 },
    /// The payment was already completed; nothing changed.
    AlreadyCompleted,
    /// The gateway has not settled the transaction yet.
    Pending,
    /// The payment was marked failed.
    Failed { reason: String },
}

impl PaymentOutcome {
    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            Self::Activated { .. } | Self::AlreadyCompleted => PaymentStatus::Completed,
            Self::Pending => PaymentStatus::Pending,
            Self::Failed { .. } => PaymentStatus::Failed,
        }
    }
}

/// Apply a verified gateway result to a payment. Safe to call repeatedly for the
/// same transaction: only the first successful call grants a period.
pub async fn apply_verification(
    db: &SqlitePool,
    payment: &PaymentRow,
    verification: &TransactionVerification,
) -> Result<PaymentOutcome, AppError> {
    if payment.status == PaymentStatus::Completed.as_str() {
        return Ok(PaymentOutcome::AlreadyCompleted);
    }

    match verification.status {
        TransactionStatus::Pending => return Ok(PaymentOutcome::Pending),
        TransactionStatus::Failed => {
            return fail(db, payment, "gateway reported the transaction as failed").await;
        }
        TransactionStatus::Success => {}
    }

    if verification.amount_cents < payment.amount_cents {
        let reason = format!(
            "paid amount {} is below the expected {}",
            verification.amount_cents, payment.amount_cents
        );
        return fail(db, payment, &reason).await;
    }
    if !verification.currency.is_empty()
        && !verification.currency.eq_ignore_ascii_case(&payment.currency)
    {
        let reason = format!(
            "paid currency {} does not match {}",
            verification.currency, payment.currency
        );
        return fail(db, payment, &reason).await;
    }

    let mut tx = db.begin().await?;

    let completed =
        payments::mark_completed(&mut *tx, &payment.tx_ref, verification.reference.as_deref())
            .await?;
    if !completed {
        // Another delivery got here first.
        tx.rollback().await?;
        return Ok(PaymentOutcome::AlreadyCompleted);
    }

    let plan = plans::get_plan(&mut *tx, &payment.plan_id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("plan {} missing", payment.plan_id)))?;
    let interval = PlanInterval::parse(&plan.interval)
        .ok_or_else(|| ApiError::Internal(format!("plan {} has bad interval", plan.id)))?;

    let now = marquee_db::now_ts();
    let existing = subscriptions::get_for_user(&mut *tx, &payment.user_id).await?;
    let period_start = match existing {
        Some(ref sub) if sub.plan_id == plan.id && sub.grants_access(now) => sub.current_period_end,
        _ => now,
    };
    let end = period_end(period_start, interval);

    subscriptions::upsert_active(&mut *tx, &payment.user_id, &plan.id, period_start, end).await?;
    tx.commit().await?;

    info!(
        tx_ref = %payment.tx_ref,
        user_id = %payment.user_id,
        plan = %plan.name,
        period_end = end,
        "payment completed, subscription active"
    );

    Ok(PaymentOutcome::Activated {
        period_start,
        period_end: end,
    })
}

async fn fail(
    db: &SqlitePool,
    payment: &PaymentRow,
    reason: &str,
) -> Result<PaymentOutcome, AppError> {
    if payments::mark_failed(db, &payment.tx_ref, reason).await? {
        warn!(tx_ref = %payment.tx_ref, reason = %reason, "payment failed");
    }
    Ok(PaymentOutcome::Failed {
        reason: reason.to_string(),
    })
}

/// Grant a complimentary period on `plan_id` starting now (admin action).
pub async fn grant_complimentary(
    db: &SqlitePool,
    user_id: &str,
    plan: &plans::PlanRow,
) -> Result<i64, AppError> {
    let interval = PlanInterval::parse(&plan.interval)
        .ok_or_else(|| ApiError::Internal(format!("plan {} has bad interval", plan.id)))?;
    let now = marquee_db::now_ts();
    let end = period_end(now, interval);
    subscriptions::upsert_active(db, user_id, &plan.id, now, end).await?;
    info!(user_id = %user_id, plan = %plan.name, "complimentary subscription granted");
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_db::repo::{plans::PlanFields, users};

    async fn setup() -> (SqlitePool, String, String) {
        let pool = marquee_db::connect(":memory:").await.unwrap();
        marquee_db::migrate::run(&pool).await.unwrap();
        let user = users::create_user(&pool, "payer@example.com", None, None, "user")
            .await
            .unwrap();
        let plan = plans::create_plan(
            &pool,
            &PlanFields {
                name: "Premium".into(),
                description: None,
                price_cents: 29900,
                currency: "ETB".into(),
                interval: "month".into(),
                features: vec!["4K".into()],
                is_active: true,
            },
        )
        .await
        .unwrap();
        (pool, user.id, plan.id)
    }

    fn success(amount_cents: i64) -> TransactionVerification {
        TransactionVerification {
            status: TransactionStatus::Success,
            amount_cents,
            currency: "ETB".into(),
            reference: Some("CHAPA-REF".into()),
        }
    }

    async fn pending_payment(pool: &SqlitePool, user_id: &str, plan_id: &str) -> PaymentRow {
        let tx_ref = marquee_billing::generate_tx_ref();
        payments::create_pending(pool, user_id, plan_id, &tx_ref, 29900, "ETB")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn success_activates_once() {
        let (pool, user_id, plan_id) = setup().await;
        let payment = pending_payment(&pool, &user_id, &plan_id).await;

        let outcome = apply_verification(&pool, &payment, &success(29900)).await.unwrap();
        assert!(matches!(outcome, PaymentOutcome::Activated { .. }));

        // the stale row still says pending; the conditional update catches the replay
        let replay = apply_verification(&pool, &payment, &success(29900)).await.unwrap();
        assert_eq!(replay, PaymentOutcome::AlreadyCompleted);

        let stored = payments::get_by_tx_ref(&pool, &payment.tx_ref).await.unwrap().unwrap();
        assert_eq!(stored.status, "completed");
        assert_eq!(stored.provider_reference.as_deref(), Some("CHAPA-REF"));
    }

    #[tokio::test]
    async fn renewal_extends_from_current_period_end() {
        let (pool, user_id, plan_id) = setup().await;

        let first = pending_payment(&pool, &user_id, &plan_id).await;
        let PaymentOutcome::Activated { period_end: end1, .. } =
            apply_verification(&pool, &first, &success(29900)).await.unwrap()
        else {
            panic!("expected activation");
        };

        let second = pending_payment(&pool, &user_id, &plan_id).await;
        let PaymentOutcome::Activated { period_start, .. } =
            apply_verification(&pool, &second, &success(29900)).await.unwrap()
        else {
            panic!("expected activation");
        };
        assert_eq!(period_start, end1);
    }

    #[tokio::test]
    async fn underpayment_fails_without_granting() {
        let (pool, user_id, plan_id) = setup().await;
        let payment = pending_payment(&pool, &user_id, &plan_id).await;

        let outcome = apply_verification(&pool, &payment, &success(100)).await.unwrap();
        assert!(matches!(outcome, PaymentOutcome::Failed { .. }));
        assert!(subscriptions::get_for_user(&pool, &user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pending_changes_nothing() {
        let (pool, user_id, plan_id) = setup().await;
        let payment = pending_payment(&pool, &user_id, &plan_id).await;
        let mut v = success(29900);
        v.status = TransactionStatus::Pending;

        assert_eq!(
            apply_verification(&pool, &payment, &v).await.unwrap(),
            PaymentOutcome::Pending
        );
        let stored = payments::get_by_tx_ref(&pool, &payment.tx_ref).await.unwrap().unwrap();
        assert_eq!(stored.status, "pending");
    }
}
