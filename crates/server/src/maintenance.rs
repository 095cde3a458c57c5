use std::time::Duration;

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::rate_limit::RateLimiter;

/// Pending checkouts older than this are treated as abandoned.
pub const STALE_PAYMENT_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_subscriptions: u64,
    pub abandoned_payments: u64,
}

/// One maintenance pass: expire lapsed subscriptions and fail abandoned checkouts.
pub async fn sweep(db: &SqlitePool, now: i64) -> Result<SweepReport, sqlx::Error> {
    let expired_subscriptions = marquee_db::repo::subscriptions::expire_lapsed(db, now).await?;
    let abandoned_payments =
        marquee_db::repo::payments::fail_stale_pending(db, now - STALE_PAYMENT_SECS).await?;
    Ok(SweepReport {
        expired_subscriptions,
        abandoned_payments,
    })
}

/// Run `sweep` forever on a fixed interval.
pub fn spawn(db: SqlitePool, limiter: RateLimiter, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;

            match sweep(&db, marquee_db::now_ts()).await {
                Ok(report) if report != SweepReport::default() => info!(
                    expired_subscriptions = report.expired_subscriptions,
                    abandoned_payments = report.abandoned_payments,
                    "maintenance sweep"
                ),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "maintenance sweep failed"),
            }

            limiter.prune().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_db::repo::{payments, plans, subscriptions, users};

    #[tokio::test]
    async fn sweep_expires_and_abandons() {
        let pool = marquee_db::connect(":memory:").await.unwrap();
        marquee_db::migrate::run(&pool).await.unwrap();
        let user = users::create_user(&pool, "late@example.com", None, None, "user")
            .await
            .unwrap();
        let plan = plans::create_plan(
            &pool,
            &plans::PlanFields {
                name: "Basic".into(),
                description: None,
                price_cents: 9900,
                currency: "ETB".into(),
                interval: "month".into(),
                features: vec![],
                is_active: true,
            },
        )
        .await
        .unwrap();

        subscriptions::upsert_active(&pool, &user.id, &plan.id, 0, 1_000).await.unwrap();
        payments::create_pending(&pool, &user.id, &plan.id, "mq-old", 9900, "ETB")
            .await
            .unwrap();

        let far_future = marquee_db::now_ts() + 2 * STALE_PAYMENT_SECS;
        let report = sweep(&pool, far_future).await.unwrap();
        assert_eq!(report.expired_subscriptions, 1);
        assert_eq!(report.abandoned_payments, 1);

        assert_eq!(sweep(&pool, far_future).await.unwrap(), SweepReport::default());
    }
}
