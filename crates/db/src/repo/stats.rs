//! Aggregate queries behind the admin dashboard.

use serde::Serialize;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserCounts {
    pub total: i64,
    pub admins: i64,
    pub new_since: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CurrencyRevenue {
    pub currency: String,
    pub amount_cents: i64,
    pub payments: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PlanRevenue {
    pub plan_id: String,
    pub plan_name: String,
    pub currency: String,
    pub amount_cents: i64,
    pub payments: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EngagementCounts {
    pub ratings: i64,
    pub reviews: i64,
    pub watchlist: i64,
    pub favorites: i64,
    pub history: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopRated {
    pub tmdb_id: i64,
    pub media_type: String,
    pub average: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MostSaved {
    pub tmdb_id: i64,
    pub media_type: String,
    pub title: String,
    pub count: i64,
}

pub async fn user_counts(pool: &SqlitePool, since_ts: i64) -> Result<UserCounts, sqlx::Error> {
    let (total, admins, new_since): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), \
         COALESCE(SUM(CASE WHEN role = 'admin' THEN 1 ELSE 0 END), 0), \
         COALESCE(SUM(CASE WHEN created_ts >= ? THEN 1 ELSE 0 END), 0) FROM user",
    )
    .bind(since_ts)
    .fetch_one(pool)
    .await?;
    Ok(UserCounts {
        total,
        admins,
        new_since,
    })
}

pub async fn subscriptions_by_status(pool: &SqlitePool) -> Result<Vec<StatusCount>, sqlx::Error> {
    sqlx::query_as(
        "SELECT status, COUNT(*) AS count FROM subscription GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await
}

pub async fn revenue_by_currency(pool: &SqlitePool) -> Result<Vec<CurrencyRevenue>, sqlx::Error> {
    sqlx::query_as(
        "SELECT currency, SUM(amount_cents) AS amount_cents, COUNT(*) AS payments \
         FROM payment WHERE status = 'completed' GROUP BY currency ORDER BY currency",
    )
    .fetch_all(pool)
    .await
}

pub async fn revenue_by_plan(pool: &SqlitePool) -> Result<Vec<PlanRevenue>, sqlx::Error> {
    sqlx::query_as(
        "SELECT p.id AS plan_id, p.name AS plan_name, pay.currency AS currency, \
         SUM(pay.amount_cents) AS amount_cents, COUNT(*) AS payments \
         FROM payment pay JOIN plan p ON p.id = pay.plan_id \
         WHERE pay.status = 'completed' \
         GROUP BY p.id, p.name, pay.currency ORDER BY amount_cents DESC",
    )
    .fetch_all(pool)
    .await
}

pub async fn engagement_counts(pool: &SqlitePool) -> Result<EngagementCounts, sqlx::Error> {
    let (ratings, reviews, watchlist, favorites, history): (i64, i64, i64, i64, i64) =
        sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM rating), (SELECT COUNT(*) FROM review), \
             (SELECT COUNT(*) FROM watchlist), (SELECT COUNT(*) FROM favorite), \
             (SELECT COUNT(*) FROM history)",
        )
        .fetch_one(pool)
        .await?;
    Ok(EngagementCounts {
        ratings,
        reviews,
        watchlist,
        favorites,
        history,
    })
}

/// Titles with the highest average user rating; ties broken by rating count.
pub async fn top_rated(pool: &SqlitePool, limit: i64) -> Result<Vec<TopRated>, sqlx::Error> {
    sqlx::query_as(
        "SELECT tmdb_id, media_type, AVG(value) AS average, COUNT(*) AS count FROM rating \
         GROUP BY tmdb_id, media_type ORDER BY average DESC, count DESC, tmdb_id LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn most_watchlisted(pool: &SqlitePool, limit: i64) -> Result<Vec<MostSaved>, sqlx::Error> {
    sqlx::query_as(
        "SELECT tmdb_id, media_type, MAX(title) AS title, COUNT(*) AS count FROM watchlist \
         GROUP BY tmdb_id, media_type ORDER BY count DESC, tmdb_id LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{library, ratings, users};

    #[tokio::test]
    async fn aggregates_over_seeded_data() {
        let pool = crate::connect(":memory:").await.unwrap();
        crate::migrate::run(&pool).await.unwrap();

        let a = users::create_user(&pool, "a@example.com", None, None, "admin").await.unwrap();
        let b = users::create_user(&pool, "b@example.com", None, None, "user").await.unwrap();

        ratings::upsert(&pool, &a.id, 1, "movie", 6).await.unwrap();
        ratings::upsert(&pool, &b.id, 1, "movie", 8).await.unwrap();
        ratings::upsert(&pool, &b.id, 2, "tv", 9).await.unwrap();

        for uid in [&a.id, &b.id] {
            library::add(&pool, library::SavedList::Watchlist, uid, 1, "movie", "One", None)
                .await
                .unwrap();
        }

        let counts = user_counts(&pool, 0).await.unwrap();
        assert_eq!((counts.total, counts.admins, counts.new_since), (2, 1, 2));

        let top = top_rated(&pool, 10).await.unwrap();
        assert_eq!(top[0].tmdb_id, 2);
        assert_eq!(top[1].count, 2);
        assert!((top[1].average - 7.0).abs() < f64::EPSILON);

        let saved = most_watchlisted(&pool, 10).await.unwrap();
        assert_eq!(saved[0].count, 2);

        let engagement = engagement_counts(&pool).await.unwrap();
        assert_eq!((engagement.ratings, engagement.watchlist), (3, 2));

        assert!(revenue_by_currency(&pool).await.unwrap().is_empty());
    }
}
