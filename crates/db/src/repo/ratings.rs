use sqlx::SqlitePool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RatingRow {
    pub tmdb_id: i64,
    pub media_type: String,
    pub value: i64,
    pub created_ts: i64,
    pub updated_ts: i64,
}

/// Set the user's rating for a title (1..=10, enforced by a CHECK constraint).
pub async fn upsert(
    pool: &SqlitePool,
    user_id: &str,
    tmdb_id: i64,
    media_type: &str,
    value: i64,
) -> Result<(), sqlx::Error> {
    let now = crate::now_ts();
    sqlx::query(
        "INSERT INTO rating (user_id, tmdb_id, media_type, value, created_ts, updated_ts) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT(user_id, tmdb_id, media_type) DO UPDATE SET \
         value = excluded.value, updated_ts = excluded.updated_ts",
    )
    .bind(user_id)
    .bind(tmdb_id)
    .bind(media_type)
    .bind(value)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(
    pool: &SqlitePool,
    user_id: &str,
    tmdb_id: i64,
    media_type: &str,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM rating WHERE user_id = ? AND tmdb_id = ? AND media_type = ?")
            .bind(user_id)
            .bind(tmdb_id)
            .bind(media_type)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get(
    pool: &SqlitePool,
    user_id: &str,
    tmdb_id: i64,
    media_type: &str,
) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT value FROM rating WHERE user_id = ? AND tmdb_id = ? AND media_type = ?",
    )
    .bind(user_id)
    .bind(tmdb_id)
    .bind(media_type)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(v,)| v))
}

pub async fn list_for_user(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<RatingRow>, i64), sqlx::Error> {
    let rows: Vec<RatingRow> = sqlx::query_as(
        "SELECT tmdb_id, media_type, value, created_ts, updated_ts FROM rating \
         WHERE user_id = ? ORDER BY updated_ts DESC, rowid DESC LIMIT ? OFFSET ?",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rating WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok((rows, total))
}

/// Average and count of all user ratings for a title. Average is `None` with no ratings.
pub async fn summary(
    pool: &SqlitePool,
    tmdb_id: i64,
    media_type: &str,
) -> Result<(Option<f64>, i64), sqlx::Error> {
    let row: (Option<f64>, i64) = sqlx::query_as(
        "SELECT AVG(value), COUNT(*) FROM rating WHERE tmdb_id = ? AND media_type = ?",
    )
    .bind(tmdb_id)
    .bind(media_type)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::users;

    #[tokio::test]
    async fn summary_averages_across_users() {
        let pool = crate::connect(":memory:").await.unwrap();
        crate::migrate::run(&pool).await.unwrap();
        let a = users::create_user(&pool, "a@example.com", None, None, "user").await.unwrap();
        let b = users::create_user(&pool, "b@example.com", None, None, "user").await.unwrap();

        assert_eq!(summary(&pool, 550, "movie").await.unwrap(), (None, 0));

        upsert(&pool, &a.id, 550, "movie", 4).await.unwrap();
        upsert(&pool, &a.id, 550, "movie", 8).await.unwrap();
        upsert(&pool, &b.id, 550, "movie", 10).await.unwrap();

        let (avg, count) = summary(&pool, 550, "movie").await.unwrap();
        assert_eq!(count, 2);
        assert!((avg.unwrap() - 9.0).abs() < f64::EPSILON);
        assert_eq!(get(&pool, &a.id, 550, "movie").await.unwrap(), Some(8));

        // CHECK constraint rejects out-of-range values
        assert!(upsert(&pool, &a.id, 551, "movie", 11).await.is_err());
    }
}
