use sqlx::SqlitePool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewRow {
    pub id: String,
    pub user_id: String,
    pub tmdb_id: i64,
    pub media_type: String,
    pub title: Option<String>,
    pub body: String,
    pub created_ts: i64,
    pub updated_ts: i64,
}

/// Review joined with its author and the author's rating of the same title.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewWithAuthor {
    pub id: String,
    pub user_id: String,
    pub tmdb_id: i64,
    pub media_type: String,
    pub title: Option<String>,
    pub body: String,
    pub created_ts: i64,
    pub updated_ts: i64,
    pub author_name: Option<String>,
    pub author_image: Option<String>,
    pub author_rating: Option<i64>,
}

const REVIEW_COLUMNS: &str = "id, user_id, tmdb_id, media_type, title, body, created_ts, updated_ts";

const REVIEW_WITH_AUTHOR: &str = "SELECT r.id, r.user_id, r.tmdb_id, r.media_type, r.title, r.body, \
     r.created_ts, r.updated_ts, u.name AS author_name, u.image AS author_image, \
     rt.value AS author_rating \
     FROM review r JOIN user u ON u.id = r.user_id \
     LEFT JOIN rating rt ON rt.user_id = r.user_id AND rt.tmdb_id = r.tmdb_id \
     AND rt.media_type = r.media_type";

/// Create a review. Fails with a unique violation if the user already reviewed the title.
pub async fn create(
    pool: &SqlitePool,
    user_id: &str,
    tmdb_id: i64,
    media_type: &str,
    title: Option<&str>,
    body: &str,
) -> Result<ReviewRow, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = crate::now_ts();

    sqlx::query(
        "INSERT INTO review (id, user_id, tmdb_id, media_type, title, body, created_ts, updated_ts) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(tmdb_id)
    .bind(media_type)
    .bind(title)
    .bind(body)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(ReviewRow {
        id,
        user_id: user_id.to_string(),
        tmdb_id,
        media_type: media_type.to_string(),
        title: title.map(String::from),
        body: body.to_string(),
        created_ts: now,
        updated_ts: now,
    })
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<ReviewRow>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {REVIEW_COLUMNS} FROM review WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_for_user(
    pool: &SqlitePool,
    user_id: &str,
    tmdb_id: i64,
    media_type: &str,
) -> Result<Option<ReviewRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {REVIEW_COLUMNS} FROM review WHERE user_id = ? AND tmdb_id = ? AND media_type = ?"
    ))
    .bind(user_id)
    .bind(tmdb_id)
    .bind(media_type)
    .fetch_optional(pool)
    .await
}

pub async fn update(
    pool: &SqlitePool,
    id: &str,
    title: Option<&str>,
    body: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE review SET title = ?, body = ?, updated_ts = ? WHERE id = ?")
        .bind(title)
        .bind(body)
        .bind(crate::now_ts())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM review WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Reviews of one title, newest first.
pub async fn list_for_title(
    pool: &SqlitePool,
    tmdb_id: i64,
    media_type: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ReviewWithAuthor>, i64), sqlx::Error> {
    let rows: Vec<ReviewWithAuthor> = sqlx::query_as(&format!(
        "{REVIEW_WITH_AUTHOR} WHERE r.tmdb_id = ? AND r.media_type = ? \
         ORDER BY r.created_ts DESC, r.id LIMIT ? OFFSET ?"
    ))
    .bind(tmdb_id)
    .bind(media_type)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM review WHERE tmdb_id = ? AND media_type = ?")
            .bind(tmdb_id)
            .bind(media_type)
            .fetch_one(pool)
            .await?;

    Ok((rows, total))
}

/// All reviews, optionally scoped to one author, newest first.
pub async fn list_all(
    pool: &SqlitePool,
    user_id: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ReviewWithAuthor>, i64), sqlx::Error> {
    let rows: Vec<ReviewWithAuthor> = sqlx::query_as(&format!(
        "{REVIEW_WITH_AUTHOR} WHERE (?1 IS NULL OR r.user_id = ?1) \
         ORDER BY r.created_ts DESC, r.id LIMIT ?2 OFFSET ?3"
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM review WHERE (?1 IS NULL OR user_id = ?1)")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    Ok((rows, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{ratings, users};

    #[tokio::test]
    async fn one_review_per_user_and_title() {
        let pool = crate::connect(":memory:").await.unwrap();
        crate::migrate::run(&pool).await.unwrap();
        let user = users::create_user(&pool, "critic@example.com", Some("Critic"), None, "user")
            .await
            .unwrap();

        create(&pool, &user.id, 550, "movie", Some("Great"), "An excellent film.")
            .await
            .unwrap();
        let err = create(&pool, &user.id, 550, "movie", None, "Second opinion here.")
            .await
            .unwrap_err();
        assert!(crate::is_unique_violation(&err));

        ratings::upsert(&pool, &user.id, 550, "movie", 9).await.unwrap();

        let (rows, total) = list_for_title(&pool, 550, "movie", 10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].author_name.as_deref(), Some("Critic"));
        assert_eq!(rows[0].author_rating, Some(9));
    }
}
