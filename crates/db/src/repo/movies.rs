use sqlx::SqlitePool;

/// Admin-curated catalog entry.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MovieRow {
    pub id: String,
    pub tmdb_id: i64,
    pub media_type: String,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<String>,
    pub featured: bool,
    pub premium: bool,
    pub created_ts: i64,
    pub updated_ts: i64,
}

/// Fields written on create and update.
#[derive(Debug, Clone)]
pub struct MovieFields {
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<String>,
    pub featured: bool,
    pub premium: bool,
}

impl From<&MovieRow> for MovieFields {
    fn from(row: &MovieRow) -> Self {
        Self {
            title: row.title.clone(),
            overview: row.overview.clone(),
            poster_path: row.poster_path.clone(),
            backdrop_path: row.backdrop_path.clone(),
            release_date: row.release_date.clone(),
            featured: row.featured,
            premium: row.premium,
        }
    }
}

const MOVIE_COLUMNS: &str = "id, tmdb_id, media_type, title, overview, poster_path, backdrop_path, \
                             release_date, featured, premium, created_ts, updated_ts";

pub async fn create_movie(
    pool: &SqlitePool,
    tmdb_id: i64,
    media_type: &str,
    fields: &MovieFields,
) -> Result<MovieRow, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = crate::now_ts();

    sqlx::query(
        "INSERT INTO movie (id, tmdb_id, media_type, title, overview, poster_path, backdrop_path, \
         release_date, featured, premium, created_ts, updated_ts) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(tmdb_id)
    .bind(media_type)
    .bind(&fields.title)
    .bind(&fields.overview)
    .bind(&fields.poster_path)
    .bind(&fields.backdrop_path)
    .bind(&fields.release_date)
    .bind(fields.featured)
    .bind(fields.premium)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(MovieRow {
        id,
        tmdb_id,
        media_type: media_type.to_string(),
        title: fields.title.clone(),
        overview: fields.overview.clone(),
        poster_path: fields.poster_path.clone(),
        backdrop_path: fields.backdrop_path.clone(),
        release_date: fields.release_date.clone(),
        featured: fields.featured,
        premium: fields.premium,
        created_ts: now,
        updated_ts: now,
    })
}

pub async fn get_movie(pool: &SqlitePool, id: &str) -> Result<Option<MovieRow>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {MOVIE_COLUMNS} FROM movie WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_tmdb(
    pool: &SqlitePool,
    tmdb_id: i64,
    media_type: &str,
) -> Result<Option<MovieRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {MOVIE_COLUMNS} FROM movie WHERE tmdb_id = ? AND media_type = ?"
    ))
    .bind(tmdb_id)
    .bind(media_type)
    .fetch_optional(pool)
    .await
}

/// List curated entries, newest first.
pub async fn list_movies(
    pool: &SqlitePool,
    featured: Option<bool>,
    media_type: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<MovieRow>, i64), sqlx::Error> {
    let filter = "WHERE (?1 IS NULL OR featured = ?1) AND (?2 IS NULL OR media_type = ?2)";

    let rows: Vec<MovieRow> = sqlx::query_as(&format!(
        "SELECT {MOVIE_COLUMNS} FROM movie {filter} \
         ORDER BY created_ts DESC, id LIMIT ?3 OFFSET ?4"
    ))
    .bind(featured)
    .bind(media_type)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM movie {filter}"))
        .bind(featured)
        .bind(media_type)
        .fetch_one(pool)
        .await?;

    Ok((rows, total))
}

pub async fn update_movie(
    pool: &SqlitePool,
    id: &str,
    fields: &MovieFields,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE movie SET title = ?, overview = ?, poster_path = ?, backdrop_path = ?, \
         release_date = ?, featured = ?, premium = ?, updated_ts = ? WHERE id = ?",
    )
    .bind(&fields.title)
    .bind(&fields.overview)
    .bind(&fields.poster_path)
    .bind(&fields.backdrop_path)
    .bind(&fields.release_date)
    .bind(fields.featured)
    .bind(fields.premium)
    .bind(crate::now_ts())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_movie(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM movie WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(title: &str, featured: bool) -> MovieFields {
        MovieFields {
            title: title.to_string(),
            overview: None,
            poster_path: Some("/p.jpg".into()),
            backdrop_path: None,
            release_date: Some("2010-07-16".into()),
            featured,
            premium: true,
        }
    }

    #[tokio::test]
    async fn curated_movies_filter_and_unique() {
        let pool = crate::connect(":memory:").await.unwrap();
        crate::migrate::run(&pool).await.unwrap();

        create_movie(&pool, 27205, "movie", &fields("Inception", true))
            .await
            .unwrap();
        create_movie(&pool, 1396, "tv", &fields("Breaking Bad", false))
            .await
            .unwrap();

        let err = create_movie(&pool, 27205, "movie", &fields("Inception again", false))
            .await
            .unwrap_err();
        assert!(crate::is_unique_violation(&err));

        let (featured, total) = list_movies(&pool, Some(true), None, 20, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(featured[0].title, "Inception");

        let (tv, _) = list_movies(&pool, None, Some("tv"), 20, 0).await.unwrap();
        assert_eq!(tv.len(), 1);
        assert_eq!(tv[0].tmdb_id, 1396);
    }
}
