//! Per-user saved titles: watchlist, favorites and viewing history.
//! Every entry is keyed by `(user_id, tmdb_id, media_type)`.

use sqlx::SqlitePool;

/// Saved-title lists that share one table shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavedList {
    Watchlist,
    Favorites,
}

impl SavedList {
    fn table(self) -> &'static str {
        match self {
            Self::Watchlist => "watchlist",
            Self::Favorites => "favorite",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SavedEntry {
    pub tmdb_id: i64,
    pub media_type: String,
    pub title: String,
    pub poster_path: Option<String>,
    pub added_ts: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HistoryEntry {
    pub tmdb_id: i64,
    pub media_type: String,
    pub title: String,
    pub poster_path: Option<String>,
    pub progress_seconds: i64,
    pub watched_ts: i64,
}

/// Add a title to a list. Returns false if it was already there (the stored
/// title/poster are refreshed either way).
pub async fn add(
    pool: &SqlitePool,
    list: SavedList,
    user_id: &str,
    tmdb_id: i64,
    media_type: &str,
    title: &str,
    poster_path: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let existed = contains(pool, list, user_id, tmdb_id, media_type).await?;
    sqlx::query(&format!(
        "INSERT INTO {} (user_id, tmdb_id, media_type, title, poster_path, added_ts) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT(user_id, tmdb_id, media_type) DO UPDATE SET \
         title = excluded.title, poster_path = excluded.poster_path",
        list.table()
    ))
    .bind(user_id)
    .bind(tmdb_id)
    .bind(media_type)
    .bind(title)
    .bind(poster_path)
    .bind(crate::now_ts())
    .execute(pool)
    .await?;
    Ok(!existed)
}

pub async fn remove(
    pool: &SqlitePool,
    list: SavedList,
    user_id: &str,
    tmdb_id: i64,
    media_type: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = ? AND tmdb_id = ? AND media_type = ?",
        list.table()
    ))
    .bind(user_id)
    .bind(tmdb_id)
    .bind(media_type)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn contains(
    pool: &SqlitePool,
    list: SavedList,
    user_id: &str,
    tmdb_id: i64,
    media_type: &str,
) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(&format!(
        "SELECT 1 FROM {} WHERE user_id = ? AND tmdb_id = ? AND media_type = ?",
        list.table()
    ))
    .bind(user_id)
    .bind(tmdb_id)
    .bind(media_type)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

/// Newest first.
pub async fn list(
    pool: &SqlitePool,
    list: SavedList,
    user_id: &str,
    media_type: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<SavedEntry>, i64), sqlx::Error> {
    let table = list.table();
    let filter = "WHERE user_id = ?1 AND (?2 IS NULL OR media_type = ?2)";

    let rows: Vec<SavedEntry> = sqlx::query_as(&format!(
        "SELECT tmdb_id, media_type, title, poster_path, added_ts FROM {table} {filter} \
         ORDER BY added_ts DESC, rowid DESC LIMIT ?3 OFFSET ?4"
    ))
    .bind(user_id)
    .bind(media_type)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table} {filter}"))
        .bind(user_id)
        .bind(media_type)
        .fetch_one(pool)
        .await?;

    Ok((rows, total))
}

/// Most recently added entry, used to seed recommendations.
pub async fn latest(
    pool: &SqlitePool,
    list: SavedList,
    user_id: &str,
    media_type: Option<&str>,
) -> Result<Option<SavedEntry>, sqlx::Error> {
    let (rows, _) = self::list(pool, list, user_id, media_type, 1, 0).await?;
    Ok(rows.into_iter().next())
}

/// Record (or bump) a viewing-history entry.
pub async fn record_history(
    pool: &SqlitePool,
    user_id: &str,
    tmdb_id: i64,
    media_type: &str,
    title: &str,
    poster_path: Option<&str>,
    progress_seconds: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO history (user_id, tmdb_id, media_type, title, poster_path, progress_seconds, watched_ts) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(user_id, tmdb_id, media_type) DO UPDATE SET \
         title = excluded.title, poster_path = excluded.poster_path, \
         progress_seconds = excluded.progress_seconds, watched_ts = excluded.watched_ts",
    )
    .bind(user_id)
    .bind(tmdb_id)
    .bind(media_type)
    .bind(title)
    .bind(poster_path)
    .bind(progress_seconds)
    .bind(crate::now_ts())
    .execute(pool)
    .await?;
    Ok(())
}

/// Bump `watched_ts` when playback starts, keeping any saved progress.
pub async fn touch_history(
    pool: &SqlitePool,
    user_id: &str,
    tmdb_id: i64,
    media_type: &str,
    title: &str,
    poster_path: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO history (user_id, tmdb_id, media_type, title, poster_path, progress_seconds, watched_ts) \
         VALUES (?, ?, ?, ?, ?, 0, ?) \
         ON CONFLICT(user_id, tmdb_id, media_type) DO UPDATE SET \
         title = excluded.title, poster_path = excluded.poster_path, watched_ts = excluded.watched_ts",
    )
    .bind(user_id)
    .bind(tmdb_id)
    .bind(media_type)
    .bind(title)
    .bind(poster_path)
    .bind(crate::now_ts())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_history(
    pool: &SqlitePool,
    user_id: &str,
    media_type: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<HistoryEntry>, i64), sqlx::Error> {
    let filter = "WHERE user_id = ?1 AND (?2 IS NULL OR media_type = ?2)";

    let rows: Vec<HistoryEntry> = sqlx::query_as(&format!(
        "SELECT tmdb_id, media_type, title, poster_path, progress_seconds, watched_ts \
         FROM history {filter} ORDER BY watched_ts DESC, rowid DESC LIMIT ?3 OFFSET ?4"
    ))
    .bind(user_id)
    .bind(media_type)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM history {filter}"))
        .bind(user_id)
        .bind(media_type)
        .fetch_one(pool)
        .await?;

    Ok((rows, total))
}

pub async fn has_watched(
    pool: &SqlitePool,
    user_id: &str,
    tmdb_id: i64,
    media_type: &str,
) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM history WHERE user_id = ? AND tmdb_id = ? AND media_type = ?",
    )
    .bind(user_id)
    .bind(tmdb_id)
    .bind(media_type)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

pub async fn remove_history(
    pool: &SqlitePool,
    user_id: &str,
    tmdb_id: i64,
    media_type: &str,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM history WHERE user_id = ? AND tmdb_id = ? AND media_type = ?")
            .bind(user_id)
            .bind(tmdb_id)
            .bind(media_type)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Clear a user's entire history. Returns the number of entries removed.
pub async fn clear_history(pool: &SqlitePool, user_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM history WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
