pub mod migrate;
pub mod repo;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("password hash error: {0}")]
    Hash(String),
}

impl DbError {
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Sqlx(e) => is_unique_violation(e),
            Self::Hash(_) => false,
        }
    }
}

/// True when the error is a UNIQUE / PRIMARY KEY constraint failure.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Create a SQLite connection pool with WAL mode and foreign keys enabled.
pub async fn connect(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let opts = SqliteConnectOptions::from_str(db_path)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?;

    Ok(pool)
}

/// Current unix time in seconds; every `*_ts` column uses this clock.
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A clamped page request: `page` starts at 1, `per_page` is within 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub per_page: i64,
}

impl PageWindow {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(20).clamp(1, 100),
        }
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_defaults_and_clamps() {
        let w = PageWindow::new(None, None);
        assert_eq!((w.page, w.per_page, w.offset()), (1, 20, 0));

        let w = PageWindow::new(Some(3), Some(10));
        assert_eq!((w.limit(), w.offset()), (10, 20));

        let w = PageWindow::new(Some(0), Some(1000));
        assert_eq!((w.page, w.per_page), (1, 100));

        let w = PageWindow::new(Some(-4), Some(0));
        assert_eq!((w.page, w.per_page), (1, 1));
    }

    #[test]
    fn huge_page_offset_saturates() {
        let w = PageWindow::new(Some(i64::MAX), Some(100));
        assert_eq!(w.offset(), i64::MAX);
    }
}
