use sqlx::SqlitePool;

/// Look up the user linked to an external identity.
pub async fn find_user_id(
    pool: &SqlitePool,
    provider: &str,
    provider_account_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT user_id FROM account WHERE provider = ? AND provider_account_id = ?",
    )
    .bind(provider)
    .bind(provider_account_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(id,)| id))
}

/// Link an external identity to a user. Re-linking the same identity is a no-op.
pub async fn link(
    pool: &SqlitePool,
    user_id: &str,
    provider: &str,
    provider_account_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT OR IGNORE INTO account (provider, provider_account_id, user_id, created_ts) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(provider)
    .bind(provider_account_id)
    .bind(user_id)
    .bind(crate::now_ts())
    .execute(pool)
    .await?;
    Ok(())
}

/// Providers linked to a user, e.g. `["google"]`.
pub async fn providers_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT provider FROM account WHERE user_id = ? ORDER BY provider")
            .bind(user_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(p,)| p).collect())
}
