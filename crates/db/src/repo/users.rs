use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use password_hash::rand_core::OsRng;
use sqlx::SqlitePool;

/// User row from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub password_hash: Option<String>,
    pub role: String,
    pub created_ts: i64,
    pub updated_ts: i64,
}

const USER_COLUMNS: &str = "id, email, name, image, password_hash, role, created_ts, updated_ts";

/// Create a new user. `password` is `None` for OAuth-only accounts.
/// Emails are stored lower-cased.
pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    name: Option<&str>,
    password: Option<&str>,
    role: &str,
) -> Result<UserRow, crate::DbError> {
    let id = uuid::Uuid::new_v4().to_string();
    let email = email.trim().to_lowercase();
    let hash = password.map(hash_password).transpose()?;
    let now = crate::now_ts();

    sqlx::query(
        "INSERT INTO user (id, email, name, image, password_hash, role, created_ts, updated_ts) \
         VALUES (?, ?, ?, NULL, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&email)
    .bind(name)
    .bind(&hash)
    .bind(role)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(UserRow {
        id,
        email,
        name: name.map(String::from),
        image: None,
        password_hash: hash,
        role: role.to_string(),
        created_ts: now,
        updated_ts: now,
    })
}

/// Find user by email (case-insensitive).
pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM user WHERE email = ?"))
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await
}

/// Find user by ID.
pub async fn find_by_id(pool: &SqlitePool, user_id: &str) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM user WHERE id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// List users (admin), optionally filtered by an email/name substring and role.
pub async fn list_users(
    pool: &SqlitePool,
    search: Option<&str>,
    role: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<UserRow>, i64), sqlx::Error> {
    let pattern = search.map(|q| format!("%{}%", q.trim().to_lowercase()));
    let filter = "WHERE (?1 IS NULL OR lower(email) LIKE ?1 OR lower(coalesce(name, '')) LIKE ?1) \
                  AND (?2 IS NULL OR role = ?2)";

    let rows: Vec<UserRow> = sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM user {filter} ORDER BY created_ts DESC, id LIMIT ?3 OFFSET ?4"
    ))
    .bind(&pattern)
    .bind(role)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM user {filter}"))
        .bind(&pattern)
        .bind(role)
        .fetch_one(pool)
        .await?;

    Ok((rows, total))
}

/// Overwrite display name and avatar.
pub async fn update_profile(
    pool: &SqlitePool,
    user_id: &str,
    name: Option<&str>,
    image: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE user SET name = ?, image = ?, updated_ts = ? WHERE id = ?")
        .bind(name)
        .bind(image)
        .bind(crate::now_ts())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Fill in name/avatar only where they are still empty (used when linking OAuth profiles).
pub async fn fill_profile_gaps(
    pool: &SqlitePool,
    user_id: &str,
    name: Option<&str>,
    image: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE user SET name = coalesce(name, ?), image = coalesce(image, ?), updated_ts = ? \
         WHERE id = ?",
    )
    .bind(name)
    .bind(image)
    .bind(crate::now_ts())
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_role(pool: &SqlitePool, user_id: &str, role: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE user SET role = ?, updated_ts = ? WHERE id = ?")
        .bind(role)
        .bind(crate::now_ts())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Replace the user's password hash.
pub async fn set_password(
    pool: &SqlitePool,
    user_id: &str,
    password: &str,
) -> Result<(), crate::DbError> {
    let hash = hash_password(password)?;
    sqlx::query("UPDATE user SET password_hash = ?, updated_ts = ? WHERE id = ?")
        .bind(&hash)
        .bind(crate::now_ts())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a user by ID. All user-scoped rows cascade.
pub async fn delete_user(pool: &SqlitePool, user_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM user WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Check if any users exist (for admin bootstrap).
pub async fn count_users(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn count_admins(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user WHERE role = 'admin'")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, crate::DbError> {
    let parsed = PasswordHash::new(hash).map_err(|e| crate::DbError::Hash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn hash_password(password: &str) -> Result<String, crate::DbError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| crate::DbError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pool() -> SqlitePool {
        let pool = crate::connect(":memory:").await.unwrap();
        crate::migrate::run(&pool).await.unwrap();
        pool
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[tokio::test]
    async fn emails_are_case_insensitive() {
        let pool = pool().await;
        create_user(&pool, "Ada@Example.com", Some("Ada"), Some("password1"), "user")
            .await
            .unwrap();

        let found = find_by_email(&pool, "ada@example.COM").await.unwrap().unwrap();
        assert_eq!(found.email, "ada@example.com");

        let dup = create_user(&pool, "ADA@example.com", None, None, "user")
            .await
            .unwrap_err();
        assert!(dup.is_unique_violation());
    }

    #[tokio::test]
    async fn list_users_filters_by_search_and_role() {
        let pool = pool().await;
        create_user(&pool, "alice@example.com", Some("Alice"), None, "admin")
            .await
            .unwrap();
        create_user(&pool, "bob@example.com", Some("Bob"), None, "user")
            .await
            .unwrap();
        create_user(&pool, "carol@example.com", Some("Carol Bobson"), None, "user")
            .await
            .unwrap();

        let (rows, total) = list_users(&pool, Some("bob"), None, 10, 0).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows.len(), 2);

        let (_, admins) = list_users(&pool, None, Some("admin"), 10, 0).await.unwrap();
        assert_eq!(admins, 1);
    }
}
