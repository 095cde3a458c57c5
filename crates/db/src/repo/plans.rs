use sqlx::{Executor, Sqlite, SqlitePool};

/// Subscription plan row. `features` is a JSON array of strings.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlanRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub interval: String,
    pub features: String,
    pub is_active: bool,
    pub created_ts: i64,
    pub updated_ts: i64,
}

impl PlanRow {
    pub fn feature_list(&self) -> Vec<String> {
        serde_json::from_str(&self.features).unwrap_or_default()
    }
}

/// Fields written on create and update.
#[derive(Debug, Clone)]
pub struct PlanFields {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub interval: String,
    pub features: Vec<String>,
    pub is_active: bool,
}

impl From<&PlanRow> for PlanFields {
    fn from(row: &PlanRow) -> Self {
        Self {
            name: row.name.clone(),
            description: row.description.clone(),
            price_cents: row.price_cents,
            currency: row.currency.clone(),
            interval: row.interval.clone(),
            features: row.feature_list(),
            is_active: row.is_active,
        }
    }
}

const PLAN_COLUMNS: &str = "id, name, description, price_cents, currency, interval, features, \
                            is_active, created_ts, updated_ts";

pub async fn create_plan(pool: &SqlitePool, fields: &PlanFields) -> Result<PlanRow, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = crate::now_ts();
    let features = serde_json::to_string(&fields.features).unwrap_or_else(|_| "[]".into());

    sqlx::query(
        "INSERT INTO plan (id, name, description, price_cents, currency, interval, features, \
         is_active, created_ts, updated_ts) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(fields.price_cents)
    .bind(&fields.currency)
    .bind(&fields.interval)
    .bind(&features)
    .bind(fields.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(PlanRow {
        id,
        name: fields.name.clone(),
        description: fields.description.clone(),
        price_cents: fields.price_cents,
        currency: fields.currency.clone(),
        interval: fields.interval.clone(),
        features,
        is_active: fields.is_active,
        created_ts: now,
        updated_ts: now,
    })
}

pub async fn get_plan<'e, E>(db: E, id: &str) -> Result<Option<PlanRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(&format!("SELECT {PLAN_COLUMNS} FROM plan WHERE id = ?"))
        .bind(id)
        .fetch_optional(db)
        .await
}

/// List plans ordered by price. Inactive plans are only included for admins.
pub async fn list_plans(
    pool: &SqlitePool,
    include_inactive: bool,
) -> Result<Vec<PlanRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {PLAN_COLUMNS} FROM plan WHERE (? OR is_active = 1) ORDER BY price_cents, name"
    ))
    .bind(include_inactive)
    .fetch_all(pool)
    .await
}

pub async fn update_plan(
    pool: &SqlitePool,
    id: &str,
    fields: &PlanFields,
) -> Result<bool, sqlx::Error> {
    let features = serde_json::to_string(&fields.features).unwrap_or_else(|_| "[]".into());
    let result = sqlx::query(
        "UPDATE plan SET name = ?, description = ?, price_cents = ?, currency = ?, interval = ?, \
         features = ?, is_active = ?, updated_ts = ? WHERE id = ?",
    )
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(fields.price_cents)
    .bind(&fields.currency)
    .bind(&fields.interval)
    .bind(&features)
    .bind(fields.is_active)
    .bind(crate::now_ts())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_active(pool: &SqlitePool, id: &str, active: bool) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE plan SET is_active = ?, updated_ts = ? WHERE id = ?")
        .bind(active)
        .bind(crate::now_ts())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Number of subscriptions and payments pointing at a plan.
pub async fn count_references(pool: &SqlitePool, id: &str) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM subscription WHERE plan_id = ?1) \
              + (SELECT COUNT(*) FROM payment WHERE plan_id = ?1)",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn delete_plan(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM plan WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
