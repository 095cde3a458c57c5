//! JSON shapes shared by several route modules.

use marquee_db::repo::movies::MovieRow;
use marquee_db::repo::payments::PaymentRow;
use marquee_db::repo::plans::PlanRow;
use marquee_db::repo::subscriptions::SubscriptionRow;
use marquee_db::repo::users::UserRow;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: String,
    pub has_password: bool,
    pub created_ts: i64,
}

impl From<&UserRow> for UserView {
    fn from(u: &UserRow) -> Self {
        Self {
            id: u.id.clone(),
            email: u.email.clone(),
            name: u.name.clone(),
            image: u.image.clone(),
            role: u.role.clone(),
            has_password: u.password_hash.is_some(),
            created_ts: u.created_ts,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlanView {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub interval: String,
    pub features: Vec<String>,
    pub is_active: bool,
}

impl From<&PlanRow> for PlanView {
    fn from(p: &PlanRow) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            description: p.description.clone(),
            price_cents: p.price_cents,
            currency: p.currency.clone(),
            interval: p.interval.clone(),
            features: p.feature_list(),
            is_active: p.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub id: String,
    pub plan: Option<PlanView>,
    pub status: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
    pub is_active: bool,
}

impl SubscriptionView {
    pub fn new(sub: &SubscriptionRow, plan: Option<&PlanRow>, now: i64) -> Self {
        Self {
            id: sub.id.clone(),
            plan: plan.map(PlanView::from),
            status: sub.status.clone(),
            current_period_start: sub.current_period_start,
            current_period_end: sub.current_period_end,
            cancel_at_period_end: sub.cancel_at_period_end,
            is_active: sub.grants_access(now),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub tx_ref: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub provider_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub created_ts: i64,
    pub updated_ts: i64,
}

impl From<PaymentRow> for PaymentView {
    fn from(p: PaymentRow) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            plan_id: p.plan_id,
            tx_ref: p.tx_ref,
            amount_cents: p.amount_cents,
            currency: p.currency,
            status: p.status,
            provider_reference: p.provider_reference,
            failure_reason: p.failure_reason,
            created_ts: p.created_ts,
            updated_ts: p.updated_ts,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovieView {
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

impl From<MovieRow> for MovieView {
    fn from(m: MovieRow) -> Self {
        Self {
            id: m.id,
            tmdb_id: m.tmdb_id,
            media_type: m.media_type,
            title: m.title,
            overview: m.overview,
            poster_path: m.poster_path,
            backdrop_path: m.backdrop_path,
            release_date: m.release_date,
            featured: m.featured,
            premium: m.premium,
            created_ts: m.created_ts,
            updated_ts: m.updated_ts,
        }
    }
}

/// Load a user's subscription with its plan, expiring it first if the period has ended.
pub async fn load_subscription(
    db: &sqlx::SqlitePool,
    user_id: &str,
) -> Result<Option<SubscriptionView>, sqlx::Error> {
    let now = marquee_db::now_ts();
    marquee_db::repo::subscriptions::expire_if_lapsed(db, user_id, now).await?;

    let Some(sub) = marquee_db::repo::subscriptions::get_for_user(db, user_id).await? else {
        return Ok(None);
    };
    let plan = marquee_db::repo::plans::get_plan(db, &sub.plan_id).await?;
    Ok(Some(SubscriptionView::new(&sub, plan.as_ref(), now)))
}
