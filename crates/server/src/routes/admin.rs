//! Admin back office. Every handler takes [`AdminUser`], so non-admins get 403.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use marquee_core::error::ApiError;
use marquee_core::types::{PaymentStatus, SubscriptionStatus, UserRole};
use marquee_db::repo::movies::{self, MovieFields};
use marquee_db::repo::plans::{self, PlanFields};
use marquee_db::repo::subscriptions::{self, SubscriptionListRow};
use marquee_db::repo::{payments, reviews, stats, users};
use marquee_db::{PageWindow, is_unique_violation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::reviews::ListedReview;
use super::views::{MovieView, PaymentView, PlanView, SubscriptionView, UserView, load_subscription};
use super::{PageQuery, Paged};
use crate::auth::AdminUser;
use crate::error::AppError;
use crate::state::AppState;
use crate::subscription_pipeline::grant_complimentary;
use crate::validation::{FieldErrors, check_name, check_plan, parse_optional_media_type, title_key};

const STATS_WINDOW_SECS: i64 = 30 * 24 * 3600;
const STATS_TOP_N: i64 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route(
            "/users/{id}/subscription",
            post(grant_subscription).delete(revoke_subscription),
        )
        .route("/movies", get(list_movies).post(create_movie))
        .route(
            "/movies/{id}",
            get(get_movie).patch(update_movie).delete(delete_movie),
        )
        .route("/plans", get(list_plans).post(create_plan))
        .route("/plans/{id}", get(get_plan).patch(update_plan).delete(delete_plan))
        .route("/subscriptions", get(list_subscriptions))
        .route("/payments", get(list_payments))
        .route("/reviews", get(list_reviews))
        .route("/reviews/{id}", delete(delete_review))
        .route("/stats", get(get_stats))
}

fn not_found(what: &str) -> AppError {
    ApiError::NotFound(format!("{what} not found")).into()
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct UserListQuery {
    q: Option<String>,
    role: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(q): Query<UserListQuery>,
) -> Result<Json<Paged<UserView>>, AppError> {
    let role = match q.role.as_deref().filter(|r| !r.is_empty()) {
        Some(raw) => Some(
            UserRole::parse(raw)
                .ok_or_else(|| ApiError::field("role", "must be 'admin' or 'user'"))?,
        ),
        None => None,
    };
    let search = q.q.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let window = PageWindow::new(q.page, q.per_page);

    let (rows, total) = users::list_users(
        &state.db,
        search,
        role.map(|r| r.as_str()),
        window.limit(),
        window.offset(),
    )
    .await?;

    Ok(Json(Paged::new(
        rows.iter().map(UserView::from).collect(),
        window,
        total,
    )))
}

#[derive(Serialize)]
struct AdminUserDetail {
    #[serde(flatten)]
    user: UserView,
    subscription: Option<SubscriptionView>,
}

async fn get_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AdminUserDetail>, AppError> {
    let user = users::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| not_found("user"))?;
    let subscription = load_subscription(&state.db, &user.id).await?;
    Ok(Json(AdminUserDetail {
        user: UserView::from(&user),
        subscription,
    }))
}

#[derive(Deserialize)]
struct UpdateUserRequest {
    role: Option<String>,
    name: Option<String>,
}

async fn update_user(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserView>, AppError> {
    let mut errors = FieldErrors::new();
    let role = body.role.as_deref().and_then(|raw| {
        let parsed = UserRole::parse(raw);
        if parsed.is_none() {
            errors.add("role", "must be 'admin' or 'user'");
        }
        parsed
    });
    if let Some(ref name) = body.name {
        check_name(&mut errors, name);
    }
    errors.into_result()?;

    let user = users::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| not_found("user"))?;

    if let Some(role) = role {
        let demoting = user.role == UserRole::Admin.as_str() && role == UserRole::User;
        if demoting && user.id == admin.user_id {
            return Err(ApiError::Forbidden("you cannot demote yourself".into()).into());
        }
        if demoting && users::count_admins(&state.db).await? <= 1 {
            return Err(ApiError::Conflict("at least one admin must remain".into()).into());
        }
        if users::update_role(&state.db, &user.id, role.as_str()).await? {
            info!(admin_id = %admin.user_id, user_id = %user.id, role = %role, "user role changed");
        }
    }

    if let Some(ref name) = body.name {
        users::update_profile(&state.db, &user.id, Some(name.trim()), user.image.as_deref())
            .await?;
    }

    let updated = users::find_by_id(&state.db, &user.id)
        .await?
        .ok_or_else(|| not_found("user"))?;
    Ok(Json(UserView::from(&updated)))
}

async fn delete_user(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if id == admin.user_id {
        return Err(ApiError::Forbidden("you cannot delete your own account here".into()).into());
    }
    if !users::delete_user(&state.db, &id).await? {
        return Err(not_found("user"));
    }
    info!(admin_id = %admin.user_id, user_id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct GrantRequest {
    plan_id: String,
}

async fn grant_subscription(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<GrantRequest>,
) -> Result<Json<Option<SubscriptionView>>, AppError> {
    let user = users::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| not_found("user"))?;
    let plan = plans::get_plan(&state.db, &body.plan_id)
        .await?
        .ok_or_else(|| not_found("plan"))?;

    grant_complimentary(&state.db, &user.id, &plan).await?;
    info!(admin_id = %admin.user_id, user_id = %user.id, plan = %plan.name, "subscription granted");
    Ok(Json(load_subscription(&state.db, &user.id).await?))
}

async fn revoke_subscription(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !subscriptions::revoke(&state.db, &id).await? {
        return Err(not_found("active subscription"));
    }
    info!(admin_id = %admin.user_id, user_id = %id, "subscription revoked");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Curated movies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct MovieListQuery {
    featured: Option<bool>,
    media_type: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

async fn list_movies(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(q): Query<MovieListQuery>,
) -> Result<Json<Paged<MovieView>>, AppError> {
    let media = parse_optional_media_type(q.media_type.as_deref())?;
    let window = PageWindow::new(q.page, q.per_page);
    let (rows, total) = movies::list_movies(
        &state.db,
        q.featured,
        media.map(|m| m.as_str()),
        window.limit(),
        window.offset(),
    )
    .await?;
    Ok(Json(Paged::new(
        rows.into_iter().map(MovieView::from).collect(),
        window,
        total,
    )))
}

async fn get_movie(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MovieView>, AppError> {
    let movie = movies::get_movie(&state.db, &id)
        .await?
        .ok_or_else(|| not_found("movie"))?;
    Ok(Json(MovieView::from(movie)))
}

#[derive(Deserialize)]
struct CreateMovieRequest {
    tmdb_id: i64,
    media_type: String,
    #[serde(default)]
    featured: bool,
    #[serde(default = "premium_by_default")]
    premium: bool,
    title: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    release_date: Option<String>,
}

fn premium_by_default() -> bool {
    true
}

impl CreateMovieRequest {
    fn is_complete(&self) -> bool {
        self.title.is_some()
            && self.overview.is_some()
            && self.poster_path.is_some()
            && self.backdrop_path.is_some()
            && self.release_date.is_some()
    }
}

fn check_movie_title(title: &str) -> Result<(), ApiError> {
    let len = title.trim().chars().count();
    if len == 0 || len > 300 {
        return Err(ApiError::field("title", "must be between 1 and 300 characters"));
    }
    Ok(())
}

async fn create_movie(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(body): Json<CreateMovieRequest>,
) -> Result<(StatusCode, Json<MovieView>), AppError> {
    let (media, tmdb_id) = title_key(&body.media_type, body.tmdb_id)?;
    if let Some(ref title) = body.title {
        check_movie_title(title)?;
    }

    if movies::find_by_tmdb(&state.db, tmdb_id, media.as_str())
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("this title is already curated".into()).into());
    }

    // Fill whatever the admin left out from the catalog. Without a title the
    // entry is useless, so that failure is fatal; the rest are best effort.
    let details = if body.is_complete() {
        None
    } else {
        match state.catalog.details(media, tmdb_id).await {
            Ok(d) => Some(d),
            Err(e) if body.title.is_none() => return Err(e.into()),
            Err(e) => {
                warn!(tmdb_id, media_type = %media, error = %e, "catalog import skipped");
                None
            }
        }
    };

    let fields = MovieFields {
        title: body
            .title
            .as_deref()
            .map(|t| t.trim().to_string())
            .or_else(|| details.as_ref().map(|d| d.title.clone()))
            .unwrap_or_default(),
        overview: body
            .overview
            .or_else(|| details.as_ref().and_then(|d| d.overview.clone())),
        poster_path: body
            .poster_path
            .or_else(|| details.as_ref().and_then(|d| d.poster_path.clone())),
        backdrop_path: body
            .backdrop_path
            .or_else(|| details.as_ref().and_then(|d| d.backdrop_path.clone())),
        release_date: body
            .release_date
            .or_else(|| details.as_ref().and_then(|d| d.release_date.clone())),
        featured: body.featured,
        premium: body.premium,
    };

    let movie = movies::create_movie(&state.db, tmdb_id, media.as_str(), &fields)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict("this title is already curated".into())
            } else {
                ApiError::Internal(format!("db error: {e}"))
            }
        })?;

    info!(admin_id = %admin.user_id, tmdb_id, media_type = %media, "curated title added");
    Ok((StatusCode::CREATED, Json(MovieView::from(movie))))
}

#[derive(Deserialize)]
struct UpdateMovieRequest {
    title: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    release_date: Option<String>,
    featured: Option<bool>,
    premium: Option<bool>,
}

async fn update_movie(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateMovieRequest>,
) -> Result<Json<MovieView>, AppError> {
    let movie = movies::get_movie(&state.db, &id)
        .await?
        .ok_or_else(|| not_found("movie"))?;

    let mut fields = MovieFields::from(&movie);
    if let Some(title) = body.title {
        check_movie_title(&title)?;
        fields.title = title.trim().to_string();
    }
    if body.overview.is_some() {
        fields.overview = body.overview;
    }
    if body.poster_path.is_some() {
        fields.poster_path = body.poster_path;
    }
    if body.backdrop_path.is_some() {
        fields.backdrop_path = body.backdrop_path;
    }
    if body.release_date.is_some() {
        fields.release_date = body.release_date;
    }
    fields.featured = body.featured.unwrap_or(fields.featured);
    fields.premium = body.premium.unwrap_or(fields.premium);

    movies::update_movie(&state.db, &id, &fields).await?;
    let updated = movies::get_movie(&state.db, &id)
        .await?
        .ok_or_else(|| not_found("movie"))?;
    Ok(Json(MovieView::from(updated)))
}

async fn delete_movie(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !movies::delete_movie(&state.db, &id).await? {
        return Err(not_found("movie"));
    }
    info!(admin_id = %admin.user_id, movie_id = %id, "curated title removed");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

async fn list_plans(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PlanView>>, AppError> {
    let rows = plans::list_plans(&state.db, true).await?;
    Ok(Json(rows.iter().map(PlanView::from).collect()))
}

async fn get_plan(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlanView>, AppError> {
    let plan = plans::get_plan(&state.db, &id)
        .await?
        .ok_or_else(|| not_found("plan"))?;
    Ok(Json(PlanView::from(&plan)))
}

#[derive(Deserialize)]
struct CreatePlanRequest {
    name: String,
    description: Option<String>,
    price_cents: i64,
    currency: Option<String>,
    interval: String,
    #[serde(default)]
    features: Vec<String>,
    is_active: Option<bool>,
}

fn validate_plan(fields: &PlanFields) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    check_plan(
        &mut errors,
        &fields.name,
        fields.price_cents,
        &fields.currency,
        &fields.interval,
        &fields.features,
    );
    errors.into_result()
}

fn plan_conflict(e: sqlx::Error) -> ApiError {
    if is_unique_violation(&e) {
        ApiError::Conflict("a plan with this name already exists".into())
    } else {
        ApiError::Internal(format!("db error: {e}"))
    }
}

fn tidy_features(features: Vec<String>) -> Vec<String> {
    features.into_iter().map(|f| f.trim().to_string()).collect()
}

async fn create_plan(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(body): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<PlanView>), AppError> {
    let fields = PlanFields {
        name: body.name.trim().to_string(),
        description: body.description,
        price_cents: body.price_cents,
        currency: body
            .currency
            .unwrap_or_else(|| state.default_currency.clone()),
        interval: body.interval,
        features: tidy_features(body.features),
        is_active: body.is_active.unwrap_or(true),
    };
    validate_plan(&fields)?;

    let plan = plans::create_plan(&state.db, &fields)
        .await
        .map_err(plan_conflict)?;
    info!(admin_id = %admin.user_id, plan = %plan.name, "plan created");
    Ok((StatusCode::CREATED, Json(PlanView::from(&plan))))
}

#[derive(Deserialize)]
struct UpdatePlanRequest {
    name: Option<String>,
    description: Option<String>,
    price_cents: Option<i64>,
    currency: Option<String>,
    interval: Option<String>,
    features: Option<Vec<String>>,
    is_active: Option<bool>,
}

async fn update_plan(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdatePlanRequest>,
) -> Result<Json<PlanView>, AppError> {
    let plan = plans::get_plan(&state.db, &id)
        .await?
        .ok_or_else(|| not_found("plan"))?;

    let mut fields = PlanFields::from(&plan);
    if let Some(name) = body.name {
        fields.name = name.trim().to_string();
    }
    if body.description.is_some() {
        fields.description = body.description;
    }
    fields.price_cents = body.price_cents.unwrap_or(fields.price_cents);
    if let Some(currency) = body.currency {
        fields.currency = currency;
    }
    if let Some(interval) = body.interval {
        fields.interval = interval;
    }
    if let Some(features) = body.features {
        fields.features = tidy_features(features);
    }
    fields.is_active = body.is_active.unwrap_or(fields.is_active);
    validate_plan(&fields)?;

    plans::update_plan(&state.db, &id, &fields)
        .await
        .map_err(plan_conflict)?;
    let updated = plans::get_plan(&state.db, &id)
        .await?
        .ok_or_else(|| not_found("plan"))?;
    info!(admin_id = %admin.user_id, plan = %updated.name, "plan updated");
    Ok(Json(PlanView::from(&updated)))
}

#[derive(Serialize)]
struct PlanRemoval {
    id: String,
    /// `deleted`, or `archived` when subscriptions or payments still point at it.
    result: &'static str,
}

async fn delete_plan(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlanRemoval>, AppError> {
    if plans::get_plan(&state.db, &id).await?.is_none() {
        return Err(not_found("plan"));
    }

    let result = if plans::count_references(&state.db, &id).await? > 0 {
        plans::set_active(&state.db, &id, false).await?;
        "archived"
    } else {
        plans::delete_plan(&state.db, &id).await?;
        "deleted"
    };

    info!(admin_id = %admin.user_id, plan_id = %id, result, "plan removed");
    Ok(Json(PlanRemoval { id, result }))
}

// ---------------------------------------------------------------------------
// Subscriptions & payments
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct StatusQuery {
    status: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

impl StatusQuery {
    fn window(&self) -> PageWindow {
        PageWindow::new(self.page, self.per_page)
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Serialize)]
struct SubscriptionListView {
    id: String,
    user_id: String,
    user_email: String,
    plan_id: String,
    plan_name: String,
    status: String,
    current_period_start: i64,
    current_period_end: i64,
    cancel_at_period_end: bool,
    updated_ts: i64,
}

impl From<SubscriptionListRow> for SubscriptionListView {
    fn from(r: SubscriptionListRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            user_email: r.user_email,
            plan_id: r.plan_id,
            plan_name: r.plan_name,
            status: r.status,
            current_period_start: r.current_period_start,
            current_period_end: r.current_period_end,
            cancel_at_period_end: r.cancel_at_period_end,
            updated_ts: r.updated_ts,
        }
    }
}

async fn list_subscriptions(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(q): Query<StatusQuery>,
) -> Result<Json<Paged<SubscriptionListView>>, AppError> {
    let status = q
        .status()
        .map(|s| {
            SubscriptionStatus::parse(s)
                .ok_or_else(|| ApiError::field("status", "unknown subscription status"))
        })
        .transpose()?;
    let window = q.window();

    subscriptions::expire_lapsed(&state.db, marquee_db::now_ts()).await?;
    let (rows, total) = subscriptions::list_subscriptions(
        &state.db,
        status.map(|s| s.as_str()),
        window.limit(),
        window.offset(),
    )
    .await?;

    Ok(Json(Paged::new(
        rows.into_iter().map(SubscriptionListView::from).collect(),
        window,
        total,
    )))
}

async fn list_payments(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(q): Query<StatusQuery>,
) -> Result<Json<Paged<PaymentView>>, AppError> {
    let status = q
        .status()
        .map(|s| {
            PaymentStatus::parse(s).ok_or_else(|| ApiError::field("status", "unknown payment status"))
        })
        .transpose()?;
    let window = q.window();

    let (rows, total) = payments::list_payments(
        &state.db,
        None,
        status.map(|s| s.as_str()),
        window.limit(),
        window.offset(),
    )
    .await?;

    Ok(Json(Paged::new(
        rows.into_iter().map(PaymentView::from).collect(),
        window,
        total,
    )))
}

// ---------------------------------------------------------------------------
// Reviews
// ---------------------------------------------------------------------------

async fn list_reviews(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Result<Json<Paged<ListedReview>>, AppError> {
    let window = q.window();
    let (rows, total) =
        reviews::list_all(&state.db, None, window.limit(), window.offset()).await?;
    Ok(Json(Paged::new(
        rows.into_iter().map(ListedReview::from).collect(),
        window,
        total,
    )))
}

async fn delete_review(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !reviews::delete(&state.db, &id).await? {
        return Err(not_found("review"));
    }
    info!(admin_id = %admin.user_id, review_id = %id, "review removed");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Revenue {
    by_currency: Vec<stats::CurrencyRevenue>,
    by_plan: Vec<stats::PlanRevenue>,
}

#[derive(Serialize)]
struct StatsResponse {
    users: stats::UserCounts,
    subscriptions: Vec<stats::StatusCount>,
    revenue: Revenue,
    engagement: stats::EngagementCounts,
    top_rated: Vec<stats::TopRated>,
    most_watchlisted: Vec<stats::MostSaved>,
}

async fn get_stats(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, AppError> {
    let now = marquee_db::now_ts();
    subscriptions::expire_lapsed(&state.db, now).await?;

    Ok(Json(StatsResponse {
        users: stats::user_counts(&state.db, now - STATS_WINDOW_SECS).await?,
        subscriptions: stats::subscriptions_by_status(&state.db).await?,
        revenue: Revenue {
            by_currency: stats::revenue_by_currency(&state.db).await?,
            by_plan: stats::revenue_by_plan(&state.db).await?,
        },
        engagement: stats::engagement_counts(&state.db).await?,
        top_rated: stats::top_rated(&state.db, STATS_TOP_N).await?,
        most_watchlisted: stats::most_watchlisted(&state.db, STATS_TOP_N).await?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_movie_requests_need_import() {
        let body: CreateMovieRequest =
            serde_json::from_value(serde_json::json!({"tmdb_id": 550, "media_type": "movie"}))
                .unwrap();
        assert!(!body.is_complete());
        assert!(!body.featured);

        let full: CreateMovieRequest = serde_json::from_value(serde_json::json!({
            "tmdb_id": 550,
            "media_type": "movie",
            "title": "Fight Club",
            "overview": "",
            "poster_path": "/p.jpg",
            "backdrop_path": "/b.jpg",
            "release_date": "1999-10-15"
        }))
        .unwrap();
        assert!(full.is_complete());
    }

    #[test]
    fn plan_validation_collects_fields() {
        let fields = PlanFields {
            name: String::new(),
            description: None,
            price_cents: 0,
            currency: "etb".into(),
            interval: "week".into(),
            features: vec![],
            is_active: true,
        };
        let err = validate_plan(&fields).unwrap_err();
        assert_eq!(err.code(), "validation_failed");
    }
}
