use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use marquee_core::error::ApiError;
use marquee_core::types::MediaType;
use marquee_db::repo::ratings::{self, RatingRow};
use marquee_db::repo::reviews::{self, ReviewRow, ReviewWithAuthor};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{PageQuery, Paged};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;
use crate::validation::{FieldErrors, check_review, check_tmdb_id, title_key};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/ratings/{media_type}/{tmdb_id}",
            get(rating_summary).put(rate_title).delete(unrate_title),
        )
        .route("/me/ratings", get(my_ratings))
        .nest("/reviews/movie", title_reviews(MediaType::Movie))
        .nest("/reviews/tv", title_reviews(MediaType::Tv))
        .route("/reviews/{id}", patch(update_review).delete(delete_review))
        .route("/me/reviews", get(my_reviews))
}

/// `/{tmdb_id}` routes for one media type. Review ids share the segment after
/// `/reviews`, so the media type is a literal prefix rather than a parameter.
fn title_reviews(media: MediaType) -> Router<AppState> {
    Router::new().route(
        "/{tmdb_id}",
        get(
            move |state: State<AppState>, path: Path<i64>, q: Query<PageQuery>| {
                list_title_reviews(media, state, path, q)
            },
        )
        .post(
            move |auth: AuthUser,
                  state: State<AppState>,
                  path: Path<i64>,
                  body: Json<ReviewRequest>| {
                create_review(media, auth, state, path, body)
            },
        ),
    )
}

// ---------------------------------------------------------------------------
// Ratings
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RateRequest {
    value: i64,
}

#[derive(Serialize)]
struct RatingView {
    tmdb_id: i64,
    media_type: String,
    value: i64,
}

async fn rate_title(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((media_type, tmdb_id)): Path<(String, i64)>,
    Json(body): Json<RateRequest>,
) -> Result<Json<RatingView>, AppError> {
    let (media, tmdb_id) = title_key(&media_type, tmdb_id)?;
    if !(1..=10).contains(&body.value) {
        return Err(ApiError::field("value", "must be between 1 and 10").into());
    }

    ratings::upsert(&state.db, &auth.user_id, tmdb_id, media.as_str(), body.value).await?;
    Ok(Json(RatingView {
        tmdb_id,
        media_type: media.to_string(),
        value: body.value,
    }))
}

async fn unrate_title(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((media_type, tmdb_id)): Path<(String, i64)>,
) -> Result<StatusCode, AppError> {
    let (media, tmdb_id) = title_key(&media_type, tmdb_id)?;
    if !ratings::delete(&state.db, &auth.user_id, tmdb_id, media.as_str()).await? {
        return Err(ApiError::NotFound("rating not found".into()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct RatingSummary {
    average: Option<f64>,
    count: i64,
}

async fn rating_summary(
    State(state): State<AppState>,
    Path((media_type, tmdb_id)): Path<(String, i64)>,
) -> Result<Json<RatingSummary>, AppError> {
    let (media, tmdb_id) = title_key(&media_type, tmdb_id)?;
    let (average, count) = ratings::summary(&state.db, tmdb_id, media.as_str()).await?;
    Ok(Json(RatingSummary {
        // One decimal is all the UI shows.
        average: average.map(|a| (a * 10.0).round() / 10.0),
        count,
    }))
}

#[derive(Serialize)]
struct MyRating {
    tmdb_id: i64,
    media_type: String,
    value: i64,
    updated_ts: i64,
}

impl From<RatingRow> for MyRating {
    fn from(r: RatingRow) -> Self {
        Self {
            tmdb_id: r.tmdb_id,
            media_type: r.media_type,
            value: r.value,
            updated_ts: r.updated_ts,
        }
    }
}

async fn my_ratings(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Result<Json<Paged<MyRating>>, AppError> {
    let window = q.window();
    let (rows, total) =
        ratings::list_for_user(&state.db, &auth.user_id, window.limit(), window.offset()).await?;
    Ok(Json(Paged::new(
        rows.into_iter().map(MyRating::from).collect(),
        window,
        total,
    )))
}

// ---------------------------------------------------------------------------
// Reviews
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ReviewView {
    pub id: String,
    pub user_id: String,
    pub tmdb_id: i64,
    pub media_type: String,
    pub title: Option<String>,
    pub body: String,
    pub created_ts: i64,
    pub updated_ts: i64,
}

impl From<ReviewRow> for ReviewView {
    fn from(r: ReviewRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            tmdb_id: r.tmdb_id,
            media_type: r.media_type,
            title: r.title,
            body: r.body,
            created_ts: r.created_ts,
            updated_ts: r.updated_ts,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthorView {
    pub name: Option<String>,
    pub image: Option<String>,
    pub rating: Option<i64>,
}

/// A review as listed publicly, with its author.
#[derive(Debug, Serialize)]
pub struct ListedReview {
    #[serde(flatten)]
    pub review: ReviewView,
    pub author: AuthorView,
}

impl From<ReviewWithAuthor> for ListedReview {
    fn from(r: ReviewWithAuthor) -> Self {
        Self {
            author: AuthorView {
                name: r.author_name,
                image: r.author_image,
                rating: r.author_rating,
            },
            review: ReviewView {
                id: r.id,
                user_id: r.user_id,
                tmdb_id: r.tmdb_id,
                media_type: r.media_type,
                title: r.title,
                body: r.body,
                created_ts: r.created_ts,
                updated_ts: r.updated_ts,
            },
        }
    }
}

#[derive(Deserialize)]
struct ReviewRequest {
    title: Option<String>,
    body: String,
}

impl ReviewRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        check_review(&mut errors, self.title.as_deref(), &self.body);
        errors.into_result()
    }

    /// Trimmed title; blank titles are stored as NULL.
    fn title(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

async fn list_title_reviews(
    media: MediaType,
    State(state): State<AppState>,
    Path(tmdb_id): Path<i64>,
    Query(q): Query<PageQuery>,
) -> Result<Json<Paged<ListedReview>>, AppError> {
    check_tmdb_id(tmdb_id)?;
    let window = q.window();
    let (rows, total) = reviews::list_for_title(
        &state.db,
        tmdb_id,
        media.as_str(),
        window.limit(),
        window.offset(),
    )
    .await?;

    Ok(Json(Paged::new(
        rows.into_iter().map(ListedReview::from).collect(),
        window,
        total,
    )))
}

async fn create_review(
    media: MediaType,
    auth: AuthUser,
    State(state): State<AppState>,
    Path(tmdb_id): Path<i64>,
    Json(body): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<ReviewView>), AppError> {
    check_tmdb_id(tmdb_id)?;
    body.validate()?;

    let review = reviews::create(
        &state.db,
        &auth.user_id,
        tmdb_id,
        media.as_str(),
        body.title(),
        body.body.trim(),
    )
    .await
    .map_err(|e| {
        if marquee_db::is_unique_violation(&e) {
            ApiError::Conflict("you have already reviewed this title".into())
        } else {
            ApiError::Internal(format!("db error: {e}"))
        }
    })?;

    info!(user_id = %auth.user_id, review_id = %review.id, "review posted");
    Ok((StatusCode::CREATED, Json(ReviewView::from(review))))
}

async fn load_review(state: &AppState, id: &str) -> Result<ReviewRow, AppError> {
    reviews::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("review not found".into()).into())
}

async fn update_review(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<ReviewView>, AppError> {
    let review = load_review(&state, &id).await?;
    if review.user_id != auth.user_id {
        return Err(ApiError::Forbidden("only the author can edit a review".into()).into());
    }
    body.validate()?;

    reviews::update(&state.db, &id, body.title(), body.body.trim()).await?;
    let updated = load_review(&state, &id).await?;
    Ok(Json(ReviewView::from(updated)))
}

async fn delete_review(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let review = load_review(&state, &id).await?;
    if review.user_id != auth.user_id && !auth.is_admin() {
        return Err(ApiError::Forbidden("you cannot delete this review".into()).into());
    }

    reviews::delete(&state.db, &id).await?;
    if review.user_id != auth.user_id {
        info!(admin_id = %auth.user_id, review_id = %id, "review removed by admin");
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn my_reviews(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Result<Json<Paged<ListedReview>>, AppError> {
    let window = q.window();
    let (rows, total) = reviews::list_all(
        &state.db,
        Some(&auth.user_id),
        window.limit(),
        window.offset(),
    )
    .await?;
    Ok(Json(Paged::new(
        rows.into_iter().map(ListedReview::from).collect(),
        window,
        total,
    )))
}
