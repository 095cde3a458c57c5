use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use marquee_core::error::ApiError;
use marquee_db::repo::library::{self, HistoryEntry, SavedEntry, SavedList};
use marquee_db::PageWindow;
use marquee_db::repo::{ratings, reviews};
use serde::{Deserialize, Serialize};

use super::Paged;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;
use crate::validation::{FieldErrors, parse_optional_media_type, title_key};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me/{list}", get(list_saved).post(add_saved))
        .route("/me/{list}/{media_type}/{tmdb_id}", delete(remove_saved))
        .route(
            "/me/history",
            get(list_history).post(record_history).delete(clear_history),
        )
        .route("/me/history/{media_type}/{tmdb_id}", delete(remove_history))
        .route("/me/status/{media_type}/{tmdb_id}", get(title_status))
}

#[derive(Deserialize)]
struct LibraryQuery {
    media_type: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

impl LibraryQuery {
    fn window(&self) -> PageWindow {
        PageWindow::new(self.page, self.per_page)
    }
}

#[derive(Serialize)]
struct SavedItem {
    tmdb_id: i64,
    media_type: String,
    title: String,
    poster_path: Option<String>,
    added_ts: i64,
}

impl From<SavedEntry> for SavedItem {
    fn from(e: SavedEntry) -> Self {
        Self {
            tmdb_id: e.tmdb_id,
            media_type: e.media_type,
            title: e.title,
            poster_path: e.poster_path,
            added_ts: e.added_ts,
        }
    }
}

#[derive(Deserialize)]
struct SaveRequest {
    tmdb_id: i64,
    media_type: String,
    title: String,
    poster_path: Option<String>,
}

fn saved_list(raw: &str) -> Result<SavedList, ApiError> {
    match raw {
        "watchlist" => Ok(SavedList::Watchlist),
        "favorites" => Ok(SavedList::Favorites),
        _ => Err(ApiError::NotFound(format!("no list named '{raw}'"))),
    }
}

fn check_title(title: &str) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    let len = title.trim().chars().count();
    if len == 0 || len > 300 {
        errors.add("title", "must be between 1 and 300 characters");
    }
    errors.into_result()
}

// ---------------------------------------------------------------------------
// Watchlist & favorites
// ---------------------------------------------------------------------------

async fn list_saved(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(list): Path<String>,
    Query(q): Query<LibraryQuery>,
) -> Result<Json<Paged<SavedItem>>, AppError> {
    let list = saved_list(&list)?;
    let media = parse_optional_media_type(q.media_type.as_deref())?;
    let window = q.window();

    let (rows, total) = library::list(
        &state.db,
        list,
        &auth.user_id,
        media.map(|m| m.as_str()),
        window.limit(),
        window.offset(),
    )
    .await?;

    Ok(Json(Paged::new(
        rows.into_iter().map(SavedItem::from).collect(),
        window,
        total,
    )))
}

#[derive(Serialize)]
struct SaveResponse {
    tmdb_id: i64,
    media_type: String,
    created: bool,
}

async fn add_saved(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(list): Path<String>,
    Json(body): Json<SaveRequest>,
) -> Result<(StatusCode, Json<SaveResponse>), AppError> {
    let list = saved_list(&list)?;
    let (media, tmdb_id) = title_key(&body.media_type, body.tmdb_id)?;
    check_title(&body.title)?;

    let created = library::add(
        &state.db,
        list,
        &auth.user_id,
        tmdb_id,
        media.as_str(),
        body.title.trim(),
        body.poster_path.as_deref(),
    )
    .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(SaveResponse {
            tmdb_id,
            media_type: media.to_string(),
            created,
        }),
    ))
}

async fn remove_saved(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((list, media_type, tmdb_id)): Path<(String, String, i64)>,
) -> Result<StatusCode, AppError> {
    let list = saved_list(&list)?;
    let (media, tmdb_id) = title_key(&media_type, tmdb_id)?;
    let removed = library::remove(&state.db, list, &auth.user_id, tmdb_id, media.as_str()).await?;
    if !removed {
        return Err(ApiError::NotFound("entry not found".into()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HistoryItem {
    tmdb_id: i64,
    media_type: String,
    title: String,
    poster_path: Option<String>,
    progress_seconds: i64,
    watched_ts: i64,
}

impl From<HistoryEntry> for HistoryItem {
    fn from(e: HistoryEntry) -> Self {
        Self {
            tmdb_id: e.tmdb_id,
            media_type: e.media_type,
            title: e.title,
            poster_path: e.poster_path,
            progress_seconds: e.progress_seconds,
            watched_ts: e.watched_ts,
        }
    }
}

async fn list_history(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(q): Query<LibraryQuery>,
) -> Result<Json<Paged<HistoryItem>>, AppError> {
    let media = parse_optional_media_type(q.media_type.as_deref())?;
    let window = q.window();

    let (rows, total) = library::list_history(
        &state.db,
        &auth.user_id,
        media.map(|m| m.as_str()),
        window.limit(),
        window.offset(),
    )
    .await?;

    Ok(Json(Paged::new(
        rows.into_iter().map(HistoryItem::from).collect(),
        window,
        total,
    )))
}

#[derive(Deserialize)]
struct HistoryRequest {
    tmdb_id: i64,
    media_type: String,
    title: String,
    poster_path: Option<String>,
    #[serde(default)]
    progress_seconds: i64,
}

async fn record_history(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<HistoryRequest>,
) -> Result<StatusCode, AppError> {
    let (media, tmdb_id) = title_key(&body.media_type, body.tmdb_id)?;
    check_title(&body.title)?;
    if body.progress_seconds < 0 {
        return Err(ApiError::field("progress_seconds", "must not be negative").into());
    }

    library::record_history(
        &state.db,
        &auth.user_id,
        tmdb_id,
        media.as_str(),
        body.title.trim(),
        body.poster_path.as_deref(),
        body.progress_seconds,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_history(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((media_type, tmdb_id)): Path<(String, i64)>,
) -> Result<StatusCode, AppError> {
    let (media, tmdb_id) = title_key(&media_type, tmdb_id)?;
    if !library::remove_history(&state.db, &auth.user_id, tmdb_id, media.as_str()).await? {
        return Err(ApiError::NotFound("history entry not found".into()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct ClearResponse {
    removed: u64,
}

async fn clear_history(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ClearResponse>, AppError> {
    let removed = library::clear_history(&state.db, &auth.user_id).await?;
    Ok(Json(ClearResponse { removed }))
}

// ---------------------------------------------------------------------------
// Per-title status
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct TitleStatus {
    in_watchlist: bool,
    is_favorite: bool,
    rating: Option<i64>,
    watched: bool,
    review_id: Option<String>,
}

async fn title_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((media_type, tmdb_id)): Path<(String, i64)>,
) -> Result<Json<TitleStatus>, AppError> {
    let (media, tmdb_id) = title_key(&media_type, tmdb_id)?;
    let media = media.as_str();
    let uid = auth.user_id.as_str();

    Ok(Json(TitleStatus {
        in_watchlist: library::contains(&state.db, SavedList::Watchlist, uid, tmdb_id, media)
            .await?,
        is_favorite: library::contains(&state.db, SavedList::Favorites, uid, tmdb_id, media)
            .await?,
        rating: ratings::get(&state.db, uid, tmdb_id, media).await?,
        watched: library::has_watched(&state.db, uid, tmdb_id, media).await?,
        review_id: reviews::find_for_user(&state.db, uid, tmdb_id, media)
            .await?
            .map(|r| r.id),
    }))
}
