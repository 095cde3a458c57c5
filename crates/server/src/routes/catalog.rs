use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use marquee_catalog::moods::{self, Mood};
use marquee_catalog::{
    DiscoverFilter, Genre, ListCategory, MediaDetails, MediaSummary, Page, SeasonDetails, SortBy,
    TimeWindow, clamp_page,
};
use marquee_core::error::ApiError;
use marquee_core::types::MediaType;
use marquee_db::repo::library::{self, SavedList};
use marquee_db::repo::{movies, subscriptions};
use serde::{Deserialize, Serialize};

use super::views::MovieView;
use super::{PageQuery, Paged};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;
use crate::validation::{parse_media_type, parse_optional_media_type, search_query, title_key};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/catalog/trending", get(trending))
        .route("/catalog/search", get(search))
        .route("/catalog/{media_type}/genres", get(genres))
        .route("/catalog/{media_type}/discover", get(discover))
        .route("/catalog/{media_type}/list/{category}", get(list_category))
        .route("/catalog/{media_type}/{tmdb_id}", get(details))
        .route("/catalog/{media_type}/{tmdb_id}/similar", get(similar))
        .route(
            "/catalog/{media_type}/{tmdb_id}/season/{season_number}",
            get(season),
        )
        .route("/recommendations", get(recommendations))
        .route("/recommendations/moods", get(list_moods))
        .route("/movies", get(list_curated))
        .route("/movies/{id}", get(get_curated))
        .route("/watch/{media_type}/{tmdb_id}", get(watch))
}

#[derive(Deserialize)]
struct CatalogPage {
    page: Option<u32>,
}

// ---------------------------------------------------------------------------
// TMDb browsing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TrendingQuery {
    media_type: Option<String>,
    window: Option<String>,
    page: Option<u32>,
}

async fn trending(
    State(state): State<AppState>,
    Query(q): Query<TrendingQuery>,
) -> Result<Json<Page<MediaSummary>>, AppError> {
    let media = parse_optional_media_type(q.media_type.as_deref())?;
    let window = match q.window.as_deref() {
        None | Some("") => TimeWindow::Week,
        Some(w) => TimeWindow::parse(w)
            .ok_or_else(|| ApiError::field("window", "must be 'day' or 'week'"))?,
    };

    let page = state
        .catalog
        .trending(media, window, clamp_page(q.page))
        .await?;
    Ok(Json(page))
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
    media_type: Option<String>,
    page: Option<u32>,
}

async fn search(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Page<MediaSummary>>, AppError> {
    let query = search_query(q.q.as_deref())?;
    let media = parse_optional_media_type(q.media_type.as_deref())?;

    let page = state
        .catalog
        .search(&query, media, clamp_page(q.page))
        .await?;
    Ok(Json(page))
}

async fn list_category(
    State(state): State<AppState>,
    Path((media_type, category)): Path<(String, String)>,
    Query(q): Query<CatalogPage>,
) -> Result<Json<Page<MediaSummary>>, AppError> {
    let media = parse_media_type(&media_type)?;
    let category = ListCategory::parse(&category)
        .filter(|c| c.supports(media))
        .ok_or_else(|| ApiError::NotFound(format!("no '{category}' list for {media}")))?;

    let page = state
        .catalog
        .list(media, category, clamp_page(q.page))
        .await?;
    Ok(Json(page))
}

async fn details(
    State(state): State<AppState>,
    Path((media_type, tmdb_id)): Path<(String, i64)>,
) -> Result<Json<MediaDetails>, AppError> {
    let (media, tmdb_id) = title_key(&media_type, tmdb_id)?;
    Ok(Json(state.catalog.details(media, tmdb_id).await?))
}

async fn season(
    State(state): State<AppState>,
    Path((media_type, tmdb_id, season_number)): Path<(String, i64, i32)>,
) -> Result<Json<SeasonDetails>, AppError> {
    let (media, tmdb_id) = title_key(&media_type, tmdb_id)?;
    if media != MediaType::Tv {
        return Err(ApiError::NotFound("seasons exist only for tv".into()).into());
    }
    if season_number < 0 {
        return Err(ApiError::field("season_number", "must not be negative").into());
    }
    Ok(Json(state.catalog.season(tmdb_id, season_number).await?))
}

async fn genres(
    State(state): State<AppState>,
    Path(media_type): Path<String>,
) -> Result<Json<Vec<Genre>>, AppError> {
    let media = parse_media_type(&media_type)?;
    Ok(Json(state.catalog.genres(media).await?))
}

#[derive(Deserialize)]
struct DiscoverQuery {
    /// Comma-separated TMDb genre ids.
    genres: Option<String>,
    year: Option<i32>,
    sort_by: Option<String>,
    page: Option<u32>,
}

fn parse_genre_ids(raw: Option<&str>) -> Result<Vec<i64>, ApiError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| ApiError::field("genres", "must be a comma-separated list of ids"))
        })
        .collect()
}

async fn discover(
    State(state): State<AppState>,
    Path(media_type): Path<String>,
    Query(q): Query<DiscoverQuery>,
) -> Result<Json<Page<MediaSummary>>, AppError> {
    let media = parse_media_type(&media_type)?;
    let genre_ids = parse_genre_ids(q.genres.as_deref())?;
    let sort_by = match q.sort_by.as_deref() {
        None | Some("") => None,
        Some(s) => Some(SortBy::parse(s).filter(|s| s.supports(media)).ok_or_else(|| {
            ApiError::field("sort_by", format!("'{s}' is not a valid ordering for {media}"))
        })?),
    };
    if let Some(year) = q.year {
        if !(1870..=2100).contains(&year) {
            return Err(ApiError::field("year", "must be between 1870 and 2100").into());
        }
    }

    let filter = DiscoverFilter {
        genre_ids,
        match_any_genre: false,
        year: q.year,
        sort_by,
    };
    let page = state
        .catalog
        .discover(media, &filter, clamp_page(q.page))
        .await?;
    Ok(Json(page))
}

async fn similar(
    State(state): State<AppState>,
    Path((media_type, tmdb_id)): Path<(String, i64)>,
    Query(q): Query<CatalogPage>,
) -> Result<Json<Page<MediaSummary>>, AppError> {
    let (media, tmdb_id) = title_key(&media_type, tmdb_id)?;
    let page = state
        .catalog
        .similar(media, tmdb_id, clamp_page(q.page))
        .await?;
    Ok(Json(page))
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RecommendationQuery {
    mood: Option<String>,
    media_type: Option<String>,
    page: Option<u32>,
}

#[derive(Serialize)]
struct BasedOn {
    tmdb_id: i64,
    media_type: String,
    title: String,
}

#[derive(Serialize)]
struct RecommendationResponse {
    /// `mood`, `favorite` or `trending`.
    source: &'static str,
    mood: Option<&'static Mood>,
    based_on: Option<BasedOn>,
    results: Page<MediaSummary>,
}

async fn recommendations(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(q): Query<RecommendationQuery>,
) -> Result<Json<RecommendationResponse>, AppError> {
    let media = parse_optional_media_type(q.media_type.as_deref())?;
    let page = clamp_page(q.page);

    if let Some(slug) = q.mood.as_deref().filter(|m| !m.trim().is_empty()) {
        let mood = moods::find(slug).ok_or_else(|| {
            let known: Vec<_> = moods::MOODS.iter().map(|m| m.slug).collect();
            ApiError::field("mood", format!("must be one of: {}", known.join(", ")))
        })?;
        let media = media.unwrap_or(MediaType::Movie);
        let filter = DiscoverFilter {
            genre_ids: mood.genres_for(media).to_vec(),
            match_any_genre: true,
            year: None,
            sort_by: Some(SortBy::PopularityDesc),
        };
        let results = state.catalog.discover(media, &filter, page).await?;
        return Ok(Json(RecommendationResponse {
            source: "mood",
            mood: Some(mood),
            based_on: None,
            results,
        }));
    }

    let favorite = library::latest(
        &state.db,
        SavedList::Favorites,
        &auth.user_id,
        media.map(MediaType::as_str),
    )
    .await?;

    if let Some(fav) = favorite {
        if let Some(fav_media) = MediaType::parse(&fav.media_type) {
            let results = state.catalog.similar(fav_media, fav.tmdb_id, page).await?;
            if !results.results.is_empty() {
                return Ok(Json(RecommendationResponse {
                    source: "favorite",
                    mood: None,
                    based_on: Some(BasedOn {
                        tmdb_id: fav.tmdb_id,
                        media_type: fav.media_type,
                        title: fav.title,
                    }),
                    results,
                }));
            }
        }
    }

    let results = state.catalog.trending(media, TimeWindow::Week, page).await?;
    Ok(Json(RecommendationResponse {
        source: "trending",
        mood: None,
        based_on: None,
        results,
    }))
}

async fn list_moods() -> Json<&'static [Mood]> {
    Json(moods::MOODS)
}

// ---------------------------------------------------------------------------
// Curated movies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CuratedQuery {
    featured: Option<bool>,
    media_type: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

async fn list_curated(
    State(state): State<AppState>,
    Query(q): Query<CuratedQuery>,
) -> Result<Json<Paged<MovieView>>, AppError> {
    let media = parse_optional_media_type(q.media_type.as_deref())?;
    let window = PageQuery {
        page: q.page,
        per_page: q.per_page,
    }
    .window();

    let (rows, total) = movies::list_movies(
        &state.db,
        q.featured,
        media.map(MediaType::as_str),
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

async fn get_curated(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MovieView>, AppError> {
    let movie = movies::get_movie(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound("movie not found".into()))?;
    Ok(Json(MovieView::from(movie)))
}

// ---------------------------------------------------------------------------
// Watch
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct WatchResponse {
    details: MediaDetails,
    /// YouTube keys, trailers first.
    trailer_keys: Vec<String>,
    free: bool,
}

async fn watch(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((media_type, tmdb_id)): Path<(String, i64)>,
) -> Result<Json<WatchResponse>, AppError> {
    let (media, tmdb_id) = title_key(&media_type, tmdb_id)?;

    let free = movies::find_by_tmdb(&state.db, tmdb_id, media.as_str())
        .await?
        .map(|m| !m.premium)
        .unwrap_or(false);

    if !free && !auth.is_admin() {
        let now = marquee_db::now_ts();
        let entitled = subscriptions::get_for_user(&state.db, &auth.user_id)
            .await?
            .is_some_and(|s| s.grants_access(now));
        if !entitled {
            return Err(
                ApiError::PaymentRequired("an active subscription is required".into()).into(),
            );
        }
    }

    let details = state.catalog.details(media, tmdb_id).await?;
    library::touch_history(
        &state.db,
        &auth.user_id,
        tmdb_id,
        media.as_str(),
        &details.title,
        details.poster_path.as_deref(),
    )
    .await?;

    let trailer_keys = details.videos.iter().map(|v| v.key.clone()).collect();
    Ok(Json(WatchResponse {
        details,
        trailer_keys,
        free,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genre_ids_parse() {
        assert_eq!(parse_genre_ids(Some("28, 12,,878")).unwrap(), [28, 12, 878]);
        assert!(parse_genre_ids(None).unwrap().is_empty());
        assert!(parse_genre_ids(Some("28,action")).is_err());
        assert!(parse_genre_ids(Some("-1")).is_err());
    }
}
