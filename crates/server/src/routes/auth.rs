use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use marquee_core::error::ApiError;
use marquee_core::types::UserRole;
use marquee_db::repo::{accounts, users};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::views::UserView;
use crate::auth::{issue_oauth_state, issue_token, validate_oauth_state};
use crate::error::AppError;
use crate::rate_limit::ClientIp;
use crate::state::AppState;
use crate::validation::{FieldErrors, check_email, check_name, check_password};

const GOOGLE_PROVIDER: &str = "google";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/google", get(google_start))
        .route("/auth/google/callback", get(google_callback))
}

#[derive(Serialize)]
pub struct SessionResponse {
    token: String,
    user: UserView,
}

fn session_for(state: &AppState, user: &users::UserRow) -> Result<SessionResponse, AppError> {
    let token = issue_token(
        &user.id,
        &user.email,
        &user.role,
        &state.jwt_secret,
        state.token_ttl_hours,
    )?;
    Ok(SessionResponse {
        token,
        user: UserView::from(user),
    })
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    name: Option<String>,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, &body.email);
    check_password(&mut errors, "password", &body.password);
    if let Some(ref name) = body.name {
        check_name(&mut errors, name);
    }
    errors.into_result()?;

    let name = body.name.as_deref().map(str::trim);
    let user = users::create_user(
        &state.db,
        &body.email,
        name,
        Some(&body.password),
        UserRole::User.as_str(),
    )
    .await
    .map_err(|e| {
        if e.is_unique_violation() {
            ApiError::Conflict("an account with this email already exists".into())
        } else {
            ApiError::Internal(format!("db error: {e}"))
        }
    })?;

    info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(session_for(&state, &user)?)))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let email = body.email.trim().to_lowercase();
    let limit_key = format!("login:{email}:{ip}");
    state
        .login_limiter
        .check(&limit_key)
        .await
        .map_err(|retry_after_secs| ApiError::TooManyRequests { retry_after_secs })?;

    let invalid = || ApiError::Unauthorized("invalid email or password".into());

    let user = users::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(invalid)?;

    // OAuth-only accounts have no password to check against.
    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !users::verify_password(&body.password, hash)? {
        return Err(invalid().into());
    }

    state.login_limiter.reset(&limit_key).await;
    Ok(Json(session_for(&state, &user)?))
}

// ---------------------------------------------------------------------------
// Google
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AuthorizeResponse {
    url: String,
}

async fn google_start(State(state): State<AppState>) -> Result<Json<AuthorizeResponse>, AppError> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Google sign-in is not configured".into()))?;

    let oauth_state = issue_oauth_state(&state.jwt_secret)?;
    let url = google
        .authorize_url(&oauth_state)
        .map_err(|e| ApiError::Internal(format!("authorize url: {e}")))?;

    Ok(Json(AuthorizeResponse { url }))
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn google_callback(
    State(state): State<AppState>,
    Query(q): Query<CallbackQuery>,
) -> Result<Json<SessionResponse>, AppError> {
    let google = state
        .google
        .clone()
        .ok_or_else(|| ApiError::NotFound("Google sign-in is not configured".into()))?;

    if let Some(err) = q.error {
        return Err(ApiError::Unauthorized(format!("Google sign-in was not completed: {err}")).into());
    }
    validate_oauth_state(q.state.as_deref().unwrap_or_default(), &state.jwt_secret)?;
    let code = q
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing authorization code".into()))?;

    let access_token = google.exchange_code(&code).await?;
    let profile = google.fetch_profile(&access_token).await?;

    let email = match profile.email.as_deref() {
        Some(email) if profile.email_verified => email.to_lowercase(),
        _ => {
            return Err(
                ApiError::Unauthorized("Google account email is not verified".into()).into(),
            );
        }
    };

    let linked = accounts::find_user_id(&state.db, GOOGLE_PROVIDER, &profile.sub).await?;
    let user = match linked {
        Some(user_id) => users::find_by_id(&state.db, &user_id)
            .await?
            .ok_or_else(|| ApiError::Internal("linked account has no user".into()))?,
        None => {
            let user = match users::find_by_email(&state.db, &email).await? {
                Some(existing) => existing,
                None => {
                    let created = users::create_user(
                        &state.db,
                        &email,
                        profile.name.as_deref(),
                        None,
                        UserRole::User.as_str(),
                    )
                    .await?;
                    info!(user_id = %created.id, "user created from Google sign-in");
                    created
                }
            };
            accounts::link(&state.db, &user.id, GOOGLE_PROVIDER, &profile.sub).await?;
            user
        }
    };

    users::fill_profile_gaps(
        &state.db,
        &user.id,
        profile.name.as_deref(),
        profile.picture.as_deref(),
    )
    .await?;

    let user = users::find_by_id(&state.db, &user.id)
        .await?
        .ok_or_else(|| ApiError::Internal("user vanished during sign-in".into()))?;

    Ok(Json(session_for(&state, &user)?))
}
