use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use marquee_core::error::ApiError;
use marquee_db::repo::{accounts, users};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::views::{SubscriptionView, UserView, load_subscription};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;
use crate::validation::{FieldErrors, check_image_url, check_name, check_password};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).patch(update_me).delete(delete_me))
        .route("/me/password", post(change_password))
}

#[derive(Serialize)]
struct MeResponse {
    #[serde(flatten)]
    user: UserView,
    providers: Vec<String>,
    subscription: Option<SubscriptionView>,
}

async fn load_user(state: &AppState, user_id: &str) -> Result<users::UserRow, AppError> {
    users::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()).into())
}

async fn get_me(auth: AuthUser, State(state): State<AppState>) -> Result<Json<MeResponse>, AppError> {
    let user = load_user(&state, &auth.user_id).await?;
    let providers = accounts::providers_for_user(&state.db, &user.id).await?;
    let subscription = load_subscription(&state.db, &user.id).await?;

    Ok(Json(MeResponse {
        user: UserView::from(&user),
        providers,
        subscription,
    }))
}

#[derive(Deserialize)]
struct UpdateMeRequest {
    name: Option<String>,
    /// An empty string clears the avatar.
    image: Option<String>,
}

async fn update_me(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<UpdateMeRequest>,
) -> Result<Json<UserView>, AppError> {
    let mut errors = FieldErrors::new();
    if let Some(ref name) = body.name {
        check_name(&mut errors, name);
    }
    if let Some(ref image) = body.image {
        if !image.is_empty() {
            check_image_url(&mut errors, image);
        }
    }
    errors.into_result()?;

    let user = load_user(&state, &auth.user_id).await?;
    let name = body.name.as_deref().map(str::trim).or(user.name.as_deref());
    let image = match body.image.as_deref() {
        Some("") => None,
        Some(url) => Some(url),
        None => user.image.as_deref(),
    };

    users::update_profile(&state.db, &user.id, name, image).await?;
    let updated = load_user(&state, &user.id).await?;
    Ok(Json(UserView::from(&updated)))
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    current_password: Option<String>,
    new_password: String,
}

async fn change_password(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    let mut errors = FieldErrors::new();
    check_password(&mut errors, "new_password", &body.new_password);
    errors.into_result()?;

    let user = load_user(&state, &auth.user_id).await?;
    if let Some(ref hash) = user.password_hash {
        let current = body
            .current_password
            .as_deref()
            .ok_or_else(|| ApiError::field("current_password", "is required"))?;
        if !users::verify_password(current, hash)? {
            return Err(ApiError::Unauthorized("current password is incorrect".into()).into());
        }
    }

    users::set_password(&state.db, &user.id, &body.new_password).await?;
    info!(user_id = %user.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_me(auth: AuthUser, State(state): State<AppState>) -> Result<StatusCode, AppError> {
    if auth.is_admin() && users::count_admins(&state.db).await? <= 1 {
        return Err(ApiError::Conflict("the last admin account cannot be deleted".into()).into());
    }

    users::delete_user(&state.db, &auth.user_id).await?;
    info!(user_id = %auth.user_id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}
