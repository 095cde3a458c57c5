use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use marquee_core::error::ApiError;
use marquee_core::types::UserRole;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

/// JWT claims payload.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user ID
    pub email: String,
    pub role: String,
    pub exp: usize,
}

/// Issue a JWT token for a user.
pub fn issue_token(
    user_id: &str,
    email: &str,
    role: &str,
    secret: &str,
    ttl_hours: i64,
) -> Result<String, AppError> {
    let exp = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(ttl_hours))
        .ok_or_else(|| ApiError::Internal("time overflow".into()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failed: {e}")).into())
}

/// Validate a JWT token and return claims.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| ApiError::Unauthorized(format!("invalid token: {e}")))?;

    Ok(data.claims)
}

// ---------------------------------------------------------------------------
// OAuth state
// ---------------------------------------------------------------------------

const OAUTH_STATE_PURPOSE: &str = "google_oauth_state";
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Serialize, Deserialize)]
struct OAuthStateClaims {
    nonce: String,
    purpose: String,
    exp: usize,
}

/// Short-lived signed `state` parameter for the OAuth round trip.
pub fn issue_oauth_state(secret: &str) -> Result<String, AppError> {
    let exp = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::minutes(OAUTH_STATE_TTL_MINUTES))
        .ok_or_else(|| ApiError::Internal("time overflow".into()))?
        .timestamp() as usize;

    let claims = OAuthStateClaims {
        nonce: uuid::Uuid::new_v4().simple().to_string(),
        purpose: OAUTH_STATE_PURPOSE.to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("state encoding failed: {e}")).into())
}

pub fn validate_oauth_state(state: &str, secret: &str) -> Result<(), ApiError> {
    let data = decode::<OAuthStateClaims>(
        state,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized("invalid or expired OAuth state".into()))?;

    if data.claims.purpose != OAUTH_STATE_PURPOSE {
        return Err(ApiError::Unauthorized("invalid or expired OAuth state".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// Authenticated user extractor. Pulls the Bearer token from the Authorization
/// header and re-reads the user so deleted accounts and role changes take effect
/// immediately.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("invalid authorization scheme".into()))?;

        let claims = validate_token(token, &state.jwt_secret)?;

        let user = marquee_db::repo::users::find_by_id(&state.db, &claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("account no longer exists".into()))?;

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
            role: UserRole::parse(&user.role).unwrap_or(UserRole::User),
        })
    }
}

/// Admin-only extractor. Rejects non-admin users with 403.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: String,
    pub email: String,
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden("admin access required".into()).into());
        }
        Ok(AdminUser {
            user_id: user.user_id,
            email: user.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let token = issue_token("u1", "a@example.com", "admin", "secret", 1).unwrap();
        let claims = validate_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, "admin");
        assert!(validate_token(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token("u1", "a@example.com", "user", "secret", -2).unwrap();
        assert!(matches!(
            validate_token(&token, "secret"),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn oauth_state_is_not_a_session_token() {
        let state = issue_oauth_state("secret").unwrap();
        assert!(validate_oauth_state(&state, "secret").is_ok());
        assert!(validate_token(&state, "secret").is_err());

        let session = issue_token("u1", "a@example.com", "user", "secret", 1).unwrap();
        assert!(validate_oauth_state(&session, "secret").is_err());
        assert!(validate_oauth_state(&state, "wrong").is_err());
    }
}
