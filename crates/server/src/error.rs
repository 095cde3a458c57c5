use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use marquee_billing::BillingError;
use marquee_catalog::CatalogError;
use marquee_core::error::{ApiError, ErrorEnvelope};
use marquee_db::DbError;
use tracing::{error, warn};

use crate::oauth::OAuthError;

/// Newtype wrapper so we can implement `IntoResponse` in this crate.
#[derive(Debug)]
pub struct AppError(pub ApiError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }

        let envelope = ErrorEnvelope::from(&self.0);
        let mut resp = (status, Json(envelope)).into_response();
        if let ApiError::TooManyRequests { retry_after_secs } = self.0 {
            resp.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        resp
    }
}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        Self(e)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        Self(ApiError::Internal(format!("db error: {e}")))
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        Self(ApiError::Internal(format!("db error: {e}")))
    }
}

impl From<CatalogError> for AppError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound => Self(ApiError::NotFound("title not found".into())),
            CatalogError::Invalid(msg) => Self(ApiError::BadRequest(msg)),
            other => {
                warn!(error = %other, "catalog provider failed");
                Self(ApiError::BadGateway("catalog provider unavailable".into()))
            }
        }
    }
}

impl From<BillingError> for AppError {
    fn from(e: BillingError) -> Self {
        match e {
            BillingError::NotFound => Self(ApiError::NotFound("transaction not found".into())),
            other => {
                warn!(error = %other, "payment gateway failed");
                Self(ApiError::BadGateway(format!("payment gateway error: {other}")))
            }
        }
    }
}

impl From<OAuthError> for AppError {
    fn from(e: OAuthError) -> Self {
        warn!(error = %e, "Google sign-in failed");
        Self(ApiError::BadGateway("Google sign-in failed".into()))
    }
}
