use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Unified API error type.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Field-level validation failure; the value maps field names to message lists.
    #[error("validation failed")]
    Validation(Value),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("payment required: {0}")]
    PaymentRequired(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("too many requests")]
    TooManyRequests { retry_after_secs: u64 },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("upstream error: {0}")]
    BadGateway(String),
}

impl ApiError {
    pub fn validation(fields: Value) -> Self {
        Self::Validation(fields)
    }

    /// Single-field validation error.
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert(name.to_string(), json!([message.into()]));
        Self::Validation(Value::Object(fields))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Validation(_) => "validation_failed",
            Self::Unauthorized(_) => "unauthorized",
            Self::PaymentRequired(_) => "payment_required",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::TooManyRequests { .. } => "too_many_requests",
            Self::Internal(_) => "internal_error",
            Self::BadGateway(_) => "bad_gateway",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Validation(_) => 422,
            Self::Unauthorized(_) => 401,
            Self::PaymentRequired(_) => 402,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::TooManyRequests { .. } => 429,
            Self::Internal(_) => 500,
            Self::BadGateway(_) => 502,
        }
    }

    fn details(&self) -> Value {
        match self {
            Self::Validation(fields) => json!({ "fields": fields }),
            Self::TooManyRequests { retry_after_secs } => {
                json!({ "retry_after_seconds": retry_after_secs })
            }
            _ => Value::Object(serde_json::Map::new()),
        }
    }
}

/// JSON error envelope: `{ "error": { "code": "…", "message": "…", "details": {} } }`
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Value,
}

impl From<&ApiError> for ErrorEnvelope {
    fn from(e: &ApiError) -> Self {
        Self {
            error: ErrorBody {
                code: e.code().to_string(),
                message: e.to_string(),
                details: e.details(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_envelope_carries_fields() {
        let err = ApiError::field("email", "must be a valid email address");
        assert_eq!(err.status_code(), 422);

        let envelope = serde_json::to_value(ErrorEnvelope::from(&err)).unwrap();
        assert_eq!(envelope["error"]["code"], "validation_failed");
        assert_eq!(
            envelope["error"]["details"]["fields"]["email"][0],
            "must be a valid email address"
        );
    }

    #[test]
    fn rate_limit_envelope_reports_retry_after() {
        let err = ApiError::TooManyRequests {
            retry_after_secs: 60,
        };
        let envelope = serde_json::to_value(ErrorEnvelope::from(&err)).unwrap();
        assert_eq!(envelope["error"]["code"], "too_many_requests");
        assert_eq!(envelope["error"]["details"]["retry_after_seconds"], 60);
    }
}
