use std::sync::Arc;

use marquee_billing::PaymentGateway;
use marquee_catalog::provider::CatalogProvider;
use sqlx::SqlitePool;

use crate::oauth::GoogleOAuth;
use crate::rate_limit::RateLimiter;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub public_url: String,
    pub frontend_url: String,
    /// Currency for new plans that don't name one.
    pub default_currency: String,
    pub catalog: Arc<dyn CatalogProvider>,
    pub payments: Arc<dyn PaymentGateway>,
    /// `None` when Google login is not configured.
    pub google: Option<Arc<GoogleOAuth>>,
    pub login_limiter: RateLimiter,
}
