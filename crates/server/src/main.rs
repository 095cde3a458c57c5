use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use marquee_billing::chapa::ChapaClient;
use marquee_catalog::tmdb::TmdbClient;
use marquee_core::types::UserRole;
use marquee_server::config::ServerConfig;
use marquee_server::oauth::GoogleOAuth;
use marquee_server::rate_limit::RateLimiter;
use rand::RngCore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOGIN_WINDOW_SECS: u64 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::from_env();
    info!(db_path = %config.db_path, "connecting to database");

    let pool = marquee_db::connect(&config.db_path)
        .await
        .context("failed to connect to database")?;

    marquee_db::migrate::run(&pool)
        .await
        .context("failed to run migrations")?;
    info!("migrations complete");

    // Bootstrap admin if no users exist
    let user_count = marquee_db::repo::users::count_users(&pool)
        .await
        .context("failed to count users")?;
    if user_count == 0 {
        match (&config.admin_email, &config.admin_password) {
            (Some(email), Some(password)) => {
                marquee_db::repo::users::create_user(
                    &pool,
                    email,
                    Some("Admin"),
                    Some(password.as_str()),
                    UserRole::Admin.as_str(),
                )
                .await
                .context("failed to bootstrap admin user")?;
                info!(email = %email, "admin user bootstrapped");
            }
            _ => warn!(
                "no users exist and MARQUEE_ADMIN_EMAIL/MARQUEE_ADMIN_PASSWORD are not set; \
                 no admin was created"
            ),
        }
    }

    let jwt_secret = match config.jwt_secret.clone() {
        Some(secret) => secret,
        None => {
            warn!("MARQUEE_JWT_SECRET is not set; sessions will not survive a restart");
            let mut bytes = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut bytes);
            hex::encode(bytes)
        }
    };

    let tmdb_key = config.tmdb_api_key.clone().unwrap_or_else(|| {
        warn!("TMDB_API_KEY is not set; catalog requests will fail");
        String::new()
    });
    let catalog = TmdbClient::with_base_urls(
        tmdb_key,
        &config.tmdb_base_url,
        &config.tmdb_image_base_url,
    );

    if config.chapa_secret_key.is_none() {
        warn!("CHAPA_SECRET_KEY is not set; checkout will fail");
    }
    if config.chapa_webhook_secret.is_none() {
        warn!("CHAPA_WEBHOOK_SECRET is not set; every webhook will be rejected");
    }
    let payments = ChapaClient::with_base_url(
        config.chapa_secret_key.clone().unwrap_or_default(),
        config.chapa_webhook_secret.clone().unwrap_or_default(),
        &config.chapa_base_url,
    );

    let google = config.google.as_ref().map(|g| {
        Arc::new(GoogleOAuth::new(
            g.client_id.clone(),
            g.client_secret.clone(),
            config.google_redirect_uri(),
        ))
    });
    if google.is_none() {
        info!("Google sign-in disabled");
    }

    let login_limiter = RateLimiter::new(config.login_rate_limit, LOGIN_WINDOW_SECS);

    marquee_server::maintenance::spawn(
        pool.clone(),
        login_limiter.clone(),
        Duration::from_secs(config.maintenance_secs),
    );

    let app_state = marquee_server::state::AppState {
        db: pool,
        jwt_secret,
        token_ttl_hours: config.jwt_ttl_hours,
        public_url: config.public_url.clone(),
        frontend_url: config.frontend_url.clone(),
        default_currency: config.currency.clone(),
        catalog: Arc::new(catalog),
        payments: Arc::new(payments),
        google,
        login_limiter,
    };

    let app = marquee_server::routes::build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .context("failed to bind")?;
    info!(addr = %config.bind, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
