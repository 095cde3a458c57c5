//! Environment-driven server configuration.

use marquee_billing::chapa;
use marquee_catalog::tmdb;

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: String,
    pub bind: String,
    /// Base URL this API is reachable at; used for gateway callbacks.
    pub public_url: String,
    /// Base URL of the web frontend; used for CORS and checkout return pages.
    pub frontend_url: String,
    pub jwt_secret: Option<String>,
    pub jwt_ttl_hours: i64,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub tmdb_api_key: Option<String>,
    pub tmdb_base_url: String,
    pub tmdb_image_base_url: String,
    pub chapa_secret_key: Option<String>,
    pub chapa_webhook_secret: Option<String>,
    pub chapa_base_url: String,
    pub currency: String,
    pub google: Option<GoogleConfig>,
    pub login_rate_limit: u64,
    pub maintenance_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let google = match (get("GOOGLE_CLIENT_ID"), get("GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(GoogleConfig {
                client_id,
                client_secret,
            }),
            _ => None,
        };

        Self {
            db_path: or("MARQUEE_DB", "marquee.db"),
            bind: or("MARQUEE_BIND", "0.0.0.0:8080"),
            public_url: or("MARQUEE_PUBLIC_URL", "http://localhost:8080")
                .trim_end_matches('/')
                .to_string(),
            frontend_url: or("MARQUEE_FRONTEND_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            jwt_secret: get("MARQUEE_JWT_SECRET"),
            jwt_ttl_hours: get("MARQUEE_JWT_TTL_HOURS")
                .and_then(|v| v.parse().ok())
                .filter(|h: &i64| *h > 0)
                .unwrap_or(24 * 7),
            admin_email: get("MARQUEE_ADMIN_EMAIL"),
            admin_password: get("MARQUEE_ADMIN_PASSWORD"),
            tmdb_api_key: get("TMDB_API_KEY"),
            tmdb_base_url: or("TMDB_BASE_URL", tmdb::DEFAULT_BASE_URL),
            tmdb_image_base_url: or("TMDB_IMAGE_BASE_URL", tmdb::DEFAULT_IMAGE_BASE),
            chapa_secret_key: get("CHAPA_SECRET_KEY"),
            chapa_webhook_secret: get("CHAPA_WEBHOOK_SECRET"),
            chapa_base_url: or("CHAPA_BASE_URL", chapa::DEFAULT_BASE_URL),
            currency: or("MARQUEE_CURRENCY", "ETB").to_ascii_uppercase(),
            google,
            login_rate_limit: get("MARQUEE_LOGIN_RATE_LIMIT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            maintenance_secs: get("MARQUEE_MAINTENANCE_SECS")
                .and_then(|v| v.parse().ok())
                .filter(|s: &u64| *s > 0)
                .unwrap_or(300),
        }
    }

    /// Where Google sends the user back after consent.
    pub fn google_redirect_uri(&self) -> String {
        format!("{}/api/v1/auth/google/callback", self.public_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> ServerConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let c = config(&[]);
        assert_eq!(c.bind, "0.0.0.0:8080");
        assert_eq!(c.frontend_url, "http://localhost:3000");
        assert_eq!(c.jwt_ttl_hours, 168);
        assert_eq!(c.currency, "ETB");
        assert_eq!(c.login_rate_limit, 10);
        assert!(c.jwt_secret.is_none());
        assert!(c.google.is_none());
    }

    #[test]
    fn google_needs_both_credentials() {
        assert!(config(&[("GOOGLE_CLIENT_ID", "id")]).google.is_none());
        let c = config(&[("GOOGLE_CLIENT_ID", "id"), ("GOOGLE_CLIENT_SECRET", "s")]);
        assert_eq!(c.google.unwrap().client_id, "id");
    }

    #[test]
    fn bad_numbers_fall_back_and_urls_are_trimmed() {
        let c = config(&[
            ("MARQUEE_JWT_TTL_HOURS", "-3"),
            ("MARQUEE_MAINTENANCE_SECS", "soon"),
            ("MARQUEE_PUBLIC_URL", "https://api.example.com/"),
            ("MARQUEE_JWT_SECRET", "  "),
        ]);
        assert_eq!(c.jwt_ttl_hours, 168);
        assert_eq!(c.maintenance_secs, 300);
        assert!(c.jwt_secret.is_none());
        assert_eq!(
            c.google_redirect_uri(),
            "https://api.example.com/api/v1/auth/google/callback"
        );
    }
}
