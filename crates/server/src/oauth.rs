//! Google OAuth 2.0 authorization-code flow.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Error, Debug)]
pub enum OAuthError {
    #[error("network error: {0}")]
    Network(String),
    #[error("provider error: {0}")]
    Provider(String),
}

/// The subset of the OpenID userinfo response we use.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct GoogleOAuth {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    client: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            client: reqwest::Client::new(),
        }
    }

    /// Consent screen URL carrying our signed `state`.
    pub fn authorize_url(&self, state: &str) -> Result<String, url::ParseError> {
        let url = url::Url::parse_with_params(
            AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )?;
        Ok(url.into())
    }

    pub async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        debug!("Google token exchange");
        let resp = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| OAuthError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(OAuthError::Provider(format!(
                "token endpoint returned {}",
                resp.status()
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| OAuthError::Provider(format!("parse token response: {e}")))?;
        Ok(token.access_token)
    }

    pub async fn fetch_profile(&self, access_token: &str) -> Result<GoogleProfile, OAuthError> {
        let resp = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(OAuthError::Provider(format!(
                "userinfo endpoint returned {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| OAuthError::Provider(format!("parse userinfo: {e}")))
    }
}
