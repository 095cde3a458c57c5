use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Simple in-memory sliding-window rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
    max_requests: u64,
    window: Duration,
}

struct RateLimiterInner {
    buckets: HashMap<String, Vec<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: u64, window_secs: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiterInner {
                buckets: HashMap::new(),
            })),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Record an attempt. Returns the remaining count, or `Err(retry_after_secs)`.
    pub async fn check(&self, key: &str) -> Result<u64, u64> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let window = self.window;

        let entries = inner.buckets.entry(key.to_string()).or_default();
        entries.retain(|t| now.duration_since(*t) < window);

        if entries.len() as u64 >= self.max_requests {
            let retry_after = entries
                .first()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window);
            Err(retry_after.as_secs().max(1))
        } else {
            entries.push(now);
            Ok(self.max_requests - entries.len() as u64)
        }
    }

    /// Forget all attempts for `key`.
    pub async fn reset(&self, key: &str) {
        self.inner.lock().await.buckets.remove(key);
    }

    /// Drop buckets whose attempts have all aged out.
    pub async fn prune(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let window = self.window;
        let before = inner.buckets.len();
        inner
            .buckets
            .retain(|_, entries| entries.iter().any(|t| now.duration_since(*t) < window));
        before - inner.buckets.len()
    }
}

/// The socket peer address. Client-supplied forwarding headers are ignored so
/// they can't be rotated to dodge the limiter.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(ClientIp(ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocks_after_limit_and_reset_clears() {
        let limiter = RateLimiter::new(2, 60);
        assert_eq!(limiter.check("k").await, Ok(1));
        assert_eq!(limiter.check("k").await, Ok(0));

        let retry = limiter.check("k").await.unwrap_err();
        assert!((1..=60).contains(&retry));

        // other keys are unaffected
        assert!(limiter.check("other").await.is_ok());

        limiter.reset("k").await;
        assert!(limiter.check("k").await.is_ok());
    }

    #[tokio::test]
    async fn prune_drops_expired_buckets() {
        let limiter = RateLimiter::new(5, 0);
        limiter.check("a").await.ok();
        assert_eq!(limiter.prune().await, 1);
    }

    #[tokio::test]
    async fn client_ip_ignores_forwarded_for() {
        let req = axum::http::Request::builder()
            .header("x-forwarded-for", "10.0.0.7")
            .extension(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))))
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip, "192.0.2.1");
    }
}
