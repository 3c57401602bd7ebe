//! Session state helpers for providers that require authentication.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, SET_COOKIE};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::model::ProviderId;
use crate::ports::PortError;

#[derive(Debug)]
struct IssuedToken {
    value: String,
    expires_at: Instant,
}

/// Bearer token cached for a fixed lifetime and refreshed lazily.
///
/// The lifetime should be shorter than what the upstream grants so a token is
/// never sent right at its real expiry. Refresh happens under the lock, so
/// concurrent callers that find the token stale wait for a single login.
#[derive(Debug)]
pub struct TokenSession {
    provider: ProviderId,
    lifetime: Duration,
    state: Mutex<Option<IssuedToken>>,
}

impl TokenSession {
    /// Create an empty session for `provider`.
    #[must_use]
    pub fn new(provider: ProviderId, lifetime: Duration) -> Self {
        Self {
            provider,
            lifetime,
            state: Mutex::new(None),
        }
    }

    /// Return the cached token, logging in first if it is missing or stale.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `login`.
    pub async fn token<F, Fut>(&self, login: F) -> Result<String, PortError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<String, PortError>> + Send,
    {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        if let Some(issued) = state.as_ref().filter(|issued| issued.expires_at > now) {
            return Ok(issued.value.clone());
        }

        debug!(provider = %self.provider, "refreshing session token");
        let value = login().await?;
        *state = Some(IssuedToken {
            value: value.clone(),
            expires_at: Instant::now() + self.lifetime,
        });
        Ok(value)
    }
}

/// Collapse `Set-Cookie` response headers into a `Cookie` request header value.
///
/// # Errors
///
/// Returns [`PortError::Malformed`] when the response set no cookies.
pub fn session_cookies(provider: &ProviderId, headers: &HeaderMap) -> Result<String, PortError> {
    let pairs: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect();

    if pairs.is_empty() {
        Err(PortError::malformed(provider, "session response set no cookie"))
    } else {
        Ok(pairs.join("; "))
    }
}
