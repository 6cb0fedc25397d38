use std::{fmt, future::Future, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;

use super::error::PaymentError;

/// Bearer token issued by the gateway's client-credentials endpoint.
#[derive(Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token cache owned by one gateway client.
///
/// A fresh token is served from a short synchronous read lock that is never
/// held across an await. Refreshes go through `refresh`, and whoever gets the
/// mutex re-checks the cache first, so callers piling up behind an expired
/// token share a single upstream request.
pub struct TokenCache {
    current: RwLock<Option<Arc<AccessToken>>>,
    refresh: Mutex<()>,
    safety_margin: Duration,
}

impl TokenCache {
    pub const DEFAULT_SAFETY_MARGIN_SECS: i64 = 60;

    pub fn new(safety_margin: Duration) -> Self {
        Self {
            current: RwLock::new(None),
            refresh: Mutex::new(()),
            safety_margin,
        }
    }

    pub fn fresh(&self, now: DateTime<Utc>) -> Option<Arc<AccessToken>> {
        self.current
            .read()
            .as_ref()
            .filter(|token| now < token.expires_at - self.safety_margin)
            .cloned()
    }

    pub async fn get_or_refresh<F, Fut>(&self, fetch: F) -> Result<Arc<AccessToken>, PaymentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AccessToken, PaymentError>>,
    {
        if let Some(token) = self.fresh(Utc::now()) {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;
        if let Some(token) = self.fresh(Utc::now()) {
            return Ok(token);
        }

        let token = Arc::new(fetch().await?);
        *self.current.write() = Some(Arc::clone(&token));
        Ok(token)
    }

    pub fn invalidate(&self) {
        *self.current.write() = None;
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(Duration::seconds(Self::DEFAULT_SAFETY_MARGIN_SECS))
    }
}
