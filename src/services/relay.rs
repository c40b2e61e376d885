//! Downstream relay: OAuth password grant, then a bearer-authenticated POST

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, redirect::Policy, Client};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::{ExportConfig, TokenPolicy};
use crate::domain::aggregates::OutboundPayload;
use crate::domain::value_objects::AccessToken;
use crate::{ExportError, Result};

const MAX_AUTH_REDIRECTS: usize = 10;
const MAX_ERROR_BODY: usize = 512;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// One token exchange attempt. No retry.
    async fn authenticate(&self) -> Result<AccessToken>;

    /// Forget any token held beyond the current call
    async fn invalidate(&self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RelayReceipt { pub status: u16 }

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Relay: Send + Sync {
    async fn relay(&self, payload: &OutboundPayload, token: &AccessToken) -> Result<RelayReceipt>;
}

// =============================================================================
// Password grant
// =============================================================================

pub struct PasswordGrantClient {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    username: String,
    password: String,
}

impl PasswordGrantClient {
    pub fn new(config: &ExportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.auth_timeout)
            .redirect(Policy::limited(MAX_AUTH_REDIRECTS))
            .build()
            .map_err(|e| ExportError::Config(format!("auth client: {e}")))?;
        Ok(Self {
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

fn parse_expires_in(body: &Value) -> Option<Duration> {
    let raw = body.get("expires_in")?;
    raw.as_u64().or_else(|| raw.as_str()?.parse().ok()).map(Duration::from_secs)
}

#[async_trait]
impl TokenProvider for PasswordGrantClient {
    #[instrument(skip(self), fields(token_url = %self.token_url))]
    async fn authenticate(&self) -> Result<AccessToken> {
        let form = [
            ("grant_type", "password"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ];
        let response = self.client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ExportError::Auth(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| ExportError::Auth(format!("unreadable token response ({status}): {e}")))?;
        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ExportError::Auth(format!("token response ({status}) lacks access_token")))?;

        let mut token = AccessToken::new(token);
        if let Some(expires_in) = parse_expires_in(&body) { token = token.with_expires_in(expires_in); }
        debug!(expires_in = ?token.expires_in(), "access token issued");
        Ok(token)
    }
}

// =============================================================================
// Token cache
// =============================================================================

struct CachedToken { token: AccessToken, fetched_at: Instant }

/// Reuses a token until `ttl` (or the advertised `expires_in`, if shorter) elapses
pub struct CachedTokenProvider {
    inner: Arc<dyn TokenProvider>,
    ttl: Duration,
    slot: Mutex<Option<CachedToken>>,
}

impl CachedTokenProvider {
    pub fn new(inner: Arc<dyn TokenProvider>, ttl: Duration) -> Self {
        Self { inner, ttl, slot: Mutex::new(None) }
    }

    fn lifetime(&self, token: &AccessToken) -> Duration {
        token.expires_in().map_or(self.ttl, |e| e.min(self.ttl))
    }
}

#[async_trait]
impl TokenProvider for CachedTokenProvider {
    async fn authenticate(&self) -> Result<AccessToken> {
        // held across the fetch so concurrent events share one exchange
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.fetched_at.elapsed() < self.lifetime(&cached.token) {
                return Ok(cached.token.clone());
            }
        }
        let token = self.inner.authenticate().await?;
        *slot = Some(CachedToken { token: token.clone(), fetched_at: Instant::now() });
        Ok(token)
    }

    async fn invalidate(&self) {
        self.slot.lock().await.take();
        self.inner.invalidate().await;
    }
}

/// Wraps `inner` according to the configured policy
pub fn token_provider(inner: Arc<dyn TokenProvider>, policy: TokenPolicy) -> Arc<dyn TokenProvider> {
    match policy {
        TokenPolicy::PerEvent => inner,
        TokenPolicy::Cached { ttl } => {
            info!(ttl_secs = ttl.as_secs(), "caching access tokens across events");
            Arc::new(CachedTokenProvider::new(inner, ttl))
        }
    }
}

// =============================================================================
// Relay POST
// =============================================================================

pub struct HttpRelay {
    client: Client,
    api_url: String,
}

impl HttpRelay {
    pub fn new(config: &ExportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.relay_timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| ExportError::Config(format!("relay client: {e}")))?;
        Ok(Self { client, api_url: config.relay_url.clone() })
    }
}

#[async_trait]
impl Relay for HttpRelay {
    #[instrument(skip(self, payload, token), fields(order_id = %payload.order_id))]
    async fn relay(&self, payload: &OutboundPayload, token: &AccessToken) -> Result<RelayReceipt> {
        let response = self.client
            .post(&self.api_url)
            .header(AUTHORIZATION, token.bearer_header())
            .json(payload)
            .send()
            .await
            .map_err(|e| ExportError::relay(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
                body.truncate(cut);
            }
            warn!(status = status.as_u16(), "downstream rejected payload");
            return Err(ExportError::Relay {
                status: Some(status.as_u16()),
                message: format!("downstream returned {status}: {body}"),
            });
        }
        Ok(RelayReceipt { status: status.as_u16() })
    }
}
