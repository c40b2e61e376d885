//! Service configuration
//!
//! Loaded once from the environment (after `.env` via dotenvy) and passed
//! explicitly to every collaborator. Never mutated after construction.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::{ExportError, Result};

pub const DEFAULT_TOKEN_URL: &str = "https://login.salesforce.com/services/oauth2/token";
pub const DEFAULT_LOG_DIR: &str = "./woo-orders-log";
pub const DEFAULT_SUBJECT: &str = "orders.completed";
pub const DEFAULT_PORT: u16 = 8083;
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_RELAY_TIMEOUT_SECS: u64 = 30;

/// Whether a bearer token may outlive the event it was fetched for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TokenPolicy {
    #[default]
    PerEvent,
    Cached { ttl: Duration },
}

#[derive(Clone, Validate)]
pub struct ExportConfig {
    #[validate(url)]
    pub token_url: String,
    #[validate(length(min = 1))]
    pub client_id: String,
    #[validate(length(min = 1))]
    pub client_secret: String,
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[validate(url)]
    pub relay_url: String,
    pub log_dir: PathBuf,
    pub auth_timeout: Duration,
    pub relay_timeout: Duration,
    pub token_policy: TokenPolicy,
    #[validate]
    pub store: Option<StoreConfig>,
    pub webhook_secret: Option<String>,
    pub nats_url: Option<String>,
    pub order_completed_subject: String,
    pub port: u16,
}

/// WooCommerce REST credentials
#[derive(Clone, Validate)]
pub struct StoreConfig {
    #[validate(url)]
    pub base_url: String,
    #[validate(length(min = 1))]
    pub consumer_key: String,
    #[validate(length(min = 1))]
    pub consumer_secret: String,
}

impl ExportConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| get(key).ok_or_else(|| ExportError::Config(format!("{key} is required")));
        let secs = |key: &str, default: u64| -> Result<u64> {
            match get(key) {
                Some(raw) => raw.parse().map_err(|_| ExportError::Config(format!("{key} must be a whole number of seconds"))),
                None => Ok(default),
            }
        };

        let store = match get("STORE_URL") {
            Some(base_url) => Some(StoreConfig {
                base_url,
                consumer_key: required("STORE_CONSUMER_KEY")?,
                consumer_secret: required("STORE_CONSUMER_SECRET")?,
            }),
            None => None,
        };

        let token_policy = match secs("TOKEN_CACHE_TTL_SECS", 0)? {
            0 => TokenPolicy::PerEvent,
            ttl => TokenPolicy::Cached { ttl: Duration::from_secs(ttl) },
        };

        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|_| ExportError::Config(format!("PORT is not a valid port: {raw}")))?,
            None => DEFAULT_PORT,
        };

        let config = Self {
            token_url: get("OAUTH_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            client_id: required("OAUTH_CLIENT_ID")?,
            client_secret: required("OAUTH_CLIENT_SECRET")?,
            username: required("OAUTH_USERNAME")?,
            password: required("OAUTH_PASSWORD")?,
            relay_url: required("RELAY_URL")?,
            log_dir: get("LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()).into(),
            auth_timeout: Duration::from_secs(secs("AUTH_TIMEOUT_SECS", DEFAULT_AUTH_TIMEOUT_SECS)?),
            relay_timeout: Duration::from_secs(secs("RELAY_TIMEOUT_SECS", DEFAULT_RELAY_TIMEOUT_SECS)?),
            token_policy,
            store,
            webhook_secret: get("WEBHOOK_SECRET"),
            nats_url: get("NATS_URL"),
            order_completed_subject: get("ORDER_COMPLETED_SUBJECT").unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            port,
        };
        config.validate().map_err(|e| ExportError::Config(e.to_string()))?;
        Ok(config)
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("username", &self.username)
            .field("password", &"***")
            .field("relay_url", &self.relay_url)
            .field("log_dir", &self.log_dir)
            .field("auth_timeout", &self.auth_timeout)
            .field("relay_timeout", &self.relay_timeout)
            .field("token_policy", &self.token_policy)
            .field("store", &self.store.as_ref().map(|s| &s.base_url))
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "***"))
            .field("nats_url", &self.nats_url)
            .field("order_completed_subject", &self.order_completed_subject)
            .field("port", &self.port)
            .finish()
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("base_url", &self.base_url)
            .field("consumer_key", &"***")
            .field("consumer_secret", &"***")
            .finish()
    }
}
