//! Order Export Webhook
//!
//! Reacts to "order completed" events from a store, records each order in an
//! append-only per-order log, then relays a normalized payload to a
//! downstream CRM behind an OAuth password grant.
//!
//! ## Pipeline
//! - Event receipt: resolve the order id against the order store
//! - Formatting: log text plus outbound payload
//! - Log write and relay, as independent failure domains

pub mod config;
pub mod domain;
pub mod http;
pub mod services;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

pub use config::{ExportConfig, TokenPolicy};
pub use domain::aggregates::{LogEntry, OrderRecord, OutboundPayload};
pub use domain::events::{EventSource, OrderCompleted};
pub use domain::value_objects::{AccessToken, OrderId};
pub use services::pipeline::{ExportReport, LogOutcome, OrderExportService, RelayOutcome};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    #[error("Order store unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Log write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Relay failed: {message}")]
    Relay { status: Option<u16>, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExportError {
    pub fn relay(message: impl Into<String>) -> Self {
        Self::Relay { status: None, message: message.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Io(_) => "io_error",
            Self::Auth(_) => "auth_error",
            Self::Relay { .. } => "relay_error",
            Self::Config(_) => "config_error",
        }
    }
}

impl Serialize for ExportError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ExportError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
