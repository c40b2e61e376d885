//! Order export pipeline
//!
//! lookup -> format -> log -> authenticate -> relay. The log write and the
//! relay are independent: a failed write never prevents the relay attempt,
//! and a failed relay never touches the log.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::domain::aggregates::OutboundPayload;
use crate::domain::value_objects::OrderId;
use crate::services::log_writer::LogSink;
use crate::services::order_store::OrderStore;
use crate::services::relay::{Relay, TokenProvider};
use crate::{ExportError, Result};

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LogOutcome {
    Written { path: PathBuf },
    Failed { error: ExportError },
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RelayOutcome {
    Sent { http_status: u16 },
    /// Token exchange failed, nothing was posted
    Skipped { error: ExportError },
    Failed { error: ExportError },
}

/// What happened to one event after the order was resolved
#[derive(Debug, Serialize)]
pub struct ExportReport {
    pub order_id: OrderId,
    pub log: LogOutcome,
    pub relay: RelayOutcome,
}

impl ExportReport {
    pub fn is_clean(&self) -> bool {
        matches!(self.log, LogOutcome::Written { .. }) && matches!(self.relay, RelayOutcome::Sent { .. })
    }

    pub fn first_error(&self) -> Option<&ExportError> {
        if let LogOutcome::Failed { error } = &self.log { return Some(error); }
        match &self.relay {
            RelayOutcome::Skipped { error } | RelayOutcome::Failed { error } => Some(error),
            RelayOutcome::Sent { .. } => None,
        }
    }
}

pub struct OrderExportService {
    store: Arc<dyn OrderStore>,
    log: Arc<dyn LogSink>,
    tokens: Arc<dyn TokenProvider>,
    relay: Arc<dyn Relay>,
}

impl OrderExportService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        log: Arc<dyn LogSink>,
        tokens: Arc<dyn TokenProvider>,
        relay: Arc<dyn Relay>,
    ) -> Self {
        Self { store, log, tokens, relay }
    }

    /// Handle one completed order. Only lookup failures are returned as `Err`;
    /// later stage failures are recorded in the report.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn handle_order_completed(&self, order_id: &OrderId) -> Result<ExportReport> {
        let order = self.store.get_order(order_id).await.map_err(|e| {
            warn!(kind = e.kind(), error = %e, "order lookup failed, event dropped");
            e
        })?;
        let (entry, payload) = order.format();

        let log = match self.log.append(order_id, &entry).await {
            Ok(path) => {
                info!(path = %path.display(), "order logged");
                LogOutcome::Written { path }
            }
            Err(e) => {
                error!(kind = e.kind(), error = %e, "order log write failed, relaying anyway");
                LogOutcome::Failed { error: e }
            }
        };

        let relay = self.relay_payload(&payload).await;
        Ok(ExportReport { order_id: order_id.clone(), log, relay })
    }

    async fn relay_payload(&self, payload: &OutboundPayload) -> RelayOutcome {
        let token = match self.tokens.authenticate().await {
            Ok(token) => token,
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "relay skipped");
                return RelayOutcome::Skipped { error: e };
            }
        };

        match self.relay.relay(payload, &token).await {
            Ok(receipt) => {
                info!(http_status = receipt.status, "order relayed");
                RelayOutcome::Sent { http_status: receipt.status }
            }
            Err(e) => {
                if let ExportError::Relay { status: Some(401), .. } = &e {
                    self.tokens.invalidate().await;
                }
                error!(kind = e.kind(), error = %e, "order relay failed");
                RelayOutcome::Failed { error: e }
            }
        }
    }
}
