//! Explicit registration of order event handlers

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::events::OrderCompleted;
use crate::services::pipeline::{ExportReport, OrderExportService};
use crate::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderEventHandler: Send + Sync {
    async fn handle(&self, event: &OrderCompleted) -> Result<ExportReport>;
}

#[async_trait]
impl OrderEventHandler for OrderExportService {
    async fn handle(&self, event: &OrderCompleted) -> Result<ExportReport> {
        self.handle_order_completed(&event.order_id).await
    }
}

#[derive(Clone, Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn OrderEventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, handler: Arc<dyn OrderEventHandler>) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    pub fn handler_count(&self) -> usize { self.handlers.len() }

    /// Runs every handler in registration order, one after another
    #[instrument(skip(self, event), fields(event_id = %event.event_id, order_id = %event.order_id, source = ?event.source))]
    pub async fn dispatch(&self, event: &OrderCompleted) -> Vec<Result<ExportReport>> {
        if self.handlers.is_empty() {
            warn!("no handler registered for order completed events");
            return vec![];
        }
        let mut outcomes = Vec::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            outcomes.push(handler.handle(event).await);
        }
        debug!(handlers = outcomes.len(), "event dispatched");
        outcomes
    }
}
