//! NATS trigger: each message on the configured subject is one completed order

use futures::StreamExt;
use tracing::{info, warn};

use crate::domain::events::{EventSource, OrderCompleted, OrderCompletedMessage};
use crate::services::dispatcher::EventDispatcher;
use crate::{ExportError, Result};

/// Decode one message body and dispatch it. Malformed bodies are skipped.
pub async fn handle_message(dispatcher: &EventDispatcher, payload: &[u8]) -> Option<OrderCompleted> {
    let message: OrderCompletedMessage = match serde_json::from_slice(payload) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "skipping malformed order completed message");
            return None;
        }
    };
    let event = OrderCompleted::new(message.order_id, EventSource::Nats);
    for outcome in dispatcher.dispatch(&event).await {
        if let Err(e) = outcome {
            warn!(order_id = %event.order_id, kind = e.kind(), error = %e, "order event dropped");
        }
    }
    Some(event)
}

/// Consume `subject` until the subscription closes
pub async fn run_subscriber(client: async_nats::Client, subject: String, dispatcher: EventDispatcher) -> Result<()> {
    let mut subscriber = client
        .subscribe(subject.clone())
        .await
        .map_err(|e| ExportError::UpstreamUnavailable(format!("nats subscribe {subject}: {e}")))?;
    info!(%subject, "listening for order completed messages");

    while let Some(message) = subscriber.next().await {
        handle_message(&dispatcher, &message.payload).await;
    }
    warn!(%subject, "nats subscription closed");
    Ok(())
}
