//! Domain events
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::OrderId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource { Webhook, Nats, Direct }

/// Fired by the store once per completed order
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderCompleted {
    pub event_id: Uuid,
    pub order_id: OrderId,
    pub source: EventSource,
    pub received_at: DateTime<Utc>,
}

impl OrderCompleted {
    pub fn new(order_id: OrderId, source: EventSource) -> Self {
        Self { event_id: Uuid::now_v7(), order_id, source, received_at: Utc::now() }
    }
}

/// Body shape accepted from triggers. WooCommerce webhooks send the order as `id`.
#[derive(Clone, Debug, Deserialize)]
pub struct OrderCompletedMessage {
    #[serde(alias = "id")]
    pub order_id: OrderId,
}
