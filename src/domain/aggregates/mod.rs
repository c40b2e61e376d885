//! Aggregates module
pub mod order;

pub use order::{LogEntry, OrderRecord, OutboundPayload, ITEM_SEPARATOR, LOG_DELIMITER};
