//! Order Aggregate
//!
//! Read-only snapshot of a completed order and the two renderings derived
//! from it: the human-readable log entry and the outbound relay payload.

use serde::{Deserialize, Serialize};
use crate::domain::value_objects::OrderId;

pub const LOG_DELIMITER: &str = "-----------------------------------";
pub const ITEM_SEPARATOR: &str = ", ";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    id: OrderId,
    full_name: Option<String>,
    shipping_address: Option<String>,
    items: Vec<String>,
}

/// Rendered text block appended to an order's log destination
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry(String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundPayload {
    #[serde(rename = "orderID")]
    pub order_id: OrderId,
    pub full_name: String,
    pub shipping_addr: String,
}

impl OrderRecord {
    pub fn new(id: OrderId) -> Self {
        Self { id, full_name: None, shipping_address: None, items: vec![] }
    }

    pub fn with_full_name(mut self, name: impl Into<String>) -> Self { self.full_name = Some(name.into()); self }
    pub fn with_shipping_address(mut self, address: impl Into<String>) -> Self { self.shipping_address = Some(address.into()); self }
    pub fn with_item(mut self, name: impl Into<String>) -> Self { self.items.push(name.into()); self }
    pub fn with_items<I, S>(mut self, names: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> {
        self.items.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn id(&self) -> &OrderId { &self.id }
    pub fn full_name(&self) -> &str { self.full_name.as_deref().unwrap_or_default() }
    pub fn shipping_address(&self) -> &str { self.shipping_address.as_deref().unwrap_or_default() }
    pub fn items(&self) -> &[String] { &self.items }

    /// Renders the log entry and relay payload. Missing fields become empty strings.
    pub fn format(&self) -> (LogEntry, OutboundPayload) {
        let text = format!(
            "Order ID: {}\nFull Name: {}\nShipping Address: {}\nProducts Purchased: {}\n{}\n",
            self.id,
            self.full_name(),
            self.shipping_address(),
            self.items.join(ITEM_SEPARATOR),
            LOG_DELIMITER,
        );
        let payload = OutboundPayload {
            order_id: self.id.clone(),
            full_name: self.full_name().to_string(),
            shipping_addr: self.shipping_address().to_string(),
        };
        (LogEntry(text), payload)
    }
}

impl LogEntry {
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn as_bytes(&self) -> &[u8] { self.0.as_bytes() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jane() -> OrderRecord {
        OrderRecord::new(OrderId::from(1001))
            .with_full_name("Jane Doe")
            .with_shipping_address("123 Main St, Springfield")
            .with_items(["Widget", "Gadget"])
    }

    #[test]
    fn test_format_log_entry() {
        let (entry, _) = jane().format();
        assert_eq!(
            entry.as_str(),
            "Order ID: 1001\nFull Name: Jane Doe\nShipping Address: 123 Main St, Springfield\nProducts Purchased: Widget, Gadget\n-----------------------------------\n"
        );
    }

    #[test]
    fn test_format_payload() {
        let (_, payload) = jane().format();
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"orderID":1001,"full_name":"Jane Doe","shipping_addr":"123 Main St, Springfield"}"#
        );
    }

    #[test]
    fn test_labels_appear_once_in_order() {
        let (entry, _) = jane().format();
        let text = entry.as_str();
        let labels = ["Order ID: ", "Full Name: ", "Shipping Address: ", "Products Purchased: ", LOG_DELIMITER];
        let mut last = 0;
        for label in labels {
            assert_eq!(text.matches(label).count(), 1, "{label}");
            let pos = text.find(label).unwrap();
            assert!(pos >= last);
            last = pos;
        }
    }

    #[test]
    fn test_no_items_and_missing_fields() {
        let (entry, payload) = OrderRecord::new(OrderId::from(5)).format();
        assert_eq!(
            entry.as_str(),
            "Order ID: 5\nFull Name: \nShipping Address: \nProducts Purchased: \n-----------------------------------\n"
        );
        assert_eq!(payload.full_name, "");
        assert_eq!(payload.shipping_addr, "");
    }

    #[test]
    fn test_single_item_has_no_separator() {
        let (entry, _) = OrderRecord::new(OrderId::from(9)).with_item("Widget").format();
        assert!(entry.as_str().contains("Products Purchased: Widget\n"));
    }
}
