//! Order store adapters
//!
//! The store owns orders; this service only reads a snapshot per event.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, instrument};

use crate::config::StoreConfig;
use crate::domain::aggregates::{OrderRecord, ITEM_SEPARATOR};
use crate::domain::value_objects::OrderId;
use crate::{ExportError, Result};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Fetch the order, failing with `NotFound` or `UpstreamUnavailable`
    async fn get_order(&self, order_id: &OrderId) -> Result<OrderRecord>;
}

/// In-process store, for local runs and tests
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, OrderRecord>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&self, order: OrderRecord) {
        let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        orders.insert(order.id().clone(), order);
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get_order(&self, order_id: &OrderId) -> Result<OrderRecord> {
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        orders.get(order_id).cloned().ok_or_else(|| ExportError::NotFound(order_id.clone()))
    }
}

// =============================================================================
// WooCommerce REST
// =============================================================================

#[derive(Debug, Deserialize)]
struct WcOrder {
    #[serde(default)]
    billing: WcContact,
    #[serde(default)]
    shipping: WcContact,
    #[serde(default)]
    line_items: Vec<WcLineItem>,
}

#[derive(Debug, Default, Deserialize)]
struct WcContact {
    #[serde(default)] first_name: String,
    #[serde(default)] last_name: String,
    #[serde(default)] company: String,
    #[serde(default)] address_1: String,
    #[serde(default)] address_2: String,
    #[serde(default)] city: String,
    #[serde(default)] state: String,
    #[serde(default)] postcode: String,
    #[serde(default)] country: String,
}

#[derive(Debug, Deserialize)]
struct WcLineItem { name: String }

impl WcContact {
    fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim()).trim().to_string()
    }

    fn formatted_address(&self) -> String {
        let region = format!("{} {}", self.state.trim(), self.postcode.trim()).trim().to_string();
        let name = self.full_name();
        [&name, &self.company, &self.address_1, &self.address_2, &self.city, &region, &self.country]
            .into_iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(ITEM_SEPARATOR)
    }
}

impl WcOrder {
    fn into_record(self, id: OrderId) -> OrderRecord {
        let mut record = OrderRecord::new(id)
            .with_items(self.line_items.into_iter().map(|item| item.name));
        let name = self.billing.full_name();
        if !name.is_empty() { record = record.with_full_name(name); }
        let address = self.shipping.formatted_address();
        if !address.is_empty() { record = record.with_shipping_address(address); }
        record
    }
}

/// Reads orders from the WooCommerce REST API (`/wp-json/wc/v3/orders/{id}`)
#[derive(Debug, Clone)]
pub struct WooCommerceOrderStore {
    client: Client,
    config: StoreConfig,
}

impl WooCommerceOrderStore {
    pub fn new(config: StoreConfig, timeout: std::time::Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExportError::Config(format!("order store client: {e}")))?;
        Ok(Self { client, config })
    }

    fn order_url(&self, order_id: &OrderId) -> String {
        format!("{}/wp-json/wc/v3/orders/{}", self.config.base_url.trim_end_matches('/'), order_id)
    }
}

#[async_trait]
impl OrderStore for WooCommerceOrderStore {
    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn get_order(&self, order_id: &OrderId) -> Result<OrderRecord> {
        let response = self.client
            .get(self.order_url(order_id))
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(|e| ExportError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND { return Err(ExportError::NotFound(order_id.clone())); }
        if !status.is_success() {
            return Err(ExportError::UpstreamUnavailable(format!("order store returned {status}")));
        }

        let order: WcOrder = response
            .json()
            .await
            .map_err(|e| ExportError::UpstreamUnavailable(format!("unreadable order body: {e}")))?;
        debug!(items = order.line_items.len(), "order fetched");
        Ok(order.into_record(order_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode as AxumStatus, routing::get, Json, Router};
    use std::time::Duration;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn store(base_url: String) -> WooCommerceOrderStore {
        let config = StoreConfig { base_url, consumer_key: "ck".into(), consumer_secret: "cs".into() };
        WooCommerceOrderStore::new(config, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_store_survives_poisoned_lock() {
        let store = std::sync::Arc::new(InMemoryOrderStore::new());
        store.insert(OrderRecord::new(OrderId::from(1)).with_full_name("Before"));

        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _held = poisoner.orders.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(store.orders.is_poisoned());

        store.insert(OrderRecord::new(OrderId::from(2)).with_full_name("After"));
        assert_eq!(store.get_order(&OrderId::from(1)).await.unwrap().full_name(), "Before");
        assert_eq!(store.get_order(&OrderId::from(2)).await.unwrap().full_name(), "After");
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryOrderStore::new();
        store.insert(OrderRecord::new(OrderId::from(1)).with_full_name("Jane Doe"));
        assert_eq!(store.get_order(&OrderId::from(1)).await.unwrap().full_name(), "Jane Doe");
        assert!(matches!(store.get_order(&OrderId::from(2)).await, Err(ExportError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_woocommerce_maps_order() {
        let app = Router::new().route("/wp-json/wc/v3/orders/:id", get(|Path(id): Path<String>| async move {
            if id != "1001" { return Err(AxumStatus::NOT_FOUND); }
            Ok(Json(serde_json::json!({
                "id": 1001,
                "billing": { "first_name": "Jane", "last_name": "Doe" },
                "shipping": { "address_1": "123 Main St", "city": "Springfield", "state": "IL", "postcode": "62701", "country": "US" },
                "line_items": [ { "name": "Widget" }, { "name": "Gadget" } ]
            })))
        }));
        let store = store(serve(app).await);

        let order = store.get_order(&OrderId::from(1001)).await.unwrap();
        assert_eq!(order.full_name(), "Jane Doe");
        assert_eq!(order.shipping_address(), "123 Main St, Springfield, IL 62701, US");
        assert_eq!(order.items(), ["Widget".to_string(), "Gadget".to_string()]);

        assert!(matches!(store.get_order(&OrderId::from(7)).await, Err(ExportError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_woocommerce_server_error_is_unavailable() {
        let app = Router::new().route("/wp-json/wc/v3/orders/:id", get(|| async { AxumStatus::INTERNAL_SERVER_ERROR }));
        let store = store(serve(app).await);
        assert!(matches!(store.get_order(&OrderId::from(1)).await, Err(ExportError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_woocommerce_unreachable() {
        let store = store("http://127.0.0.1:1".into());
        assert!(matches!(store.get_order(&OrderId::from(1)).await, Err(ExportError::UpstreamUnavailable(_))));
    }
}
