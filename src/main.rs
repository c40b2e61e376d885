//! Order Export Webhook - relays completed orders to a downstream CRM

use anyhow::Result;
use order_export_webhook::http::{router, AppState};
use order_export_webhook::services::{
    nats, token_provider, EventDispatcher, FileLogWriter, HttpRelay, InMemoryOrderStore, OrderStore,
    PasswordGrantClient, WooCommerceOrderStore,
};
use order_export_webhook::{ExportConfig, OrderExportService};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = ExportConfig::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let log = Arc::new(FileLogWriter::new(&config.log_dir));
    log.ensure_dir().await?;

    let store: Arc<dyn OrderStore> = match &config.store {
        Some(store) => Arc::new(WooCommerceOrderStore::new(store.clone(), config.relay_timeout)?),
        None => {
            tracing::warn!("STORE_URL not set, orders resolve against an empty in-memory store");
            Arc::new(InMemoryOrderStore::new())
        }
    };
    let tokens = token_provider(Arc::new(PasswordGrantClient::new(&config)?), config.token_policy);
    let relay = Arc::new(HttpRelay::new(&config)?);
    let service = Arc::new(OrderExportService::new(store, log, tokens, relay));

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(service);

    if let Some(url) = &config.nats_url {
        let client = async_nats::connect(url.as_str()).await?;
        let subject = config.order_completed_subject.clone();
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = nats::run_subscriber(client, subject, dispatcher).await {
                tracing::error!(error = %e, "nats trigger stopped");
            }
        });
    }

    let app = router(AppState { dispatcher: Arc::new(dispatcher), webhook_secret: config.webhook_secret.clone() });

    tracing::info!("Order export webhook listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
