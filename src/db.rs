use std::sync::Arc;

use mongodb::Client;

use crate::config::{Config, StorageConfig};
use crate::services::heartbeat::HeartbeatMonitor;
use crate::services::notification::NotificationDispatcher;
use crate::services::registry::NfRegistry;
use crate::storage::Storage;
use crate::types::AppState;

/// Builds the storage backend from configuration and wires all components.
pub async fn init(config: &Config) -> anyhow::Result<AppState> {
    let storage = match &config.storage {
        StorageConfig::Memory => Storage::memory(),
        StorageConfig::Mongo { uri, db_name } => {
            let client = Client::with_uri_str(uri).await?;
            let storage = Storage::Mongo(client.database(db_name));
            tracing::info!("Connected to MongoDB");
            storage
        }
    };
    init_with_storage(config.clone(), storage)
}

/// Wiring entry point shared with the test harnesses, which pass an
/// in-memory backend directly.
pub fn init_with_storage(config: Config, storage: Storage) -> anyhow::Result<AppState> {
    tracing::info!(backend = storage.backend_name(), "storage initialized");

    let config = Arc::new(config);
    let subscriptions = storage.collection("subscriptions", "subscriptionId");

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    let dispatcher = NotificationDispatcher::new(
        Arc::clone(&subscriptions),
        http_client,
        config.notification.clone(),
    );

    let heartbeats = Arc::new(HeartbeatMonitor::new(
        storage.collection("heartbeats", "nfInstanceId"),
        config.heartbeat.clone(),
    ));

    let registry = Arc::new(NfRegistry::new(
        storage.collection("nf-instances", "nfInstanceId"),
        Arc::clone(&heartbeats),
        dispatcher.clone(),
        Arc::clone(&config),
    ));

    Ok(AppState {
        config,
        registry,
        heartbeats,
        dispatcher,
        subscriptions,
    })
}
