use std::sync::Arc;

use crate::config::Config;
use crate::services::heartbeat::HeartbeatMonitor;
use crate::services::notification::NotificationDispatcher;
use crate::services::registry::NfRegistry;
use crate::storage::DocumentCollection;
use crate::types::Subscription;

/// Shared handles passed to every request handler. No ambient globals; all
/// components are constructed once in `db::init` and threaded through here.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<NfRegistry>,
    pub heartbeats: Arc<HeartbeatMonitor>,
    pub dispatcher: NotificationDispatcher,
    pub subscriptions: Arc<dyn DocumentCollection<Subscription>>,
}
