use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::registry::NfRegistry;
use crate::config::HeartbeatConfig;
use crate::storage::{DocumentCollection, Filter};
use crate::types::{HeartbeatRecord, NrfError, NrfResult};

/// Liveness tracking and autonomous expiry. Heartbeat records are created
/// implicitly by the registry's refresh calls; the periodic sweep cascades
/// expired instances back into the registry as deregistrations.
pub struct HeartbeatMonitor {
    records: Arc<dyn DocumentCollection<HeartbeatRecord>>,
    config: HeartbeatConfig,
    cancel: CancellationToken,
}

impl HeartbeatMonitor {
    pub fn new(records: Arc<dyn DocumentCollection<HeartbeatRecord>>, config: HeartbeatConfig) -> Self {
        Self {
            records,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Upserts the record for `nf_instance_id`, resetting its expiry to
    /// now + timer. Falls back to the configured default timer.
    pub async fn record_heartbeat(
        &self,
        nf_instance_id: &str,
        timer: Option<u32>,
    ) -> NrfResult<HeartbeatRecord> {
        let timer = timer.unwrap_or(self.config.default_timer);
        let record = HeartbeatRecord::new(nf_instance_id, timer, Utc::now());
        self.records
            .upsert(Filter::eq("nfInstanceId", nf_instance_id), &record)
            .await?;
        Ok(record)
    }

    pub async fn current(&self, nf_instance_id: &str) -> NrfResult<Option<HeartbeatRecord>> {
        Ok(self
            .records
            .find_one(Filter::eq("nfInstanceId", nf_instance_id))
            .await?)
    }

    /// Removing an already-removed record is a no-op, not an error.
    pub async fn remove(&self, nf_instance_id: &str) -> NrfResult<()> {
        self.records
            .delete_one(Filter::eq("nfInstanceId", nf_instance_id))
            .await?;
        Ok(())
    }

    /// Spawns the periodic sweep task. Stopped via [`Self::stop`].
    pub fn start(self: &Arc<Self>, registry: Arc<NfRegistry>) {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.config.check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tracing::info!(
                check_interval = ?monitor.config.check_interval,
                grace_period = ?monitor.config.grace_period,
                "heartbeat monitoring started"
            );
            loop {
                tokio::select! {
                    _ = monitor.cancel.cancelled() => {
                        tracing::info!("heartbeat monitoring stopped");
                        break;
                    }
                    _ = ticker.tick() => monitor.sweep(&registry).await,
                }
            }
        });
    }

    /// Cancels future sweeps; idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// One sweep pass. Flags every record whose expiry falls before
    /// now + grace (the grace window looks forward, so records *approaching*
    /// expiry are swept too) and deregisters the owning profile through the
    /// registry, which cascades record removal and the NF_DEREGISTERED
    /// fan-out. Per-record failures are logged and skipped; a sweep never
    /// propagates an error to its scheduler.
    pub async fn sweep(&self, registry: &NfRegistry) {
        let grace = chrono::Duration::milliseconds(self.config.grace_period.as_millis() as i64);
        let cutoff = (Utc::now() + grace).timestamp_millis();

        let due = match self.records.find(Filter::lt("expiresAt", cutoff)).await {
            Ok(due) => due,
            Err(e) => {
                tracing::warn!(error = %e, "sweep: failed to load heartbeat records");
                return;
            }
        };

        let mut expired = 0usize;
        for record in &due {
            let id = &record.nf_instance_id;
            tracing::info!(nf_instance_id = %id, "heartbeat expired, auto-deregistering");
            match registry.delete(id).await {
                Ok(()) => expired += 1,
                Err(NrfError::NotFound(_)) => {
                    // Profile already gone (concurrent delete); drop the
                    // orphan record and move on.
                    if let Err(e) = self.remove(id).await {
                        tracing::warn!(nf_instance_id = %id, error = %e, "sweep: failed to drop orphan heartbeat record");
                    }
                }
                Err(e) => {
                    tracing::warn!(nf_instance_id = %id, error = %e, "sweep: failed to deregister expired instance");
                }
            }
        }

        if expired > 0 {
            tracing::info!(count = expired, "auto-deregistered expired NF instances");
        }
    }
}
