use std::sync::Arc;

use super::heartbeat::HeartbeatMonitor;
use super::notification::NotificationDispatcher;
use crate::config::Config;
use crate::storage::{DocumentCollection, Filter};
use crate::types::{
    NfEvent, NfProfile, NotificationEventType, NrfError, NrfResult, PatchItem,
};
use crate::utils::json_patch;

#[derive(Debug)]
pub struct ReplaceOutcome {
    pub profile: NfProfile,
    /// Drives 201 vs 200 upstream.
    pub created: bool,
    pub etag: String,
}

#[derive(Debug)]
pub struct PatchOutcome {
    pub profile: NfProfile,
    pub etag: String,
}

/// Owns NF profile records. Every mutation runs its side effects in a fixed
/// order: store write, heartbeat refresh/removal, then exactly one
/// notification dispatch — the dispatch is fire-and-forget and never delays
/// the mutation result.
pub struct NfRegistry {
    profiles: Arc<dyn DocumentCollection<NfProfile>>,
    heartbeats: Arc<HeartbeatMonitor>,
    dispatcher: NotificationDispatcher,
    config: Arc<Config>,
}

impl NfRegistry {
    pub fn new(
        profiles: Arc<dyn DocumentCollection<NfProfile>>,
        heartbeats: Arc<HeartbeatMonitor>,
        dispatcher: NotificationDispatcher,
        config: Arc<Config>,
    ) -> Self {
        Self {
            profiles,
            heartbeats,
            dispatcher,
            config,
        }
    }

    fn id_filter(nf_instance_id: &str) -> Filter {
        Filter::eq("nfInstanceId", nf_instance_id)
    }

    pub async fn get(&self, nf_instance_id: &str) -> NrfResult<NfProfile> {
        self.profiles
            .find_one(Self::id_filter(nf_instance_id))
            .await?
            .ok_or_else(|| {
                NrfError::NotFound(format!("NF Instance with ID {nf_instance_id} not found"))
            })
    }

    pub async fn get_all(&self) -> NrfResult<Vec<NfProfile>> {
        Ok(self.profiles.find(Filter::all()).await?)
    }

    pub async fn has(&self, nf_instance_id: &str) -> NrfResult<bool> {
        Ok(self.profiles.count(Self::id_filter(nf_instance_id)).await? > 0)
    }

    /// Current version tag, derived from the instance id and the heartbeat
    /// record's last-write timestamp (refreshed on every profile write, so
    /// it is a monotonic last-write marker). `None` when the instance does
    /// not exist.
    pub async fn current_etag(&self, nf_instance_id: &str) -> NrfResult<Option<String>> {
        Ok(self
            .heartbeats
            .current(nf_instance_id)
            .await?
            .map(|record| make_etag(nf_instance_id, record.last_heartbeat.timestamp_millis())))
    }

    fn check_precondition(precondition: Option<&str>, current: Option<&str>) -> NrfResult<()> {
        if let (Some(cond), Some(tag)) = (precondition, current) {
            if cond != "*" && cond != tag {
                return Err(NrfError::PreconditionFailed(
                    "If-Match does not match the current resource version".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Full upsert of a profile. The path id is authoritative; a body id
    /// that disagrees is a Conflict.
    pub async fn replace(
        &self,
        nf_instance_id: &str,
        mut profile: NfProfile,
        precondition: Option<&str>,
    ) -> NrfResult<ReplaceOutcome> {
        if !profile.nf_instance_id.is_empty() && profile.nf_instance_id != nf_instance_id {
            return Err(NrfError::Conflict(
                "nfInstanceId in body does not match path parameter".to_string(),
            ));
        }
        profile.nf_instance_id = nf_instance_id.to_string();

        let current = self.current_etag(nf_instance_id).await?;
        Self::check_precondition(precondition, current.as_deref())?;

        let created = !self.has(nf_instance_id).await?;
        self.profiles
            .upsert(Self::id_filter(nf_instance_id), &profile)
            .await?;
        let record = self
            .heartbeats
            .record_heartbeat(nf_instance_id, profile.heart_beat_timer)
            .await?;

        let event = if created {
            NotificationEventType::NfRegistered
        } else {
            NotificationEventType::NfProfileChanged
        };
        self.dispatcher.dispatch(NfEvent {
            event,
            nf_instance_uri: self.config.nf_instance_uri(nf_instance_id),
            profile: profile.clone(),
            profile_changes: None,
        });

        Ok(ReplaceOutcome {
            profile,
            created,
            etag: make_etag(nf_instance_id, record.last_heartbeat.timestamp_millis()),
        })
    }

    /// Applies an ordered patch list atomically against the stored document.
    /// Any failing operation aborts the whole patch and leaves the stored
    /// document unchanged.
    pub async fn apply_patch(
        &self,
        nf_instance_id: &str,
        ops: &[PatchItem],
        precondition: Option<&str>,
    ) -> NrfResult<PatchOutcome> {
        let current = self.get(nf_instance_id).await?;
        let tag = self.current_etag(nf_instance_id).await?;
        Self::check_precondition(precondition, tag.as_deref())?;

        let doc = serde_json::to_value(&current)?;
        let patched = json_patch::apply_patch(&doc, ops)?;
        let profile: NfProfile = serde_json::from_value(patched).map_err(|e| {
            NrfError::BadPatch(format!("patched document is not a valid NF profile: {e}"))
        })?;
        if profile.nf_instance_id != nf_instance_id {
            return Err(NrfError::Conflict(
                "patch must not change nfInstanceId".to_string(),
            ));
        }

        self.profiles
            .upsert(Self::id_filter(nf_instance_id), &profile)
            .await?;
        let record = self
            .heartbeats
            .record_heartbeat(nf_instance_id, profile.heart_beat_timer)
            .await?;

        self.dispatcher.dispatch(NfEvent {
            event: NotificationEventType::NfProfileChanged,
            nf_instance_uri: self.config.nf_instance_uri(nf_instance_id),
            profile: profile.clone(),
            profile_changes: Some(ops.to_vec()),
        });

        Ok(PatchOutcome {
            profile,
            etag: make_etag(nf_instance_id, record.last_heartbeat.timestamp_millis()),
        })
    }

    /// Removes the profile and its heartbeat record, then fans out an
    /// NF_DEREGISTERED event.
    pub async fn delete(&self, nf_instance_id: &str) -> NrfResult<()> {
        let profile = self.get(nf_instance_id).await?;

        self.profiles
            .delete_one(Self::id_filter(nf_instance_id))
            .await?;
        self.heartbeats.remove(nf_instance_id).await?;

        self.dispatcher.dispatch(NfEvent {
            event: NotificationEventType::NfDeregistered,
            nf_instance_uri: self.config.nf_instance_uri(nf_instance_id),
            profile,
            profile_changes: None,
        });

        Ok(())
    }
}

fn make_etag(nf_instance_id: &str, last_write_ms: i64) -> String {
    format!("\"{nf_instance_id}-{last_write_ms}\"")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::Config;
    use crate::services::testing::harness;
    use crate::types::PatchOp;

    #[tokio::test]
    async fn replace_round_trip() {
        let h = harness(Config::default());

        let mut profile = NfProfile::new("", "AMF");
        profile.fqdn = Some("amf.example.com".to_string());
        let outcome = h.registry.replace("id-1", profile, None).await.unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.profile.nf_instance_id, "id-1");
        assert!(outcome.etag.starts_with("\"id-1-"));
        assert!(outcome.etag.ends_with('"'));

        let stored = h.registry.get("id-1").await.unwrap();
        assert_eq!(stored, outcome.profile);
        assert!(h.heartbeats.current("id-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn replace_of_existing_profile_is_an_update() {
        let h = harness(Config::default());
        h.registry
            .replace("id-1", NfProfile::new("id-1", "AMF"), None)
            .await
            .unwrap();

        let mut updated = NfProfile::new("id-1", "AMF");
        updated.capacity = Some(50);
        let outcome = h.registry.replace("id-1", updated, None).await.unwrap();

        assert!(!outcome.created);
        assert_eq!(h.registry.get("id-1").await.unwrap().capacity, Some(50));
    }

    #[tokio::test]
    async fn body_id_mismatch_is_a_conflict() {
        let h = harness(Config::default());
        let err = h
            .registry
            .replace("id-1", NfProfile::new("other", "AMF"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, NrfError::Conflict(_)));
    }

    #[tokio::test]
    async fn precondition_enforced_against_current_tag() {
        let h = harness(Config::default());
        h.registry
            .replace("id-1", NfProfile::new("id-1", "AMF"), None)
            .await
            .unwrap();
        let tag = h.registry.current_etag("id-1").await.unwrap().unwrap();

        let err = h
            .registry
            .replace("id-1", NfProfile::new("id-1", "AMF"), Some("\"stale\""))
            .await
            .unwrap_err();
        assert!(matches!(err, NrfError::PreconditionFailed(_)));

        h.registry
            .replace("id-1", NfProfile::new("id-1", "AMF"), Some(&tag))
            .await
            .unwrap();
        h.registry
            .replace("id-1", NfProfile::new("id-1", "AMF"), Some("*"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn patch_applies_in_order() {
        let h = harness(Config::default());
        h.registry
            .replace("id-1", NfProfile::new("id-1", "AMF"), None)
            .await
            .unwrap();

        let ops = vec![
            PatchItem::new(PatchOp::Add, "/capacity").with_value(json!(10)),
            PatchItem::new(PatchOp::Replace, "/capacity").with_value(json!(90)),
        ];
        let outcome = h.registry.apply_patch("id-1", &ops, None).await.unwrap();
        assert_eq!(outcome.profile.capacity, Some(90));
    }

    #[tokio::test]
    async fn failed_patch_leaves_stored_document_unchanged() {
        let h = harness(Config::default());
        let mut profile = NfProfile::new("id-1", "AMF");
        profile.capacity = Some(10);
        h.registry.replace("id-1", profile, None).await.unwrap();

        // second op fails its test, so the first must not stick
        let ops = vec![
            PatchItem::new(PatchOp::Replace, "/capacity").with_value(json!(99)),
            PatchItem::new(PatchOp::Test, "/nfType").with_value(json!("SMF")),
        ];
        let err = h.registry.apply_patch("id-1", &ops, None).await.unwrap_err();
        assert!(matches!(err, NrfError::BadPatch(_)));
        assert_eq!(h.registry.get("id-1").await.unwrap().capacity, Some(10));
    }

    #[tokio::test]
    async fn patch_may_not_change_identity() {
        let h = harness(Config::default());
        h.registry
            .replace("id-1", NfProfile::new("id-1", "AMF"), None)
            .await
            .unwrap();

        let ops = vec![
            PatchItem::new(PatchOp::Replace, "/nfInstanceId").with_value(json!("id-2")),
        ];
        let err = h.registry.apply_patch("id-1", &ops, None).await.unwrap_err();
        assert!(matches!(err, NrfError::Conflict(_)));
        assert!(h.registry.has("id-1").await.unwrap());
    }

    #[tokio::test]
    async fn patch_of_missing_instance_is_not_found() {
        let h = harness(Config::default());
        let ops = vec![PatchItem::new(PatchOp::Remove, "/capacity")];
        let err = h.registry.apply_patch("ghost", &ops, None).await.unwrap_err();
        assert!(matches!(err, NrfError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_cascades_heartbeat_removal() {
        let h = harness(Config::default());
        h.registry
            .replace("id-1", NfProfile::new("id-1", "AMF"), None)
            .await
            .unwrap();

        h.registry.delete("id-1").await.unwrap();
        assert!(h.heartbeats.current("id-1").await.unwrap().is_none());

        let err = h.registry.delete("id-1").await.unwrap_err();
        assert!(matches!(err, NrfError::NotFound(_)));
    }
}
