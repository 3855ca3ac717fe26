use serde::{Deserialize, Serialize};

use super::nf_profile::NfProfile;
use super::patch::PatchItem;
use super::subscription::NotificationEventType;

/// A registry mutation, handed to the notification dispatcher. Never
/// persisted. Always carries the profile snapshot so that subscription
/// matching works for deregistrations too; the wire payload decides what to
/// expose.
#[derive(Clone, Debug)]
pub struct NfEvent {
    pub event: NotificationEventType,
    pub nf_instance_uri: String,
    pub profile: NfProfile,
    pub profile_changes: Option<Vec<PatchItem>>,
}

/// Webhook body POSTed to a subscription's callback URI. The profile is
/// omitted for NF_DEREGISTERED and the change list is present only for
/// NF_PROFILE_CHANGED.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusNotification {
    pub event: NotificationEventType,
    pub nf_instance_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nf_profile: Option<NfProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_changes: Option<Vec<PatchItem>>,
}

impl StatusNotification {
    pub fn from_event(event: &NfEvent) -> Self {
        let nf_profile = match event.event {
            NotificationEventType::NfDeregistered => None,
            _ => Some(event.profile.clone()),
        };
        let profile_changes = match event.event {
            NotificationEventType::NfProfileChanged => event.profile_changes.clone(),
            _ => None,
        };
        Self {
            event: event.event,
            nf_instance_uri: event.nf_instance_uri.clone(),
            nf_profile,
            profile_changes,
        }
    }
}
