use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::nf_profile::PlmnId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationEventType {
    NfRegistered,
    NfDeregistered,
    NfProfileChanged,
    NfStatusChanged,
}

/// A status-change subscription. All `req*` fields are optional filter
/// criteria; an absent field imposes no constraint on matching.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Server-assigned on creation; absent in the request body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    pub nf_status_notification_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_notif_events: Option<Vec<NotificationEventType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_nf_instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_nf_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_nf_fqdn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_plmn_list: Option<Vec<PlmnId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_locality: Option<String>,
}
