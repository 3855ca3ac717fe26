use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Liveness record, keyed 1:1 to an NF profile. Refreshed on every profile
/// write, deleted together with the profile. Instants are stored as epoch
/// milliseconds so the expiry sweep can use an ordering comparison in both
/// storage backends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRecord {
    pub nf_instance_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_heartbeat: DateTime<Utc>,
    /// Seconds until the record expires without a refresh.
    pub heart_beat_timer: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl HeartbeatRecord {
    pub fn new(nf_instance_id: impl Into<String>, timer: u32, now: DateTime<Utc>) -> Self {
        Self {
            nf_instance_id: nf_instance_id.into(),
            last_heartbeat: now,
            heart_beat_timer: timer,
            expires_at: now + Duration::seconds(i64::from(timer)),
        }
    }
}
