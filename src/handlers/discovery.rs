use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::services::discovery::{self, DiscoveryRequest, SearchResult};
use crate::types::{AppState, NfProfile, NfStatus, NrfError, NrfResult, PlmnId, Snssai, Tai};

/// Wire form of a discovery query. Compound values (PLMN, SNSSAI, TAI) are
/// dash-separated strings; a malformed value silently drops that filter,
/// matching the lenient parsing of the management API.
#[derive(Debug, Default, Deserialize)]
pub struct DiscoveryQuery {
    #[serde(rename = "target-nf-type")]
    target_nf_type: Option<String>,
    #[serde(rename = "requester-nf-type")]
    requester_nf_type: Option<String>,
    #[serde(rename = "service-names")]
    service_names: Option<String>,
    #[serde(rename = "nf-set-id")]
    nf_set_id: Option<String>,
    #[serde(rename = "service-set-id")]
    service_set_id: Option<String>,
    #[serde(rename = "plmn-id")]
    plmn_id: Option<String>,
    snssai: Option<String>,
    tai: Option<String>,
    dnn: Option<String>,
    #[serde(rename = "min-capacity")]
    min_capacity: Option<String>,
    #[serde(rename = "preferred-locality")]
    preferred_locality: Option<String>,
    limit: Option<String>,
}

impl DiscoveryQuery {
    fn into_request(self) -> DiscoveryRequest {
        DiscoveryRequest {
            target_nf_type: self.target_nf_type,
            requester_nf_type: self.requester_nf_type,
            service_names: self
                .service_names
                .map(|names| names.split(',').map(str::to_string).collect()),
            nf_set_id: self.nf_set_id,
            service_set_id: self.service_set_id,
            plmn: self.plmn_id.as_deref().and_then(parse_plmn),
            snssai: self.snssai.as_deref().and_then(parse_snssai),
            tai: self.tai.as_deref().and_then(parse_tai),
            dnn: self.dnn,
            min_capacity: self.min_capacity.and_then(|v| v.parse().ok()),
            preferred_locality: self.preferred_locality,
            limit: self.limit.and_then(|v| v.parse().ok()),
        }
    }
}

pub async fn discover_nf_instances(
    State(state): State<AppState>,
    Query(query): Query<DiscoveryQuery>,
) -> NrfResult<Json<SearchResult>> {
    let profiles = state.registry.get_all().await?;
    let nf_instances = discovery::search(profiles, &query.into_request());

    Ok(Json(SearchResult {
        validity_period: state.config.discovery_validity_secs,
        nf_instances,
    }))
}

/// Single-instance lookup through the discovery surface. A profile that
/// exists but is not REGISTERED is as invisible here as a missing one.
pub async fn discover_nf_instance(
    State(state): State<AppState>,
    Path(nf_instance_id): Path<String>,
) -> NrfResult<Json<NfProfile>> {
    let profile = state.registry.get(&nf_instance_id).await?;
    if profile.nf_status != NfStatus::Registered {
        return Err(NrfError::NotFound(format!(
            "NF Instance with ID {nf_instance_id} is not discoverable"
        )));
    }
    Ok(Json(profile))
}

/// "mcc-mnc"
fn parse_plmn(value: &str) -> Option<PlmnId> {
    let (mcc, mnc) = value.split_once('-')?;
    if mcc.is_empty() || mnc.is_empty() {
        return None;
    }
    Some(PlmnId {
        mcc: mcc.to_string(),
        mnc: mnc.to_string(),
    })
}

/// "sst" or "sst-sd"
fn parse_snssai(value: &str) -> Option<Snssai> {
    let mut parts = value.splitn(2, '-');
    let sst = parts.next()?.parse().ok()?;
    let sd = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    Some(Snssai { sst, sd })
}

/// "mcc-mnc-tac"
fn parse_tai(value: &str) -> Option<Tai> {
    let mut parts = value.splitn(3, '-');
    let mcc = parts.next()?;
    let mnc = parts.next()?;
    let tac = parts.next()?;
    if mcc.is_empty() || mnc.is_empty() || tac.is_empty() {
        return None;
    }
    Some(Tai {
        plmn_id: PlmnId {
            mcc: mcc.to_string(),
            mnc: mnc.to_string(),
        },
        tac: tac.to_string(),
    })
}
