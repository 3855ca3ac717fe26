use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::{NfProfile, NfStatus, PlmnId, Snssai, Tai};

/// Typed discovery criteria. Every present field is an independent AND
/// predicate; the handler translates the wire query into this form.
#[derive(Debug, Default, Clone)]
pub struct DiscoveryRequest {
    pub target_nf_type: Option<String>,
    pub requester_nf_type: Option<String>,
    pub service_names: Option<Vec<String>>,
    pub nf_set_id: Option<String>,
    pub service_set_id: Option<String>,
    pub plmn: Option<PlmnId>,
    pub snssai: Option<Snssai>,
    pub tai: Option<Tai>,
    pub dnn: Option<String>,
    pub min_capacity: Option<u32>,
    pub preferred_locality: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Advertised cache validity of this result, in seconds.
    pub validity_period: u32,
    pub nf_instances: Vec<NfProfile>,
}

/// Stateless function of a registry snapshot and a query: filter, rank,
/// truncate.
pub fn search(profiles: Vec<NfProfile>, request: &DiscoveryRequest) -> Vec<NfProfile> {
    let mut matches: Vec<NfProfile> = profiles
        .into_iter()
        .filter(|p| p.nf_status == NfStatus::Registered)
        .filter(|p| passes_filters(p, request))
        .collect();

    rank(&mut matches, request.preferred_locality.as_deref());

    if let Some(limit) = request.limit {
        if limit > 0 {
            matches.truncate(limit);
        }
    }
    matches
}

fn passes_filters(profile: &NfProfile, request: &DiscoveryRequest) -> bool {
    if let Some(nf_type) = &request.target_nf_type {
        if profile.nf_type != *nf_type {
            return false;
        }
    }

    if let Some(set_id) = &request.nf_set_id {
        if profile.nf_set_id.as_ref() != Some(set_id) {
            return false;
        }
    }

    if let Some(names) = &request.service_names {
        let Some(services) = &profile.nf_services else {
            return false;
        };
        if !services.iter().any(|s| names.contains(&s.service_name)) {
            return false;
        }
    }

    if let Some(set_id) = &request.service_set_id {
        let Some(services) = &profile.nf_services else {
            return false;
        };
        if !services.iter().any(|s| s.set_id.as_ref() == Some(set_id)) {
            return false;
        }
    }

    // Default-allow: a missing or empty allow-list accepts any requester.
    if let Some(requester) = &request.requester_nf_type {
        if let Some(allowed) = &profile.allowed_nf_types {
            if !allowed.is_empty() && !allowed.contains(requester) {
                return false;
            }
        }
    }

    if let Some(plmn) = &request.plmn {
        let Some(plmns) = &profile.plmn_list else {
            return false;
        };
        if !plmns.iter().any(|p| p == plmn) {
            return false;
        }
    }

    if let Some(snssai) = &request.snssai {
        let Some(nssais) = &profile.s_nssais else {
            return false;
        };
        let sd_matches =
            |n: &Snssai| snssai.sd.is_none() || n.sd == snssai.sd;
        if !nssais.iter().any(|n| n.sst == snssai.sst && sd_matches(n)) {
            return false;
        }
    }

    if let Some(tai) = &request.tai {
        let Some(tais) = &profile.tai_list else {
            return false;
        };
        if !tais.iter().any(|t| t == tai) {
            return false;
        }
    }

    if let Some(dnn) = &request.dnn {
        let Some(dnns) = &profile.dnn_list else {
            return false;
        };
        if !dnns.iter().any(|d| d == dnn) {
            return false;
        }
    }

    // Profiles without a declared capacity are excluded by this filter
    // (while ranking treats missing capacity as 0; intentional asymmetry).
    if let Some(min) = request.min_capacity {
        match profile.capacity {
            Some(capacity) if capacity >= min => {}
            _ => return false,
        }
    }

    true
}

/// Preferred-locality matches first, then priority descending, then
/// capacity descending. Missing priority/capacity read as 0 for ordering
/// only; the returned records are never mutated.
fn rank(profiles: &mut [NfProfile], preferred_locality: Option<&str>) {
    profiles.sort_by(|a, b| {
        if let Some(locality) = preferred_locality {
            let a_match = a.locality.as_deref() == Some(locality);
            let b_match = b.locality.as_deref() == Some(locality);
            match b_match.cmp(&a_match) {
                Ordering::Equal => {}
                other => return other,
            }
        }

        let by_priority = b.priority.unwrap_or(0).cmp(&a.priority.unwrap_or(0));
        if by_priority != Ordering::Equal {
            return by_priority;
        }
        b.capacity.unwrap_or(0).cmp(&a.capacity.unwrap_or(0))
    });
}
