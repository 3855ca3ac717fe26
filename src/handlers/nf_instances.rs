use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::{AppState, NfProfile, NrfResult, PatchItem};

/// Pagination and filter parameters are carried as strings and parsed
/// leniently; an unparsable value disables that parameter instead of
/// failing the request.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "nf-type")]
    nf_type: Option<String>,
    limit: Option<String>,
    #[serde(rename = "page-number")]
    page_number: Option<String>,
    #[serde(rename = "page-size")]
    page_size: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LinkObject {
    pub href: String,
}

#[derive(Debug, Serialize)]
pub struct UriListLinks {
    #[serde(rename = "self")]
    pub self_link: LinkObject,
    pub item: Vec<LinkObject>,
}

/// 3gppHal-style collection representation: links only, no inlined
/// profiles.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UriList {
    #[serde(rename = "_links")]
    pub links: UriListLinks,
    pub total_item_count: usize,
}

pub async fn list_nf_instances(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> NrfResult<Response> {
    let mut profiles = state.registry.get_all().await?;

    if let Some(nf_type) = &query.nf_type {
        profiles.retain(|p| p.nf_type == *nf_type);
    }
    let total_item_count = profiles.len();

    let page = query.page_number.as_deref().and_then(|v| v.parse::<usize>().ok());
    let size = query.page_size.as_deref().and_then(|v| v.parse::<usize>().ok());
    let page_view: Vec<&NfProfile> = match (page, size) {
        (Some(page), Some(size)) => {
            let start = page.saturating_sub(1).saturating_mul(size);
            profiles.iter().skip(start).take(size).collect()
        }
        _ => {
            let limit = query
                .limit
                .as_deref()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(usize::MAX);
            profiles.iter().take(limit).collect()
        }
    };

    let base = format!("{}/nnrf-nfm/v1/nf-instances", state.config.base_url);
    let body = UriList {
        links: UriListLinks {
            self_link: LinkObject { href: base },
            item: page_view
                .iter()
                .map(|p| LinkObject {
                    href: state.config.nf_instance_uri(&p.nf_instance_id),
                })
                .collect(),
        },
        total_item_count,
    };

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/3gppHal+json".to_string())],
        Json(body),
    )
        .into_response())
}

pub async fn get_nf_instance(
    State(state): State<AppState>,
    Path(nf_instance_id): Path<String>,
) -> NrfResult<Response> {
    let profile = state.registry.get(&nf_instance_id).await?;

    let mut response = (StatusCode::OK, Json(profile)).into_response();
    if let Some(etag) = state.registry.current_etag(&nf_instance_id).await? {
        if let Ok(value) = header::HeaderValue::from_str(&etag) {
            response.headers_mut().insert(header::ETAG, value);
        }
    }
    Ok(response)
}

pub async fn put_nf_instance(
    State(state): State<AppState>,
    Path(nf_instance_id): Path<String>,
    headers: HeaderMap,
    Json(profile): Json<NfProfile>,
) -> NrfResult<Response> {
    let precondition = if_match(&headers);
    let outcome = state
        .registry
        .replace(&nf_instance_id, profile, precondition.as_deref())
        .await?;

    let response = if outcome.created {
        (
            StatusCode::CREATED,
            [
                (header::LOCATION, state.config.nf_instance_uri(&nf_instance_id)),
                (header::ETAG, outcome.etag),
            ],
            Json(outcome.profile),
        )
            .into_response()
    } else {
        (
            StatusCode::OK,
            [(header::ETAG, outcome.etag)],
            Json(outcome.profile),
        )
            .into_response()
    };
    Ok(response)
}

pub async fn patch_nf_instance(
    State(state): State<AppState>,
    Path(nf_instance_id): Path<String>,
    headers: HeaderMap,
    Json(ops): Json<Vec<PatchItem>>,
) -> NrfResult<Response> {
    let precondition = if_match(&headers);
    let outcome = state
        .registry
        .apply_patch(&nf_instance_id, &ops, precondition.as_deref())
        .await?;

    Ok((
        StatusCode::OK,
        [(header::ETAG, outcome.etag)],
        Json(outcome.profile),
    )
        .into_response())
}

pub async fn delete_nf_instance(
    State(state): State<AppState>,
    Path(nf_instance_id): Path<String>,
) -> NrfResult<StatusCode> {
    state.registry.delete(&nf_instance_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn if_match(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::IF_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
