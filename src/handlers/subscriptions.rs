use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::storage::Filter;
use crate::types::{AppState, NrfError, NrfResult, Subscription};

pub async fn create_subscription(
    State(state): State<AppState>,
    Json(mut subscription): Json<Subscription>,
) -> NrfResult<Response> {
    if subscription.nf_status_notification_uri.is_empty() {
        return Err(NrfError::Validation(
            "nfStatusNotificationUri is required".to_string(),
        ));
    }

    let subscription_id = Uuid::new_v4().to_string();
    subscription.subscription_id = Some(subscription_id.clone());
    state.subscriptions.insert_one(&subscription).await?;

    tracing::info!(
        subscription_id = %subscription_id,
        callback = %subscription.nf_status_notification_uri,
        "subscription created"
    );

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, state.config.subscription_uri(&subscription_id))],
        Json(subscription),
    )
        .into_response())
}

pub async fn delete_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> NrfResult<StatusCode> {
    let removed = state
        .subscriptions
        .delete_one(Filter::eq("subscriptionId", subscription_id.as_str()))
        .await?;
    if removed == 0 {
        return Err(NrfError::NotFound(format!(
            "Subscription with ID {subscription_id} not found"
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}
