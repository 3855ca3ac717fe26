use std::sync::Arc;

use crate::config::NotificationConfig;
use crate::storage::{DocumentCollection, Filter};
use crate::types::{NfEvent, StatusNotification, Subscription};
use crate::utils::retry::retry_with_backoff;

/// Fans registry mutation events out to matching subscriptions. Stateless
/// relative to storage: subscriptions are read fresh on every event.
/// Delivery failures are absorbed here and never reach the mutating caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
    subscriptions: Arc<dyn DocumentCollection<Subscription>>,
    http: reqwest::Client,
    config: NotificationConfig,
}

impl NotificationDispatcher {
    pub fn new(
        subscriptions: Arc<dyn DocumentCollection<Subscription>>,
        http: reqwest::Client,
        config: NotificationConfig,
    ) -> Self {
        Self {
            subscriptions,
            http,
            config,
        }
    }

    /// Fire-and-forget entry point used by the registry: the fan-out runs on
    /// its own task so slow or failing callbacks never add latency to the
    /// mutation response.
    pub fn dispatch(&self, event: NfEvent) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.fan_out(event).await;
        });
    }

    /// Selects matching subscriptions and spawns one delivery task per
    /// match, so one subscription's backoff never delays another's.
    pub async fn fan_out(&self, event: NfEvent) {
        let subscriptions = match self.subscriptions.find(Filter::all()).await {
            Ok(subs) => subs,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load subscriptions, dropping event");
                return;
            }
        };

        let payload = StatusNotification::from_event(&event);
        for subscription in subscriptions
            .into_iter()
            .filter(|sub| matches_subscription(sub, &event))
        {
            let dispatcher = self.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                dispatcher.deliver(&subscription, &payload).await;
            });
        }
    }

    async fn deliver(&self, subscription: &Subscription, payload: &StatusNotification) {
        let uri = subscription.nf_status_notification_uri.as_str();

        let result = retry_with_backoff(&self.config.retry, || {
            let request = self
                .http
                .post(uri)
                .timeout(self.config.timeout)
                .json(payload);
            async move {
                let response = request.send().await?;
                response.error_for_status()?;
                Ok::<_, reqwest::Error>(())
            }
        })
        .await;

        match result {
            Ok(()) => {
                tracing::debug!(callback = %uri, event = ?payload.event, "notification delivered");
            }
            Err(e) => {
                tracing::error!(
                    callback = %uri,
                    attempts = self.config.retry.max_attempts,
                    error = %e,
                    "failed to deliver notification, giving up"
                );
            }
        }
    }
}

/// All present filter criteria must hold; absent criteria impose no
/// constraint. An empty event-type list matches every event.
pub fn matches_subscription(subscription: &Subscription, event: &NfEvent) -> bool {
    if let Some(events) = &subscription.req_notif_events {
        if !events.is_empty() && !events.contains(&event.event) {
            return false;
        }
    }

    if let Some(id) = &subscription.req_nf_instance_id {
        if *id != event.profile.nf_instance_id {
            return false;
        }
    }

    if let Some(nf_type) = &subscription.req_nf_type {
        if *nf_type != event.profile.nf_type {
            return false;
        }
    }

    if let Some(fqdn) = &subscription.req_nf_fqdn {
        if event.profile.fqdn.as_ref() != Some(fqdn) {
            return false;
        }
    }

    if let Some(requested) = &subscription.req_plmn_list {
        if !requested.is_empty() {
            let Some(plmns) = &event.profile.plmn_list else {
                return false;
            };
            if !requested
                .iter()
                .any(|req| plmns.iter().any(|plmn| plmn == req))
            {
                return false;
            }
        }
    }

    true
}
