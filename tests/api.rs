//! End-to-end tests over a real listener: every request goes through the
//! full router, handlers and services against the in-memory backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use nrf::config::{Config, HeartbeatConfig, NotificationConfig, RetryConfig};
use nrf::storage::Storage;
use nrf::types::AppState;
use nrf::{db, routes};

async fn spawn_app(mut config: Config) -> (String, AppState) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://{addr}");
    config.base_url = base.clone();

    let state = db::init_with_storage(config, Storage::memory()).unwrap();
    let app = routes::create_routes(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base, state)
}

fn fast_notification_config() -> NotificationConfig {
    NotificationConfig {
        retry: RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 200,
            backoff_multiplier: 2.0,
        },
        timeout: Duration::from_secs(2),
    }
}

fn profile_body(id: &str, nf_type: &str) -> Value {
    json!({
        "nfInstanceId": id,
        "nfType": nf_type,
        "nfStatus": "REGISTERED"
    })
}

#[tokio::test]
async fn register_fetch_update_delete_round_trip() {
    let (base, _state) = spawn_app(Config::default()).await;
    let client = reqwest::Client::new();
    let uri = format!("{base}/nnrf-nfm/v1/nf-instances/id-1");

    let created = client
        .put(&uri)
        .json(&profile_body("id-1", "AMF"))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);
    assert_eq!(
        created.headers().get("location").unwrap().to_str().unwrap(),
        uri
    );
    let etag = created
        .headers()
        .get("etag")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(etag.starts_with("\"id-1-"));

    let fetched = client.get(&uri).send().await.unwrap();
    assert_eq!(fetched.status(), 200);
    let body: Value = fetched.json().await.unwrap();
    assert_eq!(body["nfInstanceId"], "id-1");
    assert_eq!(body["nfType"], "AMF");

    let updated = client
        .put(&uri)
        .json(&profile_body("id-1", "AMF"))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status(), 200);

    let deleted = client.delete(&uri).send().await.unwrap();
    assert_eq!(deleted.status(), 204);
    assert_eq!(client.get(&uri).send().await.unwrap().status(), 404);
    assert_eq!(client.delete(&uri).send().await.unwrap().status(), 404);
}

#[tokio::test]
async fn stale_if_match_is_rejected() {
    let (base, _state) = spawn_app(Config::default()).await;
    let client = reqwest::Client::new();
    let uri = format!("{base}/nnrf-nfm/v1/nf-instances/id-1");

    client
        .put(&uri)
        .json(&profile_body("id-1", "AMF"))
        .send()
        .await
        .unwrap();

    let stale = client
        .put(&uri)
        .header("if-match", "\"id-1-0\"")
        .json(&profile_body("id-1", "AMF"))
        .send()
        .await
        .unwrap();
    assert_eq!(stale.status(), 412);
    let problem: Value = stale.json().await.unwrap();
    assert_eq!(problem["status"], 412);

    let wildcard = client
        .put(&uri)
        .header("if-match", "*")
        .json(&profile_body("id-1", "AMF"))
        .send()
        .await
        .unwrap();
    assert_eq!(wildcard.status(), 200);
}

#[tokio::test]
async fn failing_patch_leaves_profile_untouched_over_http() {
    let (base, _state) = spawn_app(Config::default()).await;
    let client = reqwest::Client::new();
    let uri = format!("{base}/nnrf-nfm/v1/nf-instances/id-1");

    let mut body = profile_body("id-1", "AMF");
    body["capacity"] = json!(10);
    client.put(&uri).json(&body).send().await.unwrap();

    let patch = json!([
        {"op": "replace", "path": "/capacity", "value": 99},
        {"op": "test", "path": "/nfType", "value": "SMF"}
    ]);
    let rejected = client.patch(&uri).json(&patch).send().await.unwrap();
    assert_eq!(rejected.status(), 400);

    let stored: Value = client.get(&uri).send().await.unwrap().json().await.unwrap();
    assert_eq!(stored["capacity"], 10);

    let accepted = client
        .patch(&uri)
        .json(&json!([{"op": "replace", "path": "/capacity", "value": 42}]))
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), 200);
    let patched: Value = accepted.json().await.unwrap();
    assert_eq!(patched["capacity"], 42);
}

#[tokio::test]
async fn nf_instance_listing_links_and_filters() {
    let (base, _state) = spawn_app(Config::default()).await;
    let client = reqwest::Client::new();

    for (id, nf_type) in [("a", "AMF"), ("b", "SMF"), ("c", "AMF")] {
        client
            .put(format!("{base}/nnrf-nfm/v1/nf-instances/{id}"))
            .json(&profile_body(id, nf_type))
            .send()
            .await
            .unwrap();
    }

    let listed = client
        .get(format!("{base}/nnrf-nfm/v1/nf-instances?nf-type=AMF"))
        .send()
        .await
        .unwrap();
    assert_eq!(
        listed.headers().get("content-type").unwrap().to_str().unwrap(),
        "application/3gppHal+json"
    );
    let body: Value = listed.json().await.unwrap();
    assert_eq!(body["totalItemCount"], 2);
    let items = body["_links"]["item"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items
        .iter()
        .all(|link| link["href"].as_str().unwrap().starts_with(&base)));

    let limited: Value = client
        .get(format!("{base}/nnrf-nfm/v1/nf-instances?limit=1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(limited["_links"]["item"].as_array().unwrap().len(), 1);
    assert_eq!(limited["totalItemCount"], 3);
}

#[tokio::test]
async fn discovery_filters_and_hides_suspended_instances() {
    let (base, _state) = spawn_app(Config::default()).await;
    let client = reqwest::Client::new();

    client
        .put(format!("{base}/nnrf-nfm/v1/nf-instances/amf-1"))
        .json(&profile_body("amf-1", "AMF"))
        .send()
        .await
        .unwrap();
    client
        .put(format!("{base}/nnrf-nfm/v1/nf-instances/smf-1"))
        .json(&profile_body("smf-1", "SMF"))
        .send()
        .await
        .unwrap();
    let mut suspended = profile_body("amf-2", "AMF");
    suspended["nfStatus"] = json!("SUSPENDED");
    client
        .put(format!("{base}/nnrf-nfm/v1/nf-instances/amf-2"))
        .json(&suspended)
        .send()
        .await
        .unwrap();

    let result: Value = client
        .get(format!("{base}/nnrf-disc/v1/nf-instances?target-nf-type=AMF"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["validityPeriod"], 3600);
    let instances = result["nfInstances"].as_array().unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0]["nfInstanceId"], "amf-1");

    // suspended profiles stay visible on the management side but are
    // invisible to discovery
    assert_eq!(
        client
            .get(format!("{base}/nnrf-disc/v1/nf-instances/amf-2"))
            .send()
            .await
            .unwrap()
            .status(),
        404
    );
    assert_eq!(
        client
            .get(format!("{base}/nnrf-nfm/v1/nf-instances/amf-2"))
            .send()
            .await
            .unwrap()
            .status(),
        200
    );
}

#[tokio::test]
async fn expired_heartbeat_deregisters_the_instance() {
    let config = Config {
        heartbeat: HeartbeatConfig {
            default_timer: 1,
            grace_period: Duration::from_secs(0),
            check_interval: Duration::from_millis(100),
        },
        ..Config::default()
    };
    let (base, state) = spawn_app(config).await;
    state.heartbeats.start(state.registry.clone());

    let client = reqwest::Client::new();
    let uri = format!("{base}/nnrf-nfm/v1/nf-instances/id-1");

    let mut body = profile_body("id-1", "AMF");
    body["heartBeatTimer"] = json!(1);
    client.put(&uri).json(&body).send().await.unwrap();
    assert_eq!(client.get(&uri).send().await.unwrap().status(), 200);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(client.get(&uri).send().await.unwrap().status(), 404);
    assert!(state.heartbeats.current("id-1").await.unwrap().is_none());
    state.heartbeats.stop();
}

/// Callback sink shared by the notification tests.
#[derive(Clone, Default)]
struct Sink {
    received: Arc<Mutex<Vec<(String, Value)>>>,
    failures_left: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

async fn spawn_sink(sink: Sink) -> String {
    async fn callback(
        State(sink): State<Sink>,
        Path(name): Path<String>,
        Json(body): Json<Value>,
    ) -> StatusCode {
        sink.attempts.fetch_add(1, Ordering::SeqCst);
        if sink
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        sink.received.lock().await.push((name, body));
        StatusCode::NO_CONTENT
    }

    let app = Router::new()
        .route("/cb/:name", post(callback))
        .with_state(sink);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/cb")
}

#[tokio::test]
async fn notifications_reach_only_matching_subscriptions() {
    let config = Config {
        notification: fast_notification_config(),
        ..Config::default()
    };
    let (base, _state) = spawn_app(config).await;
    let client = reqwest::Client::new();

    let sink = Sink::default();
    let cb_base = spawn_sink(sink.clone()).await;

    let subscriptions = [
        json!({"nfStatusNotificationUri": format!("{cb_base}/amf-only"), "reqNfType": "AMF"}),
        json!({"nfStatusNotificationUri": format!("{cb_base}/smf-only"), "reqNfType": "SMF"}),
        json!({
            "nfStatusNotificationUri": format!("{cb_base}/dereg-only"),
            "reqNotifEvents": ["NF_DEREGISTERED"]
        }),
    ];
    for sub in &subscriptions {
        let created = client
            .post(format!("{base}/nnrf-nfm/v1/subscriptions"))
            .json(sub)
            .send()
            .await
            .unwrap();
        assert_eq!(created.status(), 201);
        assert!(created.headers().contains_key("location"));
    }

    client
        .put(format!("{base}/nnrf-nfm/v1/nf-instances/amf-1"))
        .json(&profile_body("amf-1", "AMF"))
        .send()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    let received = sink.received.lock().await;
    assert_eq!(received.len(), 1);
    let (name, payload) = &received[0];
    assert_eq!(name, "amf-only");
    assert_eq!(payload["event"], "NF_REGISTERED");
    assert!(payload["nfInstanceUri"]
        .as_str()
        .unwrap()
        .ends_with("/nnrf-nfm/v1/nf-instances/amf-1"));
    assert_eq!(payload["nfProfile"]["nfInstanceId"], "amf-1");
}

#[tokio::test]
async fn deregistration_notification_omits_the_profile() {
    let config = Config {
        notification: fast_notification_config(),
        ..Config::default()
    };
    let (base, _state) = spawn_app(config).await;
    let client = reqwest::Client::new();

    let sink = Sink::default();
    let cb_base = spawn_sink(sink.clone()).await;

    client
        .post(format!("{base}/nnrf-nfm/v1/subscriptions"))
        .json(&json!({
            "nfStatusNotificationUri": format!("{cb_base}/dereg"),
            "reqNotifEvents": ["NF_DEREGISTERED"]
        }))
        .send()
        .await
        .unwrap();

    let uri = format!("{base}/nnrf-nfm/v1/nf-instances/id-1");
    client
        .put(&uri)
        .json(&profile_body("id-1", "AMF"))
        .send()
        .await
        .unwrap();
    client.delete(&uri).send().await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    let received = sink.received.lock().await;
    assert_eq!(received.len(), 1);
    let (_, payload) = &received[0];
    assert_eq!(payload["event"], "NF_DEREGISTERED");
    assert!(payload.get("nfProfile").is_none());
}

#[tokio::test]
async fn delivery_retries_until_the_callback_succeeds() {
    let config = Config {
        notification: fast_notification_config(),
        ..Config::default()
    };
    let (base, _state) = spawn_app(config).await;
    let client = reqwest::Client::new();

    let sink = Sink::default();
    sink.failures_left.store(2, Ordering::SeqCst);
    let cb_base = spawn_sink(sink.clone()).await;

    client
        .post(format!("{base}/nnrf-nfm/v1/subscriptions"))
        .json(&json!({"nfStatusNotificationUri": format!("{cb_base}/flaky")}))
        .send()
        .await
        .unwrap();

    client
        .put(format!("{base}/nnrf-nfm/v1/nf-instances/id-1"))
        .json(&profile_body("id-1", "AMF"))
        .send()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1000)).await;

    assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);
    let received = sink.received.lock().await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].1["event"], "NF_REGISTERED");
}

#[tokio::test]
async fn subscription_validation_and_removal() {
    let (base, _state) = spawn_app(Config::default()).await;
    let client = reqwest::Client::new();

    let invalid = client
        .post(format!("{base}/nnrf-nfm/v1/subscriptions"))
        .json(&json!({"nfStatusNotificationUri": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), 400);

    let created: Value = client
        .post(format!("{base}/nnrf-nfm/v1/subscriptions"))
        .json(&json!({"nfStatusNotificationUri": "http://127.0.0.1:1/cb"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["subscriptionId"].as_str().unwrap().to_string();

    let uri = format!("{base}/nnrf-nfm/v1/subscriptions/{id}");
    assert_eq!(client.delete(&uri).send().await.unwrap().status(), 204);
    assert_eq!(client.delete(&uri).send().await.unwrap().status(), 404);
}
