//! Integration tests for routing and dispatching lifecycle events.
//!
//! Endpoints are wiremock servers; the router runs with the synchronous
//! scheduler so every assertion sees the persisted outcome.

mod common;

use common::*;
use hookline_core::entities::Registration;
use hookline_core::events::LifecycleEvent;
use hookline_core::extensions::{ClientParams, ExtensionRegistry};
use hookline_core::processors::{RouteOutcome, spawn_dispatch_pool};
use hookline_core::record::Record;
use hookline_core::store::RegistrationFilter;
use hookline_core::{EventKind, Signal};
use hookline_sdk::config::RawHook;
use hookline_sdk::objects::M2mAction;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::Level;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn server_responding(status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;
    server
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

fn endpoint(server: &MockServer) -> String {
    format!("{}/hook", server.uri())
}

/// A create-only registration fires on create and not on update.
#[tokio::test]
async fn test_create_only_registration() {
    let h = harness();
    let server = server_responding(200, "ok").await;
    let reg = h
        .register(new_registration("users", Signal::Create, endpoint(&server)))
        .await;

    let outcome = h.router.on_saved(User::new(1, "alice"), true).await;
    assert_eq!(outcome, RouteOutcome::Scheduled);
    assert_eq!(request_count(&server).await, 1);

    h.router.on_saved(User::new(1, "alice"), false).await;
    assert_eq!(request_count(&server).await, 1);

    let stored = h.stored(reg.id).await;
    assert!(stored.last_success.is_some());
    assert!(stored.last_failure.is_none());
}

/// Payload and headers of the outbound call.
#[tokio::test]
async fn test_request_shape() {
    let h = harness();
    let server = server_responding(200, "ok").await;
    let mut new = new_registration("users", Signal::CreateOrUpdate, endpoint(&server));
    new.auth_token = "Token 1234".to_string();
    new.headers = json!({"X-Source": "accounts"});
    h.register(new).await;

    h.router.on_saved(User::new(7, "bob"), true).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    let body: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(
        body,
        json!({
            "model": "auth.models.User",
            "pk": 7,
            "fields": {"username": "bob", "groups": [1, 2]}
        })
    );
    let header_value = |name: &str| {
        request
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    assert_eq!(header_value("content-type").as_deref(), Some("application/json"));
    assert_eq!(header_value("authorization").as_deref(), Some("Token 1234"));
    assert_eq!(header_value("x-source").as_deref(), Some("accounts"));
}

/// A registration header named Authorization wins over the token.
#[tokio::test]
async fn test_explicit_authorization_header_wins() {
    let h = harness();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer explicit"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let mut new = new_registration("users", Signal::Create, format!("{}/", server.uri()));
    new.auth_token = "Token 1234".to_string();
    new.headers = json!({"Authorization": "Bearer explicit"});
    h.register(new).await;

    h.router.on_saved(User::new(1, "alice"), true).await;
}

/// Two endpoints, one too slow: both outcomes are persisted in one batch.
#[tokio::test]
async fn test_slow_endpoint_does_not_block_sibling() {
    let h = harness();
    let fast = server_responding(200, "fast").await;
    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&slow)
        .await;

    let fast_reg = h
        .register(new_registration("fast", Signal::Create, endpoint(&fast)))
        .await;
    let slow_reg = h
        .register(new_registration("slow", Signal::Create, format!("{}/hook", slow.uri())))
        .await;

    h.router.on_saved(User::new(1, "alice"), true).await;

    let fast_stored = h.stored(fast_reg.id).await;
    assert!(fast_stored.last_success.is_some());
    assert!(fast_stored.last_failure.is_none());

    let slow_stored = h.stored(slow_reg.id).await;
    assert!(slow_stored.last_success.is_none());
    assert!(slow_stored.last_failure.is_some());

    assert_eq!(h.store.outcome_writes().await, 1);
}

/// Outcomes are applied as calls finish, not in registration order.
#[tokio::test]
async fn test_outcomes_follow_completion_order() {
    let finished = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
    let seen = Arc::clone(&finished);
    let h = harness_with(move |raw, registry| {
        raw.error_handler = "record-order".to_string();
        registry.register_error_handler(
            "record-order",
            move |registration: &Registration, _: Option<&reqwest::Error>| {
                seen.lock().unwrap().push(registration.name.clone());
            },
        );
    });
    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_secs(3)))
        .mount(&slow)
        .await;
    let fast = server_responding(500, "down").await;

    // The slow registration is looked up and submitted first.
    let slow_reg = h
        .register(new_registration("slow", Signal::Create, format!("{}/hook", slow.uri())))
        .await;
    let fast_reg = h
        .register(new_registration("fast", Signal::Create, endpoint(&fast)))
        .await;

    h.router.on_saved(User::new(1, "alice"), true).await;

    assert_eq!(*finished.lock().unwrap(), vec!["fast", "slow"]);

    let fast_failed = h.stored(fast_reg.id).await.last_failure.unwrap();
    let slow_failed = h.stored(slow_reg.id).await.last_failure.unwrap();
    assert!(fast_failed < slow_failed);
    assert_eq!(h.store.outcome_writes().await, 1);
}

/// Builder headers never replace the registration's content type or token.
#[tokio::test]
async fn test_builder_headers_do_not_override_registration_defaults() {
    let h = harness_with(|raw, registry| {
        raw.client_params = "plain".to_string();
        registry.register_client_params("plain", |_: &Registration| {
            ClientParams::default()
                .header("Content-Type", "text/plain")
                .header("Authorization", "Basic abc")
                .header("X-Trace", "1")
        });
    });
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("content-type", "application/json"))
        .and(header("authorization", "Token t"))
        .and(header("x-trace", "1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let mut new = new_registration("users", Signal::Create, format!("{}/", server.uri()));
    new.auth_token = "Token t".to_string();
    let reg = h.register(new).await;

    h.router.on_saved(User::new(1, "alice"), true).await;

    assert!(h.stored(reg.id).await.last_success.is_some());
}

/// The kept response of a success.
#[tokio::test]
async fn test_keep_last_response_on_success() {
    let h = harness();
    let server = server_responding(202, "bar").await;
    let mut new = new_registration("users", Signal::Create, endpoint(&server));
    new.keep_last_response = true;
    let reg = h.register(new).await;

    h.router.on_saved(User::new(1, "alice"), true).await;

    let stored = h.stored(reg.id).await;
    assert_eq!(stored.last_response, "bar");
    assert!(stored.last_success.is_some());
    assert!(stored.last_failure.is_none());
}

#[tokio::test]
async fn test_response_not_kept_by_default() {
    let h = harness();
    let server = server_responding(202, "bar").await;
    let reg = h
        .register(new_registration("users", Signal::Create, endpoint(&server)))
        .await;

    h.router.on_saved(User::new(1, "alice"), true).await;

    let stored = h.stored(reg.id).await;
    assert_eq!(stored.last_response, "");
    assert!(stored.last_success.is_some());
}

/// Failed responses are kept (truncated) and reported without an error.
#[tokio::test]
async fn test_failure_status_reported_to_error_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let transport_errors = Arc::new(AtomicUsize::new(0));
    let (calls_seen, errors_seen) = (Arc::clone(&calls), Arc::clone(&transport_errors));
    let h = harness_with(move |raw, registry| {
        raw.error_handler = "count".to_string();
        raw.max_response_length = 10;
        registry.register_error_handler(
            "count",
            move |_: &Registration, error: Option<&reqwest::Error>| {
                calls_seen.fetch_add(1, Ordering::SeqCst);
                if error.is_some() {
                    errors_seen.fetch_add(1, Ordering::SeqCst);
                }
            },
        );
    });
    let server = server_responding(500, "internal server error").await;
    let mut new = new_registration("users", Signal::Create, endpoint(&server));
    new.keep_last_response = true;
    let reg = h.register(new).await;

    h.router.on_saved(User::new(1, "alice"), true).await;

    let stored = h.stored(reg.id).await;
    assert!(stored.last_failure.is_some());
    assert!(stored.last_success.is_none());
    assert_eq!(stored.last_response, "interna...");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport_errors.load(Ordering::SeqCst), 0);
}

/// Connection failures pass the transport error to the handler and are logged.
#[tokio::test]
async fn test_transport_error_reported_to_error_handler() {
    let transport_errors = Arc::new(AtomicUsize::new(0));
    let errors_seen = Arc::clone(&transport_errors);
    let h = harness_with(move |raw, registry| {
        raw.error_handler = "count".to_string();
        registry.register_error_handler(
            "count",
            move |_: &Registration, error: Option<&reqwest::Error>| {
                if error.is_some() {
                    errors_seen.fetch_add(1, Ordering::SeqCst);
                }
            },
        );
    });
    let reg = h
        .register(new_registration(
            "unreachable",
            Signal::Create,
            "http://127.0.0.1:1/hook".to_string(),
        ))
        .await;

    let (logs, _guard) = capture_logs();
    h.router.on_saved(User::new(1, "alice"), true).await;

    assert_eq!(transport_errors.load(Ordering::SeqCst), 1);
    let stored = h.stored(reg.id).await;
    assert!(stored.last_failure.is_some());
    assert_eq!(stored.last_response, "");

    let errors = logs.at_level(Level::ERROR);
    assert!(errors.iter().any(|event| {
        event
            .fields
            .iter()
            .any(|(name, value)| name == "name" && value == "unreachable")
    }));
}

/// Types missing from the hook configuration leave no trace.
#[tokio::test]
async fn test_unconfigured_type_is_ignored() {
    let h = harness_with(|raw, _| {
        raw.hooks.remove(USER);
    });
    let server = server_responding(200, "ok").await;
    let reg = h
        .register(new_registration("users", Signal::Create, endpoint(&server)))
        .await;

    let outcome = h.router.on_saved(User::new(1, "alice"), true).await;

    assert_eq!(outcome, RouteOutcome::Dropped);
    assert_eq!(request_count(&server).await, 0);
    assert_eq!(h.store.outcome_writes().await, 0);
    let stored = h.stored(reg.id).await;
    assert!(stored.last_success.is_none() && stored.last_failure.is_none());
}

/// A cancelling model makes no calls and logs the reason once at info.
#[tokio::test]
async fn test_cancelled_serialization_is_logged() {
    let h = harness();
    let server = server_responding(200, "ok").await;
    let mut new = new_registration("groups", Signal::Create, endpoint(&server));
    new.type_ref = GROUP.to_string();
    h.register(new).await;

    let (logs, _guard) = capture_logs();
    let outcome = h.router.on_saved(Arc::new(SilentGroup), true).await;

    assert_eq!(outcome, RouteOutcome::Cancelled);
    assert_eq!(request_count(&server).await, 0);
    let infos: Vec<_> = logs
        .at_level(Level::INFO)
        .into_iter()
        .filter(|event| event.message.contains("Just because."))
        .collect();
    assert_eq!(infos.len(), 1);
    assert_eq!(
        infos[0].message,
        "Create webhook for 'auth.models.Group' cancelled before it was sent. Reason given: Just because."
    );
}

#[tokio::test]
async fn test_disabled_registration_never_fires() {
    let h = harness();
    let server = server_responding(200, "ok").await;
    let mut new = new_registration("users", Signal::CreateUpdateDeleteOrM2m, endpoint(&server));
    new.enabled = false;
    h.register(new).await;

    h.router.on_saved(User::new(1, "alice"), true).await;
    h.router.on_saved(User::new(1, "alice"), false).await;
    h.router.on_deleted(User::deleted(1, "alice")).await;
    h.router
        .on_m2m_changed(User::new(1, "alice"), M2mAction::PostAdd)
        .await;

    assert_eq!(request_count(&server).await, 0);
}

/// Deleted records serialize with their relations emptied.
#[tokio::test]
async fn test_delete_payload_drops_relations() {
    let h = harness();
    let server = server_responding(200, "ok").await;
    h.register(new_registration("users", Signal::Delete, endpoint(&server)))
        .await;

    let (logs, _guard) = capture_logs();
    h.router.on_deleted(User::deleted(3, "carol")).await;

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["fields"]["groups"], json!([]));
    assert_eq!(logs.at_level(Level::WARN).len(), 1);
}

/// Only the post phase of a relation change fires, for any M2M signal.
#[tokio::test]
async fn test_m2m_changes() {
    let h = harness();
    let server = server_responding(200, "ok").await;
    h.register(new_registration("users", Signal::UpdateOrM2m, endpoint(&server)))
        .await;

    for action in [M2mAction::PreAdd, M2mAction::PreRemove, M2mAction::PreClear] {
        h.router.on_m2m_changed(User::new(1, "alice"), action).await;
    }
    assert_eq!(request_count(&server).await, 0);

    for action in [M2mAction::PostAdd, M2mAction::PostRemove, M2mAction::PostClear] {
        h.router.on_m2m_changed(User::new(1, "alice"), action).await;
    }
    assert_eq!(request_count(&server).await, 3);
}

/// Client params add headers and query parameters; the filter narrows the
/// lookup.
#[tokio::test]
async fn test_client_params_and_filter_extensions() {
    let h = harness_with(|raw, registry| {
        raw.client_params = "tagged".to_string();
        raw.filter = "primary-only".to_string();
        registry.register_client_params("tagged", |registration: &Registration| {
            ClientParams::default()
                .header("X-Hook", registration.name.clone())
                .basic_auth("hook", "secret")
        });
        registry.register_filter("primary-only", |_: &dyn Record, kind: EventKind| {
            if kind == EventKind::Create {
                vec![RegistrationFilter::NamePrefix("primary".to_string())]
            } else {
                Vec::new()
            }
        });
    });
    let primary = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-hook", "primary-users"))
        .and(header("authorization", "Basic aG9vazpzZWNyZXQ="))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&primary)
        .await;
    let secondary = server_responding(200, "ok").await;

    h.register(new_registration(
        "primary-users",
        Signal::Create,
        format!("{}/", primary.uri()),
    ))
    .await;
    h.register(new_registration("secondary-users", Signal::Create, endpoint(&secondary)))
        .await;

    h.router.on_saved(User::new(1, "alice"), true).await;
    assert_eq!(request_count(&secondary).await, 0);
}

#[tokio::test]
async fn test_query_params_from_builder() {
    let h = harness_with(|raw, registry| {
        raw.client_params = "query".to_string();
        registry.register_client_params("query", |_: &Registration| ClientParams {
            query: vec![("source".to_string(), "hookline".to_string())],
            ..ClientParams::default()
        });
    });
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(query_param("source", "hookline"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    h.register(new_registration("users", Signal::Create, format!("{}/", server.uri())))
        .await;

    h.router.on_saved(User::new(1, "alice"), true).await;
}

/// Per-kind hook tables: denied kinds drop, missing kinds drop.
#[tokio::test]
async fn test_per_kind_hook_table() {
    let h = harness_with(|raw, _| {
        let mut kinds = BTreeMap::new();
        kinds.insert(EventKind::Create, "default".to_string());
        kinds.insert(EventKind::Update, "deny".to_string());
        raw.hooks.insert(USER.to_string(), RawHook::PerKind(kinds));
    });
    let server = server_responding(200, "ok").await;
    h.register(new_registration(
        "users",
        Signal::CreateUpdateOrDelete,
        endpoint(&server),
    ))
    .await;

    assert_eq!(
        h.router.on_saved(User::new(1, "alice"), true).await,
        RouteOutcome::Scheduled
    );
    assert_eq!(
        h.router.on_saved(User::new(1, "alice"), false).await,
        RouteOutcome::Dropped
    );
    assert_eq!(
        h.router.on_deleted(User::deleted(1, "alice")).await,
        RouteOutcome::Dropped
    );
    assert_eq!(request_count(&server).await, 1);
}

/// A reload takes effect for the next event.
#[tokio::test]
async fn test_reload_applies_to_next_event() {
    let h = harness();
    let server = server_responding(200, "ok").await;
    h.register(new_registration("users", Signal::Create, endpoint(&server)))
        .await;

    h.router.on_saved(User::new(1, "alice"), true).await;
    assert_eq!(request_count(&server).await, 1);

    let mut raw = raw_settings();
    raw.hooks
        .insert(USER.to_string(), RawHook::Marker("deny".to_string()));
    h.reload(&raw, &ExtensionRegistry::with_defaults()).await;

    h.router.on_saved(User::new(2, "bob"), true).await;
    assert_eq!(request_count(&server).await, 1);
}

/// The background pool returns before dispatching and persists on shutdown.
#[tokio::test]
async fn test_background_scheduler() {
    let (scheduler, pool) = spawn_dispatch_pool(8, 2);
    let h = harness_with(move |raw, registry| {
        raw.task_handler = "background".to_string();
        registry.register_scheduler("background", scheduler);
    });
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;
    let reg = h
        .register(new_registration("users", Signal::Create, format!("{}/", server.uri())))
        .await;

    let outcome = h
        .router
        .route(LifecycleEvent::saved(User::new(1, "alice"), true))
        .await;
    assert_eq!(outcome, RouteOutcome::Scheduled);
    assert!(h.stored(reg.id).await.last_success.is_none());

    pool.shutdown().await;
    assert!(h.stored(reg.id).await.last_success.is_some());
    assert_eq!(request_count(&server).await, 1);
}
