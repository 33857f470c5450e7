//! Okta connector tests against a local HTTP server.
//!
//! Covers the `/api/v1/logs` pagination contract as the fetcher sees it and
//! the user endpoints behind the lifecycle commands.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ir_connectors::identity::{IamAction, IamOutcome, LifecycleSettings, UserProfile};
use ir_connectors::testing::ManualClock;
use ir_connectors::{
    ConnectorError, FetcherConfig, IncrementalFetcher, LogSource, MemoryCheckpointStore,
    OktaConfig, OktaConnector, PageRequest, QueryWindow, SecureString, UserDirectory,
    UserLifecycle,
};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{
    body_partial_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FILTER: &str = "eventType eq \"user.session.start\"";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
}

fn connector(server: &MockServer) -> OktaConnector {
    OktaConnector::new(OktaConfig::new(
        &server.uri(),
        SecureString::new("test-token".to_string()),
    ))
    .unwrap()
}

fn events(prefix: &str, count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| json!({"uuid": format!("{}-{}", prefix, i), "eventType": "user.session.start"}))
        .collect()
}

fn next_link(server: &MockServer, cursor: &str) -> String {
    format!("<{}/api/v1/logs?after={}>; rel=\"next\"", server.uri(), cursor)
}

/// First page of the `[t0, t0+1h)` window, answered with `body` and an optional next link.
async fn mount_first_page(server: &MockServer, body: Vec<Value>, next: Option<String>) {
    let mut response = ResponseTemplate::new(200).set_body_json(body);
    if let Some(link) = next {
        response = response.insert_header("Link", link);
    }
    Mock::given(method("GET"))
        .and(path("/api/v1/logs"))
        .and(header("Authorization", "SSWS test-token"))
        .and(query_param("filter", FILTER))
        .and(query_param("since", "2024-06-03T12:00:00Z"))
        .and(query_param("until", "2024-06-03T13:00:00Z"))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

/// A follow-up page: only the cursor from the link, none of the window params.
fn follow_up(cursor: &str) -> wiremock::MockBuilder {
    Mock::given(method("GET"))
        .and(path("/api/v1/logs"))
        .and(header("Authorization", "SSWS test-token"))
        .and(query_param("after", cursor))
        .and(query_param_is_missing("filter"))
        .and(query_param_is_missing("since"))
        .and(query_param_is_missing("until"))
}

fn fetcher_for(
    server: &MockServer,
) -> (IncrementalFetcher, Arc<MemoryCheckpointStore>) {
    let store = Arc::new(MemoryCheckpointStore::new());
    let fetcher = IncrementalFetcher::with_clock(
        Arc::new(connector(server)),
        store.clone(),
        FetcherConfig::new(t0()),
        Arc::new(ManualClock::new(t0() + Duration::hours(1))),
    );
    (fetcher, store)
}

// =============================================================================
// Log pagination
// =============================================================================

#[tokio::test]
async fn test_first_page_carries_window_params() {
    let server = MockServer::start().await;
    mount_first_page(&server, events("a", 2), Some(next_link(&server, "c2"))).await;

    let page = connector(&server)
        .fetch_page(&PageRequest::Initial(QueryWindow {
            filter: FILTER.to_string(),
            since: t0(),
            until: t0() + Duration::hours(1),
        }))
        .await
        .unwrap();

    assert_eq!(page.entries, events("a", 2));
    assert_eq!(
        page.next,
        Some(format!("{}/api/v1/logs?after=c2", server.uri()))
    );
}

#[tokio::test]
async fn test_fetcher_follows_next_link_verbatim() {
    let server = MockServer::start().await;
    mount_first_page(&server, events("p1", 3), Some(next_link(&server, "c2"))).await;
    follow_up("c2")
        .respond_with(ResponseTemplate::new(200).set_body_json(events("p2", 2)))
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, store) = fetcher_for(&server);
    let released = fetcher.fetch(FILTER, 4).await.unwrap();

    let all: Vec<Value> = events("p1", 3).into_iter().chain(events("p2", 2)).collect();
    assert_eq!(released, all[..4].to_vec());

    let saved = store.snapshot().await.unwrap();
    assert_eq!(saved.last_run_time, t0() + Duration::hours(1));
    assert_eq!(saved.pending_entries, all[4..].to_vec());
}

#[tokio::test]
async fn test_next_link_on_empty_page_is_ignored() {
    let server = MockServer::start().await;
    mount_first_page(&server, vec![], Some(next_link(&server, "c2"))).await;
    follow_up("c2")
        .respond_with(ResponseTemplate::new(200).set_body_json(events("never", 1)))
        .expect(0)
        .mount(&server)
        .await;

    let (fetcher, store) = fetcher_for(&server);
    assert!(fetcher.fetch(FILTER, 10).await.unwrap().is_empty());

    let saved = store.snapshot().await.unwrap();
    assert_eq!(saved.last_run_time, t0() + Duration::hours(1));
    assert!(saved.pending_entries.is_empty());
}

#[tokio::test]
async fn test_failed_second_page_leaves_checkpoint_unwritten() {
    let server = MockServer::start().await;
    mount_first_page(&server, events("p1", 3), Some(next_link(&server, "c2"))).await;
    follow_up("c2")
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "errorCode": "E0000009",
            "errorSummary": "Internal Server Error"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, store) = fetcher_for(&server);
    match fetcher.fetch(FILTER, 10).await {
        Err(ConnectorError::Vendor(vendor)) => {
            assert_eq!(vendor.status, 500);
            assert_eq!(vendor.error_code.as_deref(), Some("E0000009"));
        }
        other => panic!("Expected vendor error, got {:?}", other),
    }
    assert!(store.snapshot().await.is_none());
    assert_eq!(store.save_count().await, 0);
}

#[tokio::test]
async fn test_non_array_log_body_fails_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errorCode": "E0000001"})))
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, store) = fetcher_for(&server);
    assert!(matches!(
        fetcher.fetch(FILTER, 10).await,
        Err(ConnectorError::InvalidResponse(_))
    ));
    assert!(store.snapshot().await.is_none());
}

// =============================================================================
// User endpoints
// =============================================================================

fn jdoe(status: &str) -> Value {
    json!({
        "id": "00u-jdoe",
        "status": status,
        "profile": {"login": "jdoe@company.com", "email": "jdoe@company.com"}
    })
}

fn jdoe_profile() -> UserProfile {
    UserProfile::from_json(r#"{"email": "jdoe@company.com"}"#).unwrap()
}

async fn mount_user_search(server: &MockServer, users: Value) {
    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .and(query_param("filter", "profile.login eq \"jdoe@company.com\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(users))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_find_user_by_login() {
    let server = MockServer::start().await;
    mount_user_search(&server, json!([jdoe("ACTIVE")])).await;

    let user = connector(&server)
        .find_user_by_login("jdoe@company.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.id, "00u-jdoe");
    assert_eq!(user.status.as_deref(), Some("ACTIVE"));
}

#[tokio::test]
async fn test_ambiguous_login_is_no_user() {
    let server = MockServer::start().await;
    mount_user_search(&server, json!([jdoe("ACTIVE"), jdoe("STAGED")])).await;

    let found = connector(&server)
        .find_user_by_login("jdoe@company.com")
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_create_user_posts_profile() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/users"))
        .and(query_param("activate", "true"))
        .and(query_param("provider", "true"))
        .and(body_partial_json(json!({"profile": {"email": "jdoe@company.com"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(jdoe("ACTIVE")))
        .expect(1)
        .mount(&server)
        .await;

    let mut profile = serde_json::Map::new();
    profile.insert("email".to_string(), json!("jdoe@company.com"));
    let created = connector(&server).create_user(&profile).await.unwrap();
    assert_eq!(created.id, "00u-jdoe");
}

#[tokio::test]
async fn test_disable_already_disabled_user_is_skipped() {
    let server = MockServer::start().await;
    mount_user_search(&server, json!([jdoe("DEPROVISIONED")])).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/users/00u-jdoe/lifecycle/deactivate"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "errorCode": "E0000007",
            "errorSummary": "Not found: Resource not found: 00u-jdoe (User)"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let lifecycle = UserLifecycle::new(connector(&server), LifecycleSettings::default());
    let result = lifecycle.disable_user(jdoe_profile()).await;

    assert_eq!(result.action, IamAction::DisableUser);
    assert_eq!(
        result.outcome,
        IamOutcome::skipped("Deactivation failed because the user is already disabled.")
    );
}

#[tokio::test]
async fn test_rate_limited_enable_is_reported() {
    let server = MockServer::start().await;
    mount_user_search(&server, json!([jdoe("DEPROVISIONED")])).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/users/00u-jdoe/lifecycle/activate"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errorCode": "E0000047",
            "errorSummary": "API call exceeded rate limit due to too many requests."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let lifecycle = UserLifecycle::new(connector(&server), LifecycleSettings::default());
    let result = lifecycle.enable_user(jdoe_profile()).await;

    match result.outcome {
        IamOutcome::Failed {
            code, return_error, ..
        } => {
            assert_eq!(code, "E0000047");
            assert!(return_error);
        }
        other => panic!("Expected failure, got {:?}", other),
    }
}
