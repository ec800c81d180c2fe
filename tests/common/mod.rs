//! Common test utilities
//!
//! Shared setup for the integration tests: a coordinator wired to an
//! in-memory store and a wiremock server, plus lesson package fixtures.

use std::sync::Arc;
use studypack::{ApiClient, ConnectivityMonitor, LocalStore, OfflineConfig, SyncCoordinator};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Build a coordinator against the given mock server.
///
/// The `tweak` closure adjusts the config builder (thresholds, retry knobs)
/// before it is built. Returns the store as well so tests can inspect or
/// mutate persisted state directly.
pub async fn harness(
    server: &MockServer,
    tweak: impl FnOnce(studypack::OfflineConfigBuilder) -> studypack::OfflineConfigBuilder,
) -> (Arc<SyncCoordinator>, Arc<LocalStore>) {
    let config: OfflineConfig = tweak(OfflineConfig::builder().server_url(server.uri()))
        .build()
        .expect("test config is valid");
    let store = Arc::new(LocalStore::open_in_memory().await.expect("in-memory store opens"));
    let api = ApiClient::new(&config);
    let connectivity = ConnectivityMonitor::new(true);
    let coordinator = SyncCoordinator::new(Arc::clone(&store), api, connectivity, config)
        .await
        .expect("coordinator builds");
    (Arc::new(coordinator), store)
}

/// JSON body of a lesson package fixture.
///
/// The filler string pads the serialized size so tests can compare sizes
/// across re-downloads.
pub fn lesson_json(content_id: &str, version: i64, filler: &str) -> serde_json::Value {
    serde_json::json!({
        "contentId": content_id,
        "version": version,
        "content": {
            "title": format!("Lesson {}", content_id),
            "tags": ["physics", "grade-11"],
            "sections": [{"heading": "Overview", "body": filler}]
        }
    })
}

/// Mount a package endpoint for one content id
pub async fn mount_package(server: &MockServer, content_id: &str, version: i64, filler: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/offline/package/{}", content_id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(lesson_json(content_id, version, filler)),
        )
        .mount(server)
        .await;
}

/// Mount the interactions endpoint with a fixed status
pub async fn mount_interactions(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/api/offline/interactions"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
