//! Integration tests for content downloads, removal, update checks, and the
//! full synchronization flow.

mod common;

use common::{harness, lesson_json, mount_package};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use studypack::{DownloadState, OfflineError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn download_records_manifest_entry_with_exact_serialized_size() {
    let server = MockServer::start().await;
    mount_package(&server, "phys-waves-02", 3, "nodes and antinodes").await;
    let (coordinator, store) = harness(&server, |b| b).await;

    let meta = coordinator.download_content("phys-waves-02").await.unwrap();

    let package = coordinator.get_content("phys-waves-02").await.unwrap().unwrap();
    let serialized = serde_json::to_vec(&package).unwrap();
    assert_eq!(meta.size_in_bytes, serialized.len() as u64);
    assert_eq!(meta.title, "Lesson phys-waves-02");
    assert_eq!(meta.subject, "physics");
    assert_eq!(meta.version, 3);

    // the persisted manifest agrees with the mirror and the stats
    let manifest = store.get_manifest().await.unwrap();
    assert_eq!(manifest.downloaded["phys-waves-02"].size_in_bytes, serialized.len() as u64);
    let stats = coordinator.stats().await;
    assert_eq!(stats.storage_used, serialized.len() as u64);
    assert_eq!(stats.total_downloaded, 1);
    assert_eq!(coordinator.progress("phys-waves-02").await, DownloadState::Stored);
}

#[tokio::test]
async fn redownload_upserts_and_accounts_only_latest_size() {
    let server = MockServer::start().await;
    // first download serves a small package, afterwards a larger revision
    Mock::given(method("GET"))
        .and(path("/api/offline/package/chem-acids-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lesson_json("chem-acids-01", 1, "short")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_package(&server, "chem-acids-01", 2, &"much longer lesson body ".repeat(20)).await;

    let (coordinator, store) = harness(&server, |b| b).await;

    let first = coordinator.download_content("chem-acids-01").await.unwrap();
    let used_before = coordinator.stats().await.storage_used;
    assert_eq!(used_before, first.size_in_bytes);

    let second = coordinator.download_content("chem-acids-01").await.unwrap();
    assert_eq!(second.version, 2);
    assert!(second.size_in_bytes > first.size_in_bytes);

    // exactly one manifest entry and one package row survive
    let manifest = store.get_manifest().await.unwrap();
    assert_eq!(manifest.downloaded.len(), 1);
    assert!(store.verify_consistency().await.unwrap().is_empty());

    // storage grew by the size delta, not by the whole new size
    let used_after = coordinator.stats().await.storage_used;
    assert_eq!(used_after, second.size_in_bytes);
    assert_eq!(
        used_after as i64 - used_before as i64,
        second.size_in_bytes as i64 - first.size_in_bytes as i64
    );
}

#[tokio::test]
async fn removed_content_is_gone_from_store_and_manifest() {
    let server = MockServer::start().await;
    mount_package(&server, "phys-optics-05", 1, "refraction").await;
    let (coordinator, store) = harness(&server, |b| b).await;

    coordinator.download_content("phys-optics-05").await.unwrap();
    assert!(coordinator.remove_content("phys-optics-05").await.unwrap());

    assert_eq!(coordinator.get_content("phys-optics-05").await.unwrap(), None);
    assert!(store.get_manifest().await.unwrap().downloaded.is_empty());
    assert_eq!(coordinator.stats().await.storage_used, 0);
    assert_eq!(coordinator.progress("phys-optics-05").await, DownloadState::Idle);

    // removing again reports nothing removed
    assert!(!coordinator.remove_content("phys-optics-05").await.unwrap());
}

#[tokio::test]
async fn update_map_covers_every_cached_id_explicitly() {
    let server = MockServer::start().await;
    mount_package(&server, "a", 1, "one").await;
    mount_package(&server, "b", 2, "two").await;
    Mock::given(method("POST"))
        .and(path("/api/offline/check-versions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"updatesNeeded": ["a"]})),
        )
        .mount(&server)
        .await;

    let (coordinator, _store) = harness(&server, |b| b).await;
    coordinator.download_content("a").await.unwrap();
    coordinator.download_content("b").await.unwrap();

    let map = coordinator.check_for_updates().await.unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["a"], true);
    assert_eq!(map["b"], false, "ids the server omits must be explicitly false");

    // re-downloading clears the update flag
    coordinator.download_content("a").await.unwrap();
    assert!(!coordinator.update_available("a").await);
}

#[tokio::test]
async fn update_check_failure_keeps_previous_map() {
    let server = MockServer::start().await;
    mount_package(&server, "a", 1, "one").await;
    Mock::given(method("POST"))
        .and(path("/api/offline/check-versions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"updatesNeeded": ["a"]})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/offline/check-versions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (coordinator, _store) = harness(&server, |b| b).await;
    coordinator.download_content("a").await.unwrap();

    let map = coordinator.check_for_updates().await.unwrap();
    assert_eq!(map["a"], true);

    let error = coordinator.check_for_updates().await.unwrap_err();
    assert!(matches!(error, OfflineError::ServerRejected { status: 500, .. }));
    assert!(coordinator.update_available("a").await, "last known map must survive a failed check");
}

#[tokio::test]
async fn check_for_updates_with_empty_manifest_is_empty() {
    let server = MockServer::start().await;
    let (coordinator, _store) = harness(&server, |b| b).await;
    let map = coordinator.check_for_updates().await.unwrap();
    assert!(map.is_empty());
}

#[tokio::test]
async fn synchronize_with_nothing_cached_is_a_noop() {
    let server = MockServer::start().await;
    let (coordinator, store) = harness(&server, |b| b).await;

    let report = coordinator.synchronize().await.unwrap();
    assert!(!report.skipped);
    assert_eq!(report.refresh.refreshed, 0);
    assert_eq!(report.last_sync_time, None);
    assert_eq!(coordinator.last_sync_time().await, None);
    assert_eq!(store.last_sync_time().await.unwrap(), None);
}

#[tokio::test]
async fn synchronize_refreshes_downloads_and_records_timestamp() {
    let server = MockServer::start().await;
    mount_package(&server, "a", 1, "one").await;
    mount_package(&server, "b", 1, "two").await;
    let (coordinator, store) = harness(&server, |b| b).await;
    coordinator.download_content("a").await.unwrap();
    coordinator.download_content("b").await.unwrap();

    let report = coordinator.synchronize().await.unwrap();
    assert!(!report.skipped);
    assert_eq!(report.refresh.refreshed, 2);
    assert!(report.refresh.failed.is_empty());
    assert!(report.last_sync_time.is_some());
    assert_eq!(store.last_sync_time().await.unwrap(), report.last_sync_time);
}

#[tokio::test]
async fn concurrent_synchronize_is_skipped_by_the_guard() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/offline/package/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(lesson_json("slow", 1, "slow lesson"))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    let (coordinator, _store) = harness(&server, |b| b).await;
    coordinator.download_content("slow").await.unwrap();

    let background = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.synchronize().await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = coordinator.synchronize().await.unwrap();
    assert!(second.skipped, "reentrant synchronize must be a no-op");
    assert_eq!(second.last_sync_time, None);

    let first = background.await.unwrap();
    assert!(!first.skipped);
    assert_eq!(first.refresh.refreshed, 1);
}

#[tokio::test]
async fn download_while_offline_is_a_typed_error() {
    let server = MockServer::start().await;
    mount_package(&server, "a", 1, "one").await;
    let (coordinator, _store) = harness(&server, |b| b).await;
    coordinator.set_online(false).await;

    let error = coordinator.download_content("a").await.unwrap_err();
    assert!(matches!(error, OfflineError::Offline));
    assert_eq!(coordinator.get_content("a").await.unwrap(), None);
    assert_eq!(coordinator.stats().await.total_downloaded, 0);
}

#[tokio::test]
async fn failed_download_leaves_prior_state_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/offline/package/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lesson_json("flaky", 1, "v1")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/offline/package/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (coordinator, store) = harness(&server, |b| b).await;
    let meta = coordinator.download_content("flaky").await.unwrap();

    let error = coordinator.download_content("flaky").await.unwrap_err();
    assert!(matches!(error, OfflineError::ServerRejected { status: 500, .. }));

    // the first download is still intact
    let manifest = store.get_manifest().await.unwrap();
    assert_eq!(manifest.downloaded["flaky"], meta);
    assert!(coordinator.get_content("flaky").await.unwrap().is_some());
}

#[tokio::test]
async fn refresh_reconciles_mirrors_with_the_store() {
    let server = MockServer::start().await;
    let (coordinator, store) = harness(&server, |b| b).await;

    // mutate the store behind the coordinator's back
    let item = studypack::SyncQueueItem::interaction(studypack::InteractionPayload {
        content_id: "phys-waves-02".to_string(),
        session_id: "offline_phys-waves-02_123".to_string(),
        duration_seconds: 40,
    });
    store.put_queue_item(&item).await.unwrap();
    assert!(coordinator.pending_queue().await.is_empty(), "mirror is optimistic, not live");

    coordinator.refresh().await.unwrap();
    assert_eq!(coordinator.pending_queue().await.len(), 1);
    assert_eq!(coordinator.stats().await.pending_queue, 1);
}
