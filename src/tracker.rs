//! # Interaction Tracker
//!
//! Measures wall-clock viewing duration for one piece of offline content and
//! enqueues an interaction record when the session ends. Exactly one session
//! is tracked per activation; sessions shorter than the configured threshold
//! are discarded as too short to be meaningful. There is no mid-session
//! checkpointing: a crash that bypasses deactivation loses the in-progress
//! session, which is acceptable for analytics telemetry.

use crate::coordinator::SyncCoordinator;
use crate::error::Result;
use crate::model::{session_id, InteractionPayload, SyncQueueItem};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct ActiveSession {
    content_id: String,
    started_at: DateTime<Utc>,
}

/// Tracks viewing sessions and feeds the sync queue
#[derive(Debug)]
pub struct InteractionTracker {
    coordinator: Arc<SyncCoordinator>,
    active: Option<ActiveSession>,
}

impl InteractionTracker {
    /// Create a tracker bound to a coordinator
    pub fn new(coordinator: Arc<SyncCoordinator>) -> Self {
        Self { coordinator, active: None }
    }

    /// Start tracking a viewing session for a content id.
    ///
    /// If a session is already live it is ended first; its queue item, if
    /// the session was long enough to produce one, is returned.
    pub async fn activate(&mut self, content_id: &str) -> Result<Option<SyncQueueItem>> {
        let finished = self.deactivate().await?;
        self.active =
            Some(ActiveSession { content_id: content_id.to_string(), started_at: Utc::now() });
        debug!(content = content_id, "viewing session started");
        Ok(finished)
    }

    /// End the current viewing session.
    ///
    /// Sessions below the configured minimum duration are discarded silently
    /// and return `None`. Deactivating with no live session is not an error;
    /// it is logged and ignored.
    pub async fn deactivate(&mut self) -> Result<Option<SyncQueueItem>> {
        let Some(session) = self.active.take() else {
            debug!("deactivate called without an active session");
            return Ok(None);
        };

        let now = Utc::now();
        let duration = now.signed_duration_since(session.started_at);
        let min_secs = self.coordinator.config().min_session_secs as i64;
        if duration.num_seconds() < min_secs {
            debug!(
                content = %session.content_id,
                seconds = duration.num_seconds(),
                "session too short, discarding"
            );
            return Ok(None);
        }

        let payload = InteractionPayload {
            content_id: session.content_id.clone(),
            session_id: session_id(&session.content_id, session.started_at.timestamp_millis()),
            duration_seconds: duration.num_seconds().max(0) as u64,
        };
        let item = self.coordinator.add_to_sync_queue(payload).await?;
        debug!(content = %session.content_id, item = %item.id, "viewing session recorded");
        Ok(Some(item))
    }

    /// Content id of the session currently being tracked
    pub fn active_content(&self) -> Option<&str> {
        self.active.as_ref().map(|session| session.content_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::config::OfflineConfig;
    use crate::connectivity::ConnectivityMonitor;
    use crate::store::LocalStore;

    async fn make_tracker(min_session_secs: u64) -> (InteractionTracker, Arc<SyncCoordinator>) {
        let config = OfflineConfig::builder()
            .server_url("http://127.0.0.1:3000")
            .min_session_secs(min_session_secs)
            .build()
            .unwrap();
        let store = Arc::new(LocalStore::open_in_memory().await.unwrap());
        let api = ApiClient::new(&config);
        let coordinator = Arc::new(
            SyncCoordinator::new(store, api, ConnectivityMonitor::new(false), config)
                .await
                .unwrap(),
        );
        (InteractionTracker::new(Arc::clone(&coordinator)), coordinator)
    }

    #[tokio::test]
    async fn test_short_session_is_discarded() {
        let (mut tracker, coordinator) = make_tracker(10).await;
        tracker.activate("phys-waves-02").await.unwrap();
        let item = tracker.deactivate().await.unwrap();
        assert!(item.is_none());
        assert!(coordinator.pending_queue().await.is_empty());
    }

    #[tokio::test]
    async fn test_qualifying_session_enqueues_exactly_one_item() {
        let (mut tracker, coordinator) = make_tracker(0).await;
        tracker.activate("phys-waves-02").await.unwrap();
        let item = tracker.deactivate().await.unwrap().expect("session should qualify");

        assert_eq!(item.item_type, "interaction");
        assert_eq!(item.payload.content_id, "phys-waves-02");
        assert!(item.payload.session_id.starts_with("offline_phys-waves-02_"));
        assert_eq!(coordinator.pending_queue().await.len(), 1);

        // no session left to report
        assert!(tracker.deactivate().await.unwrap().is_none());
        assert_eq!(coordinator.pending_queue().await.len(), 1);
    }

    #[tokio::test]
    async fn test_reactivation_ends_previous_session() {
        let (mut tracker, coordinator) = make_tracker(0).await;
        tracker.activate("phys-waves-02").await.unwrap();
        let finished = tracker.activate("chem-acids-01").await.unwrap();
        assert!(finished.is_some());
        assert_eq!(finished.unwrap().payload.content_id, "phys-waves-02");
        assert_eq!(tracker.active_content(), Some("chem-acids-01"));
        assert_eq!(coordinator.pending_queue().await.len(), 1);
    }

    #[tokio::test]
    async fn test_deactivate_without_session_is_ignored() {
        let (mut tracker, _) = make_tracker(0).await;
        assert!(tracker.deactivate().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enqueue_works_offline() {
        // queuing persists locally, connectivity is only needed to flush
        let (mut tracker, coordinator) = make_tracker(0).await;
        assert!(!coordinator.is_online());
        tracker.activate("phys-waves-02").await.unwrap();
        assert!(tracker.deactivate().await.unwrap().is_some());
    }
}
