//! # Download Progress Registry
//!
//! Per-content synthetic download progress. While a fetch is in flight the
//! percent climbs on a timer up to 90, then jumps to completion when the
//! package is stored. The entry clears after a short delay regardless of
//! outcome, so a failed download falls back to idle. Progress is a UX
//! affordance, not a measure of bytes transferred.

use crate::model::DownloadState;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Timer interval between synthetic progress increments
const DEFAULT_TICK: Duration = Duration::from_millis(200);

/// Delay before a finished or failed entry is cleared
const DEFAULT_CLEAR_AFTER: Duration = Duration::from_millis(1200);

/// Synthetic percent ceiling while the fetch is still in flight
const IN_FLIGHT_CEILING: u8 = 90;

/// Registry of per-content download states
#[derive(Debug, Clone)]
pub struct ProgressRegistry {
    states: Arc<RwLock<HashMap<String, DownloadState>>>,
    tick: Duration,
    clear_after: Duration,
}

impl ProgressRegistry {
    /// Create a registry with default timing
    pub fn new() -> Self {
        Self::with_timing(DEFAULT_TICK, DEFAULT_CLEAR_AFTER)
    }

    /// Create a registry with explicit timing (shorter intervals in tests)
    pub fn with_timing(tick: Duration, clear_after: Duration) -> Self {
        Self { states: Arc::new(RwLock::new(HashMap::new())), tick, clear_after }
    }

    /// Current state for a content id; idle when nothing is tracked
    pub async fn get(&self, content_id: &str) -> DownloadState {
        self.states
            .read()
            .await
            .get(content_id)
            .copied()
            .unwrap_or(DownloadState::Idle)
    }

    /// Content ids with a download currently in flight
    pub async fn active(&self) -> Vec<String> {
        self.states
            .read()
            .await
            .iter()
            .filter(|(_, state)| matches!(state, DownloadState::Downloading { .. }))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Start tracking a download and spawn its progress ticker.
    ///
    /// The ticker stops on its own once the entry leaves the downloading
    /// state or reaches the in-flight ceiling.
    pub async fn begin(&self, content_id: &str) {
        self.states
            .write()
            .await
            .insert(content_id.to_string(), DownloadState::Downloading { percent: 0 });

        let states = Arc::clone(&self.states);
        let content_id = content_id.to_string();
        let tick = self.tick;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(tick).await;
                let mut states = states.write().await;
                match states.get_mut(&content_id) {
                    Some(DownloadState::Downloading { percent }) if *percent < IN_FLIGHT_CEILING => {
                        *percent = (*percent + 10).min(IN_FLIGHT_CEILING);
                    }
                    _ => break,
                }
            }
        });
    }

    /// Mark a download stored and schedule the indicator to clear
    pub async fn complete(&self, content_id: &str) {
        self.states
            .write()
            .await
            .insert(content_id.to_string(), DownloadState::Stored);
        self.schedule_clear(content_id);
    }

    /// Mark a download failed; the indicator clears after the same delay
    pub async fn abort(&self, content_id: &str) {
        self.schedule_clear(content_id);
    }

    /// Drop any tracked state for a content id immediately
    pub async fn clear(&self, content_id: &str) {
        self.states.write().await.remove(content_id);
    }

    fn schedule_clear(&self, content_id: &str) {
        let states = Arc::clone(&self.states);
        let content_id = content_id.to_string();
        let delay = self.clear_after;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            states.write().await.remove(&content_id);
        });
    }
}

impl Default for ProgressRegistry {
    fn default() -> Self {
        Self::new()
    }
}
