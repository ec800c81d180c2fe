//! # Sync Coordinator
//!
//! Connectivity-aware orchestration between the embedding UI, the local
//! store, and the remote API. Constructed once per application session and
//! passed by reference; all state lives on the service object, nothing is
//! ambient.
//!
//! ## Architecture
//!
//! The coordinator keeps optimistic in-memory mirrors of the manifest, the
//! pending queue, and the last sync timestamp. Mirrors are updated after
//! each mutation rather than re-read from the store; `refresh` forces a full
//! re-read for consumers that need strict consistency.
//!
//! "Sync" is two distinct behaviors with distinct names:
//! - `refresh_downloads`: re-download every cached package sequentially
//! - `flush_queue`: upload and drain pending interaction records
//!
//! `synchronize` composes both under a reentrancy guard and owns the last
//! sync timestamp.

use crate::api::ApiClient;
use crate::config::OfflineConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{OfflineError, Result};
use crate::model::{
    ContentPackage, DownloadState, DownloadedMeta, InteractionPayload, Manifest, OfflineStats,
    SyncQueueItem,
};
use crate::progress::ProgressRegistry;
use crate::store::LocalStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Outcome of one queue flush
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Items uploaded and removed from the queue
    pub submitted: usize,
    /// Items that failed and were scheduled for another attempt
    pub retried: usize,
    /// Items that reached the attempt cutoff and were dead-lettered
    pub dead_lettered: usize,
    /// Items skipped because their backoff window has not elapsed
    pub deferred: usize,
}

/// Outcome of one re-download sweep
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    /// Items re-downloaded successfully
    pub refreshed: usize,
    /// Per-item failures, content id and error message
    pub failed: Vec<(String, String)>,
}

/// Outcome of one full synchronization
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// True when another synchronization was already in flight
    pub skipped: bool,
    /// Re-download sweep outcome
    pub refresh: RefreshReport,
    /// Queue flush outcome
    pub flush: FlushReport,
    /// Timestamp recorded on completion, if any work was done
    pub last_sync_time: Option<String>,
}

impl SyncReport {
    fn skipped() -> Self {
        Self { skipped: true, ..Default::default() }
    }
}

/// Orchestrates downloads, update checks, and queue flushing for the
/// offline subsystem.
#[derive(Debug)]
pub struct SyncCoordinator {
    store: Arc<LocalStore>,
    api: ApiClient,
    connectivity: ConnectivityMonitor,
    config: OfflineConfig,
    progress: ProgressRegistry,
    /// Optimistic mirror of the persisted manifest
    manifest: RwLock<Manifest>,
    /// Update-available flags, rebuilt whole on every check
    updates: RwLock<HashMap<String, bool>>,
    /// Optimistic mirror of the live queue
    queue: RwLock<Vec<SyncQueueItem>>,
    last_sync: RwLock<Option<String>>,
    /// Reentrancy guard for full synchronizations
    syncing: AtomicBool,
    /// Per-content-id download locks; overlapping downloads of the same id
    /// serialize here instead of racing on the manifest
    download_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SyncCoordinator {
    /// Create a coordinator and load its mirrors from the store
    pub async fn new(
        store: Arc<LocalStore>,
        api: ApiClient,
        connectivity: ConnectivityMonitor,
        config: OfflineConfig,
    ) -> Result<Self> {
        let manifest = store.get_manifest().await?;
        let queue = store.list_queue_items().await?;
        let last_sync = store.last_sync_time().await?;
        Ok(Self {
            store,
            api,
            connectivity,
            config,
            progress: ProgressRegistry::new(),
            manifest: RwLock::new(manifest),
            updates: RwLock::new(HashMap::new()),
            queue: RwLock::new(queue),
            last_sync: RwLock::new(last_sync),
            syncing: AtomicBool::new(false),
            download_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Configuration this coordinator was built with
    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    /// Current connectivity
    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Record a connectivity transition event.
    ///
    /// Coming back online opportunistically flushes the queue; a failure
    /// there is logged rather than propagated because the transition event
    /// has no caller to report to.
    pub async fn set_online(&self, online: bool) {
        let was_online = self.connectivity.is_online();
        self.connectivity.set_online(online);
        if online && !was_online {
            let pending = self.queue.read().await.len();
            if pending > 0 {
                debug!(pending, "reconnected, flushing sync queue");
                if let Err(e) = self.flush_queue().await {
                    warn!(error = %e, "queue flush after reconnect failed");
                }
            }
        }
    }

    // =========================================================================
    // Content downloads
    // =========================================================================

    /// Download a content package and record it in the manifest.
    ///
    /// Requires connectivity. Overlapping downloads of the same id are
    /// serialized; the package and its manifest entry are written in one
    /// transaction, so a failure leaves prior state untouched. A successful
    /// download clears the update-available flag for the id.
    pub async fn download_content(&self, content_id: &str) -> Result<DownloadedMeta> {
        if !self.connectivity.is_online() {
            return Err(OfflineError::Offline);
        }
        let lock = self.download_lock(content_id).await;
        let _guard = lock.lock().await;

        self.progress.begin(content_id).await;
        let result = self.fetch_and_store(content_id).await;
        match &result {
            Ok(meta) => {
                info!(content = content_id, bytes = meta.size_in_bytes, "content downloaded");
                self.progress.complete(content_id).await;
            }
            Err(e) => {
                warn!(content = content_id, error = %e, "content download failed");
                self.progress.abort(content_id).await;
            }
        }
        result
    }

    async fn fetch_and_store(&self, content_id: &str) -> Result<DownloadedMeta> {
        let package = self.api.fetch_package(content_id).await?;
        let size_in_bytes = serde_json::to_vec(&package)?.len() as u64;
        let meta = DownloadedMeta {
            version: package.version,
            downloaded_at: chrono::Utc::now().to_rfc3339(),
            title: package.content.title.clone(),
            subject: package.content.subject().to_string(),
            size_in_bytes,
        };
        self.store.upsert_download(&package, &meta).await?;

        self.manifest.write().await.downloaded.insert(content_id.to_string(), meta.clone());
        self.updates.write().await.insert(content_id.to_string(), false);
        Ok(meta)
    }

    /// Remove a downloaded package and its manifest entry.
    ///
    /// Returns whether the content was downloaded. Works offline.
    pub async fn remove_content(&self, content_id: &str) -> Result<bool> {
        let removed = self.store.remove_download(content_id).await?;
        if removed.is_some() {
            self.manifest.write().await.downloaded.remove(content_id);
            self.updates.write().await.remove(content_id);
            self.progress.clear(content_id).await;
            info!(content = content_id, "content removed");
        }
        Ok(removed.is_some())
    }

    /// Read a downloaded package from the local store
    pub async fn get_content(&self, content_id: &str) -> Result<Option<ContentPackage>> {
        self.store.get_package(content_id).await
    }

    /// Download state for a content id.
    ///
    /// Falls back to the manifest when no download is in flight: a cached
    /// item reads as stored, everything else as idle.
    pub async fn progress(&self, content_id: &str) -> DownloadState {
        match self.progress.get(content_id).await {
            DownloadState::Idle => {
                if self.manifest.read().await.downloaded.contains_key(content_id) {
                    DownloadState::Stored
                } else {
                    DownloadState::Idle
                }
            }
            state => state,
        }
    }

    // =========================================================================
    // Update checks
    // =========================================================================

    /// Ask the server which cached items have newer versions.
    ///
    /// Rebuilds the whole update-available map: every cached id gets an
    /// explicit boolean, ids the server did not mention are false, never
    /// stale. A failure leaves the previous map unchanged.
    pub async fn check_for_updates(&self) -> Result<HashMap<String, bool>> {
        if !self.connectivity.is_online() {
            return Err(OfflineError::Offline);
        }
        let versions: HashMap<String, i64> = {
            let manifest = self.manifest.read().await;
            manifest.downloaded.iter().map(|(id, meta)| (id.clone(), meta.version)).collect()
        };
        if versions.is_empty() {
            return Ok(HashMap::new());
        }

        let needed = self.api.check_versions(&versions).await?;
        let map: HashMap<String, bool> =
            versions.keys().map(|id| (id.clone(), needed.contains(id))).collect();
        *self.updates.write().await = map.clone();
        Ok(map)
    }

    /// Whether an update is known to be available for a content id
    pub async fn update_available(&self, content_id: &str) -> bool {
        self.updates.read().await.get(content_id).copied().unwrap_or(false)
    }

    /// The current update-available map
    pub async fn updates_map(&self) -> HashMap<String, bool> {
        self.updates.read().await.clone()
    }

    // =========================================================================
    // Sync queue
    // =========================================================================

    /// Persist an interaction record for later upload.
    ///
    /// The item id is derived from the session id, so enqueueing the same
    /// session twice collapses to a single stored item. Works offline; the
    /// in-memory mirror is appended optimistically.
    pub async fn add_to_sync_queue(&self, payload: InteractionPayload) -> Result<SyncQueueItem> {
        let item = SyncQueueItem::interaction(payload);
        self.store.put_queue_item(&item).await?;

        let mut queue = self.queue.write().await;
        queue.retain(|existing| existing.id != item.id);
        queue.push(item.clone());
        debug!(item = %item.id, "interaction queued");
        Ok(item)
    }

    /// Pending (live) queue items from the in-memory mirror
    pub async fn pending_queue(&self) -> Vec<SyncQueueItem> {
        self.queue.read().await.clone()
    }

    /// Upload pending interaction records and drain the queue.
    ///
    /// Items are submitted sequentially in enqueue order. A successful
    /// upload deletes the item; a retryable failure schedules the next
    /// attempt with exponential backoff; a non-retryable failure or the
    /// attempt cutoff dead-letters the item. Items whose backoff window has
    /// not elapsed are deferred untouched.
    pub async fn flush_queue(&self) -> Result<FlushReport> {
        if !self.connectivity.is_online() {
            return Err(OfflineError::Offline);
        }
        let items = self.store.list_queue_items().await?;
        let now = chrono::Utc::now();
        let mut report = FlushReport::default();

        for item in items {
            if let Some(next) = &item.next_attempt_at {
                let due = chrono::DateTime::parse_from_rfc3339(next)
                    .map(|t| t.with_timezone(&chrono::Utc) <= now)
                    .unwrap_or(true);
                if !due {
                    report.deferred += 1;
                    continue;
                }
            }
            match self.api.submit_interaction(&item).await {
                Ok(()) => {
                    self.store.delete_queue_item(&item.id).await?;
                    report.submitted += 1;
                }
                Err(e) => {
                    let attempts = item.retry_count + 1;
                    if !e.is_retryable() || attempts >= i64::from(self.config.max_sync_attempts) {
                        warn!(item = %item.id, error = %e, attempts, "dead-lettering queue item");
                        self.store.mark_queue_dead(&item.id, &e.to_string()).await?;
                        report.dead_lettered += 1;
                    } else {
                        let delay = self.backoff_delay_secs(attempts as u32);
                        let next = (now + chrono::Duration::seconds(delay as i64)).to_rfc3339();
                        debug!(item = %item.id, error = %e, retry_in = delay, "queue item will retry");
                        self.store.mark_queue_attempt(&item.id, &e.to_string(), &next).await?;
                        report.retried += 1;
                    }
                }
            }
        }

        *self.queue.write().await = self.store.list_queue_items().await?;
        Ok(report)
    }

    /// Exponential backoff: base doubled per attempt, capped
    fn backoff_delay_secs(&self, attempt: u32) -> u64 {
        let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        self.config
            .backoff_base_secs
            .saturating_mul(factor)
            .min(self.config.backoff_cap_secs)
    }

    // =========================================================================
    // Synchronization
    // =========================================================================

    /// Re-download every cached package from the server.
    ///
    /// Downloads run strictly sequentially, each awaited before the next,
    /// to bound concurrent network and storage load. Per-item failures are
    /// recorded in the report and do not abort the sweep.
    pub async fn refresh_downloads(&self) -> Result<RefreshReport> {
        if !self.connectivity.is_online() {
            return Err(OfflineError::Offline);
        }
        let mut ids: Vec<String> =
            self.manifest.read().await.downloaded.keys().cloned().collect();
        ids.sort();

        let mut report = RefreshReport::default();
        for id in ids {
            match self.download_content(&id).await {
                Ok(_) => report.refreshed += 1,
                Err(e) => {
                    warn!(content = %id, error = %e, "refresh failed for item");
                    report.failed.push((id, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Run a full synchronization: refresh downloads, then flush the queue.
    ///
    /// Guarded against reentrancy: a second call while one is in flight
    /// returns a skipped report and changes nothing. With nothing cached and
    /// nothing queued this completes immediately and the last sync timestamp
    /// is left unchanged.
    pub async fn synchronize(&self) -> Result<SyncReport> {
        if self.syncing.swap(true, Ordering::SeqCst) {
            debug!("synchronization already in progress");
            return Ok(SyncReport::skipped());
        }
        let result = self.synchronize_inner().await;
        self.syncing.store(false, Ordering::SeqCst);
        result
    }

    async fn synchronize_inner(&self) -> Result<SyncReport> {
        if !self.connectivity.is_online() {
            return Err(OfflineError::Offline);
        }
        let nothing_cached = self.manifest.read().await.downloaded.is_empty();
        let nothing_queued = self.queue.read().await.is_empty();
        if nothing_cached && nothing_queued {
            debug!("nothing to synchronize");
            return Ok(SyncReport::default());
        }

        let refresh = self.refresh_downloads().await?;
        let flush = self.flush_queue().await?;

        let timestamp = chrono::Utc::now().to_rfc3339();
        self.store.set_last_sync_time(&timestamp).await?;
        *self.last_sync.write().await = Some(timestamp.clone());
        info!(
            refreshed = refresh.refreshed,
            failed = refresh.failed.len(),
            flushed = flush.submitted,
            "synchronization complete"
        );
        Ok(SyncReport { skipped: false, refresh, flush, last_sync_time: Some(timestamp) })
    }

    // =========================================================================
    // Stats and reconciliation
    // =========================================================================

    /// Derived offline statistics from the in-memory mirrors
    pub async fn stats(&self) -> OfflineStats {
        let manifest = self.manifest.read().await;
        OfflineStats {
            storage_used: manifest.storage_used(),
            total_downloaded: manifest.downloaded.len(),
            storage_limit: self.config.storage_limit_bytes,
            last_sync_time: self.last_sync.read().await.clone(),
            pending_queue: self.queue.read().await.len(),
        }
    }

    /// Timestamp of the last completed synchronization
    pub async fn last_sync_time(&self) -> Option<String> {
        self.last_sync.read().await.clone()
    }

    /// Re-read every in-memory mirror from the store.
    ///
    /// The mirrors are updated optimistically after each mutation for
    /// responsiveness; consumers that need strict consistency with the
    /// persisted state call this first.
    pub async fn refresh(&self) -> Result<()> {
        let manifest = self.store.get_manifest().await?;
        let queue = self.store.list_queue_items().await?;
        let last_sync = self.store.last_sync_time().await?;
        *self.manifest.write().await = manifest;
        *self.queue.write().await = queue;
        *self.last_sync.write().await = last_sync;
        Ok(())
    }

    async fn download_lock(&self, content_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.download_locks.lock().await;
        locks
            .entry(content_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
