//! # Offline Data Model
//!
//! Serde data model shared by the local store, the remote API, and the
//! coordinator. All wire and storage shapes use camelCase field names to
//! match the remote API.
//!
//! ## Key Types
//!
//! - `Manifest`: index of everything cached offline, keyed by content id
//! - `ContentPackage`: the complete offline bundle for one piece of content
//! - `SyncQueueItem`: one pending interaction record awaiting upload
//! - `OfflineStats`: derived storage and sync statistics
//! - `DownloadState`: per-content download state machine

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Schema version of the manifest format
pub const MANIFEST_VERSION: i64 = 1;

/// Index of all content currently cached offline.
///
/// Every key in `downloaded` has a corresponding entry in the package
/// partition of the local store; orphaned entries are a consistency bug.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Schema version of the manifest format
    pub version: i64,
    /// Download metadata keyed by content id
    pub downloaded: HashMap<String, DownloadedMeta>,
}

impl Manifest {
    /// Create a fresh empty manifest at the current format version
    pub fn empty() -> Self {
        Self { version: MANIFEST_VERSION, downloaded: HashMap::new() }
    }

    /// Sum of the serialized sizes of all downloaded packages
    pub fn storage_used(&self) -> u64 {
        self.downloaded.values().map(|meta| meta.size_in_bytes).sum()
    }
}

/// Download metadata for one cached content item.
///
/// Title and subject are denormalized here so listings do not need to load
/// the full package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedMeta {
    /// Content version at download time
    pub version: i64,
    /// Download timestamp (RFC 3339)
    pub downloaded_at: String,
    /// Display title
    pub title: String,
    /// Subject grouping
    pub subject: String,
    /// Serialized size of the stored package
    pub size_in_bytes: u64,
}

/// The complete offline bundle for one piece of content.
///
/// Fetched whole from the remote API, stored whole, replaced wholly on
/// re-download, deleted wholly on removal. No partial or delta updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentPackage {
    /// Primary key, matches the manifest key
    pub content_id: String,
    /// Content body
    pub content: ContentBody,
    /// Content version, compared against the server during update checks
    pub version: i64,
}

/// Body of a content package.
///
/// Fields beyond title and tags (lesson sections, embedded quiz data, media
/// references) are carried opaquely so the package round-trips unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentBody {
    /// Display title
    pub title: String,
    /// Ordered tags; the first tag is used for subject grouping
    #[serde(default)]
    pub tags: Vec<String>,
    /// Remaining package fields, preserved as-is
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ContentBody {
    /// Subject grouping for listings, taken from the first tag
    pub fn subject(&self) -> &str {
        self.tags.first().map(String::as_str).unwrap_or("")
    }
}

/// Payload of one recorded viewing interaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InteractionPayload {
    /// Content that was viewed
    pub content_id: String,
    /// Viewing session id, unique per session
    pub session_id: String,
    /// Measured viewing duration
    pub duration_seconds: u64,
}

/// Derive the session id for a viewing session.
///
/// The id is `offline_{content_id}_{start_epoch_millis}`, unique per session
/// because a new session always has a fresh start timestamp.
pub fn session_id(content_id: &str, start_epoch_millis: i64) -> String {
    format!("offline_{}_{}", content_id, start_epoch_millis)
}

/// One pending interaction record awaiting upload.
///
/// The id is deterministically derived as `{type}_{session_id}`, so queuing
/// the same session twice collapses to a single stored item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    /// Derived id, `{type}_{session_id}`
    pub id: String,
    /// Item type, currently only "interaction"
    #[serde(rename = "type")]
    pub item_type: String,
    /// Interaction payload
    pub payload: InteractionPayload,
    /// Enqueue timestamp (RFC 3339)
    pub timestamp: String,
    /// Upload attempts so far
    pub retry_count: i64,
    /// Timestamp of the last upload attempt (storage only)
    #[serde(skip)]
    pub last_attempt: Option<String>,
    /// Error message from the last failed attempt (storage only)
    #[serde(skip)]
    pub last_error: Option<String>,
    /// Earliest time of the next upload attempt (storage only)
    #[serde(skip)]
    pub next_attempt_at: Option<String>,
    /// Dead-letter flag, set once the attempt cutoff is reached (storage only)
    #[serde(skip)]
    pub dead: bool,
}

impl SyncQueueItem {
    /// The interaction item type
    pub const TYPE_INTERACTION: &'static str = "interaction";

    /// Construct a new interaction queue item from its payload
    pub fn interaction(payload: InteractionPayload) -> Self {
        Self {
            id: format!("{}_{}", Self::TYPE_INTERACTION, payload.session_id),
            item_type: Self::TYPE_INTERACTION.to_string(),
            payload,
            timestamp: chrono::Utc::now().to_rfc3339(),
            retry_count: 0,
            last_attempt: None,
            last_error: None,
            next_attempt_at: None,
            dead: false,
        }
    }
}

/// Derived offline storage and sync statistics
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OfflineStats {
    /// Sum of serialized package sizes across the manifest
    pub storage_used: u64,
    /// Number of manifest entries
    pub total_downloaded: usize,
    /// Storage limit reported to the UI
    pub storage_limit: u64,
    /// Timestamp of the last completed sync (RFC 3339)
    pub last_sync_time: Option<String>,
    /// Interaction records still awaiting upload
    pub pending_queue: usize,
}

/// Per-content download state machine.
///
/// `idle -> downloading(progress) -> stored` on success, back to `idle` on
/// failure. Progress is a synthetic UX affordance, not bytes transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum DownloadState {
    /// Not downloaded and no download in flight
    Idle,
    /// Download in flight
    Downloading {
        /// Synthetic percent, 0 to 100
        percent: u8,
    },
    /// Downloaded and present in the manifest
    Stored,
}
