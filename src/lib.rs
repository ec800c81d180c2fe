//! StudyPack - Offline Content Cache & Sync Queue
//!
//! StudyPack makes educational content packages (lessons with embedded
//! quizzes, calculators, and videos) available offline: a durable local
//! store of downloaded packages, a persisted queue of viewing-interaction
//! records awaiting upload, and a connectivity-aware coordinator that
//! mediates between the embedding UI, the local store, and the remote API.
//!
//! # Overview
//!
//! This library provides the core offline functionality:
//! - Durable, versioned local storage of content packages and their manifest
//! - Transactional download bookkeeping with accurate storage accounting
//! - Update checks against the server's content versions
//! - A persisted sync queue with retry, backoff, and dead-lettering
//! - Viewing-session measurement feeding the sync queue
//!
//! # Module Structure
//!
//! - **`store`** - Local persistence (manifest, packages, sync queue)
//! - **`coordinator`** - Connectivity-aware orchestration exposed to the UI
//! - **`tracker`** - Viewing-session measurement
//! - **`api`** - Remote offline API client
//! - **`connectivity`** - Online/offline transition tracking
//! - **`progress`** - Synthetic per-content download progress
//! - **`model`** - Shared serde data model
//! - **`config`** / **`error`** - Configuration and the typed error channel
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use studypack::{
//!     ApiClient, ConnectivityMonitor, InteractionTracker, LocalStore, OfflineConfig,
//!     SyncCoordinator,
//! };
//!
//! # async fn example() -> studypack::Result<()> {
//! let config = OfflineConfig::builder()
//!     .server_url("https://content.example.org")
//!     .build()?;
//! let store = Arc::new(LocalStore::open(&config.database_path).await?);
//! let api = ApiClient::new(&config);
//! let connectivity = ConnectivityMonitor::new(true);
//! let coordinator =
//!     Arc::new(SyncCoordinator::new(store, api, connectivity, config).await?);
//!
//! // make a lesson available offline
//! coordinator.download_content("phys-waves-02").await?;
//!
//! // track a viewing session
//! let mut tracker = InteractionTracker::new(Arc::clone(&coordinator));
//! tracker.activate("phys-waves-02").await?;
//! // ... user reads the lesson ...
//! tracker.deactivate().await?;
//!
//! // later, when online
//! coordinator.synchronize().await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod progress;
pub mod store;
pub mod tracker;

pub use api::ApiClient;
pub use config::{ConfigError, OfflineConfig, OfflineConfigBuilder};
pub use connectivity::ConnectivityMonitor;
pub use coordinator::{FlushReport, RefreshReport, SyncCoordinator, SyncReport};
pub use error::{OfflineError, Result};
pub use model::{
    ContentBody, ContentPackage, DownloadState, DownloadedMeta, InteractionPayload, Manifest,
    OfflineStats, SyncQueueItem,
};
pub use progress::ProgressRegistry;
pub use store::LocalStore;
pub use tracker::InteractionTracker;
