//! # Local Store
//!
//! Durable SQLite persistence for the offline subsystem, surviving
//! application restarts. The store is organized into three independent
//! partitions plus a metadata table:
//!
//! - **Manifest**: download metadata, one row per cached content id
//! - **Packages**: full offline bundles, keyed by content id
//! - **Sync Queue**: pending interaction records, keyed by item id
//! - **Sync Metadata**: key-value bookkeeping (schema version, last sync)
//!
//! Manifest and package writes for a single logical operation go through one
//! transaction, so the manifest never references a package that is not
//! there.
//!
//! ## Key Components
//!
//! - `mod.rs`: connection management, schema initialization, migrations
//! - `manifest.rs`: manifest reads and transactional download upserts
//! - `packages.rs`: package reads and writes
//! - `queue.rs`: sync queue and sync metadata operations
//!
//! ## Usage
//!
//! ```rust,no_run
//! use studypack::store::LocalStore;
//!
//! # async fn demo() -> studypack::Result<()> {
//! let store = LocalStore::open("offline.db").await?;
//! let manifest = store.get_manifest().await?;
//! println!("{} items cached", manifest.downloaded.len());
//! # Ok(())
//! # }
//! ```

mod manifest;
mod packages;
mod queue;

use crate::error::{OfflineError, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::time::Duration;

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Local store connection manager.
///
/// Wraps the SQLite connection pool and provides the partitioned operations
/// defined in the submodules. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    /// Open or create the local store at the given path.
    ///
    /// Creates the database file and parent directories if missing, applies
    /// PRAGMAs, and initializes the schema. A failure here is fatal for the
    /// offline subsystem: the caller should surface `StoreUnavailable` and
    /// disable offline features rather than retry.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OfflineError::store_unavailable(e.to_string()))?;
        }
        let options = Self::base_options().filename(path).create_if_missing(true);
        Self::connect(options, 5).await
    }

    /// Open an in-memory store.
    ///
    /// In-memory databases are destroyed when the connection closes, and
    /// parallel connections would each see their own empty database, so the
    /// pool is limited to a single connection. Not gated behind `cfg(test)`
    /// so integration tests can use it too.
    pub async fn open_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        Self::connect(options, 1).await
    }

    /// Connection options shared between file and in-memory stores
    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(1500))
            .pragma("temp_store", "MEMORY")
            .pragma("cache_size", "1000")
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| OfflineError::store_unavailable(e.to_string()))?;
        let store = Self { pool };
        store
            .init_schema()
            .await
            .map_err(|e| OfflineError::store_unavailable(e.to_string()))?;
        Ok(store)
    }

    /// Initialize database schema
    ///
    /// Creates all tables and runs any pending migrations. Safe to call more
    /// than once; the schema file only contains IF NOT EXISTS statements.
    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("schema.sql")).execute(&self.pool).await?;
        self.run_migrations().await
    }

    /// Run database migrations
    ///
    /// Checks the recorded schema version and applies anything pending.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current_version: i32 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;

        if current_version < 1 {
            self.apply_migration_1().await?;
        }

        Ok(())
    }

    /// Migration 1: initial schema
    async fn apply_migration_1(&self) -> Result<()> {
        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (1, ?)")
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool.
    ///
    /// Waits for all connections to be returned and closes them. The store
    /// should not be used afterwards.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
