//! # Sync Queue Operations
//!
//! Persistence for pending interaction records and the sync metadata
//! key-value table. Queue items are keyed by their deterministically derived
//! id, so re-enqueueing the same session replaces rather than duplicates.
//!
//! ## Features
//!
//! - **Idempotent enqueue**: `INSERT OR REPLACE` keyed by derived id
//! - **Attempt tracking**: retry count, last attempt, last error, backoff
//! - **Dead-lettering**: items past the attempt cutoff leave the live queue
//! - **Cleanup**: old dead-lettered items can be reaped

use crate::error::Result;
use crate::model::SyncQueueItem;
use crate::store::LocalStore;
use sqlx::Row;
use tracing::warn;

/// Metadata key recording the last completed sync
const LAST_SYNC_TIME_KEY: &str = "last_sync_time";

impl LocalStore {
    /// Persist a queue item, replacing any item with the same derived id
    pub async fn put_queue_item(&self, item: &SyncQueueItem) -> Result<()> {
        let payload = serde_json::to_string(&item.payload)?;
        sqlx::query(
            "INSERT OR REPLACE INTO sync_queue
                (id, item_type, payload, created_at, retry_count, last_attempt, last_error, next_attempt_at, dead)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(&item.item_type)
        .bind(&payload)
        .bind(&item.timestamp)
        .bind(item.retry_count)
        .bind(&item.last_attempt)
        .bind(&item.last_error)
        .bind(&item.next_attempt_at)
        .bind(item.dead)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// List live (non dead-lettered) queue items in enqueue order
    pub async fn list_queue_items(&self) -> Result<Vec<SyncQueueItem>> {
        self.list_queue_where("dead = 0").await
    }

    /// List dead-lettered queue items in enqueue order
    pub async fn list_dead_queue_items(&self) -> Result<Vec<SyncQueueItem>> {
        self.list_queue_where("dead = 1").await
    }

    async fn list_queue_where(&self, condition: &str) -> Result<Vec<SyncQueueItem>> {
        let query = format!(
            "SELECT id, item_type, payload, created_at, retry_count, last_attempt, last_error, next_attempt_at, dead
             FROM sync_queue WHERE {} ORDER BY created_at ASC",
            condition
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let payload: String = row.try_get("payload")?;
            let payload = match serde_json::from_str(&payload) {
                Ok(payload) => payload,
                Err(e) => {
                    // a malformed row should not wedge the whole queue
                    warn!(item = %id, error = %e, "skipping malformed sync queue item");
                    continue;
                }
            };
            items.push(SyncQueueItem {
                id,
                item_type: row.try_get("item_type")?,
                payload,
                timestamp: row.try_get("created_at")?,
                retry_count: row.try_get("retry_count")?,
                last_attempt: row.try_get("last_attempt")?,
                last_error: row.try_get("last_error")?,
                next_attempt_at: row.try_get("next_attempt_at")?,
                dead: row.try_get("dead")?,
            });
        }
        Ok(items)
    }

    /// Delete a queue item, returning whether one existed
    pub async fn delete_queue_item(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sync_queue WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a failed upload attempt and schedule the next one
    pub async fn mark_queue_attempt(
        &self,
        id: &str,
        error: &str,
        next_attempt_at: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE sync_queue SET
                retry_count = retry_count + 1,
                last_attempt = ?,
                last_error = ?,
                next_attempt_at = ?
             WHERE id = ?",
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(error)
        .bind(next_attempt_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Dead-letter a queue item that reached the attempt cutoff
    pub async fn mark_queue_dead(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE sync_queue SET
                dead = 1,
                retry_count = retry_count + 1,
                last_attempt = ?,
                last_error = ?
             WHERE id = ?",
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove dead-lettered items older than the given age.
    ///
    /// Returns the number of items removed.
    pub async fn cleanup_dead_items(&self, max_age_days: i64) -> Result<u64> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(max_age_days);
        let result = sqlx::query("DELETE FROM sync_queue WHERE dead = 1 AND created_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Set sync metadata
    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_metadata (key, value, updated_at) VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get sync metadata
    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM sync_metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    /// Get last sync timestamp
    pub async fn last_sync_time(&self) -> Result<Option<String>> {
        self.get_metadata(LAST_SYNC_TIME_KEY).await
    }

    /// Set last sync timestamp
    pub async fn set_last_sync_time(&self, timestamp: &str) -> Result<()> {
        self.set_metadata(LAST_SYNC_TIME_KEY, timestamp).await
    }
}
