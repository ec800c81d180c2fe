//! # Manifest Operations
//!
//! Reads and writes of the manifest partition, plus the transactional
//! download operations that touch the manifest and package partitions
//! together. Either both writes land or neither does, which is what keeps
//! every manifest key backed by a stored package.

use crate::error::Result;
use crate::model::{ContentPackage, DownloadedMeta, Manifest, MANIFEST_VERSION};
use crate::store::LocalStore;
use sqlx::Row;
use std::collections::HashMap;

/// Metadata key recording the manifest format version
const MANIFEST_VERSION_KEY: &str = "manifest_version";

impl LocalStore {
    /// Get the persisted manifest.
    ///
    /// Returns a fresh empty manifest if nothing has been downloaded yet.
    pub async fn get_manifest(&self) -> Result<Manifest> {
        let version = match self.get_metadata(MANIFEST_VERSION_KEY).await? {
            Some(value) => value.parse::<i64>().unwrap_or(MANIFEST_VERSION),
            None => MANIFEST_VERSION,
        };

        let rows = sqlx::query(
            "SELECT content_id, version, downloaded_at, title, subject, size_in_bytes
             FROM manifest",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut downloaded = HashMap::with_capacity(rows.len());
        for row in rows {
            let content_id: String = row.try_get("content_id")?;
            downloaded.insert(content_id, Self::row_to_meta(&row)?);
        }

        Ok(Manifest { version, downloaded })
    }

    /// Atomically overwrite the whole manifest.
    ///
    /// Replaces every manifest row in one transaction. Package rows are not
    /// touched; callers that need the cross-partition invariant should use
    /// [`upsert_download`](Self::upsert_download) and
    /// [`remove_download`](Self::remove_download) instead.
    pub async fn put_manifest(&self, manifest: &Manifest) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM manifest").execute(&mut *tx).await?;
        for (content_id, meta) in &manifest.downloaded {
            sqlx::query(
                "INSERT INTO manifest (content_id, version, downloaded_at, title, subject, size_in_bytes)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(content_id)
            .bind(meta.version)
            .bind(&meta.downloaded_at)
            .bind(&meta.title)
            .bind(&meta.subject)
            .bind(meta.size_in_bytes as i64)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query(
            "INSERT OR REPLACE INTO sync_metadata (key, value, updated_at) VALUES (?, ?, ?)",
        )
        .bind(MANIFEST_VERSION_KEY)
        .bind(manifest.version.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Store a downloaded package and its manifest entry in one transaction.
    ///
    /// Idempotent upsert by content id: re-downloading an item replaces both
    /// the package and the manifest row, leaving exactly one of each.
    pub async fn upsert_download(
        &self,
        package: &ContentPackage,
        meta: &DownloadedMeta,
    ) -> Result<()> {
        let data = serde_json::to_string(package)?;
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT OR REPLACE INTO packages (content_id, data, version, size_in_bytes)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&package.content_id)
        .bind(&data)
        .bind(package.version)
        .bind(meta.size_in_bytes as i64)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT OR REPLACE INTO manifest (content_id, version, downloaded_at, title, subject, size_in_bytes)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&package.content_id)
        .bind(meta.version)
        .bind(&meta.downloaded_at)
        .bind(&meta.title)
        .bind(&meta.subject)
        .bind(meta.size_in_bytes as i64)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Delete a package and its manifest entry in one transaction.
    ///
    /// Returns the removed manifest entry, or `None` if the content id was
    /// not downloaded.
    pub async fn remove_download(&self, content_id: &str) -> Result<Option<DownloadedMeta>> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT content_id, version, downloaded_at, title, subject, size_in_bytes
             FROM manifest WHERE content_id = ?",
        )
        .bind(content_id)
        .fetch_optional(&mut *tx)
        .await?;
        let meta = match row {
            Some(row) => Some(Self::row_to_meta(&row)?),
            None => None,
        };
        sqlx::query("DELETE FROM packages WHERE content_id = ?")
            .bind(content_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM manifest WHERE content_id = ?")
            .bind(content_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(meta)
    }

    /// Sum of serialized package sizes across the manifest.
    ///
    /// Always computed by summation, never adjusted incrementally, so the
    /// value cannot drift across re-downloads and removals.
    pub async fn storage_used(&self) -> Result<u64> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(size_in_bytes), 0) FROM manifest")
                .fetch_one(&self.pool)
                .await?;
        Ok(total.max(0) as u64)
    }

    /// Number of downloaded items
    pub async fn count_downloaded(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM manifest")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Manifest ids with no stored package.
    ///
    /// The transactional write path never produces these; a non-empty result
    /// indicates a consistency bug or external tampering.
    pub async fn verify_consistency(&self) -> Result<Vec<String>> {
        let orphans: Vec<String> = sqlx::query_scalar(
            "SELECT content_id FROM manifest
             WHERE content_id NOT IN (SELECT content_id FROM packages)
             ORDER BY content_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(orphans)
    }

    fn row_to_meta(row: &sqlx::sqlite::SqliteRow) -> Result<DownloadedMeta> {
        Ok(DownloadedMeta {
            version: row.try_get("version")?,
            downloaded_at: row.try_get("downloaded_at")?,
            title: row.try_get("title")?,
            subject: row.try_get("subject")?,
            size_in_bytes: row.try_get::<i64, _>("size_in_bytes")?.max(0) as u64,
        })
    }
}
