//! Package partition operations.
//!
//! Packages are stored whole as their serialized JSON. The stored bytes are
//! the source of truth for the serialized size recorded in the manifest.

use crate::error::{OfflineError, Result};
use crate::model::ContentPackage;
use crate::store::LocalStore;
use sqlx::Row;

impl LocalStore {
    /// Get a stored package by content id
    pub async fn get_package(&self, content_id: &str) -> Result<Option<ContentPackage>> {
        let row = sqlx::query("SELECT data FROM packages WHERE content_id = ?")
            .bind(content_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let data: String = row.try_get("data")?;
                let package = serde_json::from_str(&data).map_err(|e| {
                    OfflineError::invalid_data(format!("corrupt package {}: {}", content_id, e))
                })?;
                Ok(Some(package))
            }
            None => Ok(None),
        }
    }

    /// Store a package, replacing any previous one with the same id.
    ///
    /// This only touches the package partition. Downloads should go through
    /// [`upsert_download`](Self::upsert_download) so the manifest stays in
    /// step.
    pub async fn put_package(&self, package: &ContentPackage) -> Result<()> {
        let data = serde_json::to_string(package)?;
        sqlx::query(
            "INSERT OR REPLACE INTO packages (content_id, data, version, size_in_bytes)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&package.content_id)
        .bind(&data)
        .bind(package.version)
        .bind(data.len() as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a package by content id, returning whether one existed
    pub async fn delete_package(&self, content_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM packages WHERE content_id = ?")
            .bind(content_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
