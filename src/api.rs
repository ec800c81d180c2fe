//! # Remote Offline API Client
//!
//! HTTP client for the three offline endpoints: package downloads, version
//! checks, and interaction uploads. Transport failures map to
//! `OfflineError::Network`, non-success responses to
//! `OfflineError::ServerRejected` with the response body attached.

use crate::config::OfflineConfig;
use crate::error::{OfflineError, Result};
use crate::model::{ContentPackage, SyncQueueItem};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckVersionsRequest<'a> {
    content_versions: &'a HashMap<String, i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckVersionsResponse {
    updates_needed: Vec<String>,
}

/// Client for the remote offline content API
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    /// Create a new client against the configured server
    pub fn new(config: &OfflineConfig) -> Self {
        Self {
            base_url: config.server_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch the full offline package for one content id.
    ///
    /// `GET /api/offline/package/{contentId}`
    pub async fn fetch_package(&self, content_id: &str) -> Result<ContentPackage> {
        let url = self.url(&format!("/api/offline/package/{}", content_id));
        let response = self.client.get(&url).send().await?;
        let body = Self::read_success_body(response).await?;
        let package: ContentPackage = serde_json::from_slice(&body)?;
        Ok(package)
    }

    /// Ask the server which of the given local versions are stale.
    ///
    /// `POST /api/offline/check-versions` with `{ contentVersions: {id: version} }`;
    /// the response lists only the ids needing an update.
    pub async fn check_versions(&self, versions: &HashMap<String, i64>) -> Result<Vec<String>> {
        let url = self.url("/api/offline/check-versions");
        let response = self
            .client
            .post(&url)
            .json(&CheckVersionsRequest { content_versions: versions })
            .send()
            .await?;
        let body = Self::read_success_body(response).await?;
        let parsed: CheckVersionsResponse = serde_json::from_slice(&body)?;
        Ok(parsed.updates_needed)
    }

    /// Upload one queued interaction record.
    ///
    /// `POST /api/offline/interactions`
    pub async fn submit_interaction(&self, item: &SyncQueueItem) -> Result<()> {
        let url = self.url("/api/offline/interactions");
        let response = self.client.post(&url).json(item).send().await?;
        Self::read_success_body(response).await?;
        Ok(())
    }

    async fn read_success_body(response: reqwest::Response) -> Result<Vec<u8>> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(OfflineError::server_rejected(status.as_u16(), message));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
