//! Avatar backend HTTP client.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{AvatarError, AvatarResult};
use crate::types::{normalize_response, StatusSnapshot};

/// Configuration for the avatar client.
#[derive(Debug, Clone)]
pub struct AvatarClientConfig {
    /// Base URL of the avatar generation service
    pub base_url: String,
    /// API key sent with every request
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for AvatarClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002/v1".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl AvatarClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("AVATAR_API_URL")
                .unwrap_or_else(|_| "http://localhost:8002/v1".to_string()),
            api_key: std::env::var("AVATAR_API_KEY").unwrap_or_default(),
            timeout: Duration::from_secs(
                std::env::var("AVATAR_API_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

/// Client for the talking-avatar generation backend.
///
/// One status query per call; repeating calls on an interval (and any
/// backoff policy) belongs to the orchestration layer.
pub struct AvatarClient {
    http: Client,
    config: AvatarClientConfig,
}

impl AvatarClient {
    /// Create a new avatar client.
    pub fn new(config: AvatarClientConfig) -> AvatarResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AvatarError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> AvatarResult<Self> {
        Self::new(AvatarClientConfig::from_env())
    }

    /// Query the status of a generation job.
    pub async fn query(&self, job_id: &str) -> AvatarResult<StatusSnapshot> {
        let url = format!("{}/video_status.get?video_id={}", self.config.base_url, job_id);

        debug!(job = job_id, "Querying avatar job status");

        let response = self
            .http
            .get(&url)
            .header("x-api-key", &self.config.api_key)
            .header("accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AvatarError::RequestFailed { status, body });
        }

        let raw: serde_json::Value = response.json().await?;
        normalize_response(&raw).ok_or(AvatarError::InvalidResponse { raw })
    }

    /// Stream a completed artifact to a local file, creating parent
    /// directories as needed.
    pub async fn download(&self, artifact_url: &str, dest: impl AsRef<Path>) -> AvatarResult<()> {
        let dest = dest.as_ref();
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self.http.get(artifact_url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AvatarError::RequestFailed { status, body });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        info!(path = %dest.display(), "Artifact downloaded");
        Ok(())
    }
}
