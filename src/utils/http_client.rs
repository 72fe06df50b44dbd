use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_LENGTH;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::errors::{AppError, AppResult, SourceError, SourceResult};

/// Network operations the source cache needs from an upstream server
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Metadata-only request. `Ok(None)` when the server omits the length.
    async fn content_length(&self, url: &str) -> SourceResult<Option<u64>>;

    /// Full download of `url` into `dest`, returning the bytes written.
    /// `dest` is created or truncated; callers own atomic replacement.
    async fn download_to(&self, url: &str, dest: &Path) -> SourceResult<u64>;
}

/// reqwest-backed fetcher with bounded per-request timeouts
#[derive(Clone)]
pub struct StandardHttpClient {
    client: Client,
    download_timeout: Duration,
    head_timeout: Duration,
}

impl StandardHttpClient {
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.head_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            download_timeout: config.download_timeout,
            head_timeout: config.head_timeout,
        })
    }

    /// Shared client for other outbound calls (webhooks)
    pub fn inner_client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl SourceFetcher for StandardHttpClient {
    async fn content_length(&self, url: &str) -> SourceResult<Option<u64>> {
        let response = self
            .client
            .head(url)
            .timeout(self.head_timeout)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(url, &e))?;

        if !response.status().is_success() {
            return Err(SourceError::Http {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        // reqwest reports 0 for HEAD bodies, so read the header directly
        let length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        debug!("HEAD {} -> content-length {:?}", url, length);
        Ok(length)
    }

    async fn download_to(&self, url: &str, dest: &Path) -> SourceResult<u64> {
        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(url, &e))?;

        if !response.status().is_success() {
            return Err(SourceError::Http {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let io_error = |e: std::io::Error| SourceError::Transport {
            url: url.to_string(),
            message: format!("write to {} failed: {e}", dest.display()),
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(io_error)?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SourceError::from_reqwest(url, &e))?;
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error)?;
        file.sync_all().await.map_err(io_error)?;

        debug!("Downloaded {} bytes from {}", written, url);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_is_a_source_error() {
        let config = UpstreamConfig {
            head_timeout: Duration::from_millis(500),
            download_timeout: Duration::from_millis(500),
            ..UpstreamConfig::default()
        };
        let client = StandardHttpClient::new(&config).unwrap();

        // Port 9 (discard) on loopback is closed in test environments
        let err = client
            .content_length("http://127.0.0.1:9/uk.xml.gz")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SourceError::Transport { .. } | SourceError::Timeout { .. }
        ));
    }
}
