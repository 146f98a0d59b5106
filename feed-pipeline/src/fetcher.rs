use crate::traits::MediaFetcher;
use crate::types::{FetchConfig, PipelineError, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, Response, StatusCode};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};
use url::Url;

/// HTTP implementation of [`MediaFetcher`].
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn send(&self, url: &Url) -> std::result::Result<Response, reqwest::Error> {
        self.client.get(url.clone()).send().await
    }

    async fn write_body(&self, mut response: Response, dest: &Path) -> Result<u64> {
        let limit = (self.config.max_media_size_mb as u64) * 1024 * 1024;

        if let Some(content_length) = response.content_length() {
            if content_length > limit {
                return Err(PipelineError::General(format!(
                    "Media too large: {} bytes (limit {}MB)",
                    content_length, self.config.max_media_size_mb
                )));
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(dest)
            .await?;

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            written += chunk.len() as u64;
            if written > limit {
                return Err(PipelineError::General(format!(
                    "Media exceeded {}MB while downloading",
                    self.config.max_media_size_mb
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(written)
    }

    fn retry_policy(&self) -> ExponentialBackoff<backoff::SystemClock> {
        let delay = Duration::from_millis(self.config.retry_delay_ms);
        ExponentialBackoff {
            current_interval: delay,
            initial_interval: delay,
            max_interval: delay * 16,
            multiplier: 2.0,
            max_elapsed_time: Some(delay * 60),
            ..Default::default()
        }
    }
}

fn is_retryable(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout() || e.is_request()
}

#[async_trait]
impl MediaFetcher for Fetcher {
    async fn fetch_to_path(&self, url: &str, dest: &Path) -> Result<u64> {
        let parsed = Url::parse(url)?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(PipelineError::General(format!(
                    "Unsupported media URL scheme: {}",
                    other
                )))
            }
        }

        let start_time = Instant::now();
        let mut backoff = self.retry_policy();
        let mut last_error = None;

        debug!("Fetching media: {} -> {}", url, dest.display());

        for attempt in 0..=self.config.max_retries {
            match self.send(&parsed).await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let bytes = self.write_body(response, dest).await?;
                        info!(
                            "Fetched media: {} ({} bytes in {}ms)",
                            url,
                            bytes,
                            start_time.elapsed().as_millis()
                        );
                        return Ok(bytes);
                    }

                    let err = PipelineError::General(format!(
                        "HTTP {}: {}",
                        status,
                        status.canonical_reason().unwrap_or("Unknown")
                    ));

                    // Client errors will not change on retry
                    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
                        return Err(err);
                    }
                    last_error = Some(err);
                }
                Err(e) => {
                    let retryable = is_retryable(&e);
                    last_error = Some(PipelineError::Http(e));
                    if !retryable {
                        break;
                    }
                }
            }

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!("Attempt {} failed for {}, retrying in {:?}", attempt + 1, url, delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
            break;
        }

        error!("Failed to fetch media after {} attempts: {}", self.config.max_retries + 1, url);
        Err(last_error.unwrap_or_else(|| PipelineError::General("Unknown fetch error".to_string())))
    }
}
