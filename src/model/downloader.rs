use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::progress::{NoProgress, ProgressSink, Throttle};
use crate::model::provision::TransferOutcome;
use crate::model::registry::AssetDescriptor;
use crate::model::retry::{FailureKind, RetryDecision, RetryPolicy};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Fetches one asset into a local path.
///
/// Failures are reported as a `TransferFailed` outcome, never as an error.
/// Implementations do not verify content; that is left to the caller.
#[async_trait]
pub trait Transfer: Send + Sync {
    async fn fetch(&self, asset: &AssetDescriptor, destination: &Path) -> TransferOutcome;
}

struct AttemptError {
    kind: FailureKind,
    error: Error,
}

impl AttemptError {
    fn new(kind: FailureKind, error: Error) -> Self {
        Self { kind, error }
    }

    fn io(err: std::io::Error) -> Self {
        Self::new(FailureKind::Fatal, Error::Io(err))
    }

    fn http(err: reqwest::Error) -> Self {
        Self::new(FailureKind::from_reqwest(&err), Error::Transfer(err.to_string()))
    }
}

/// Streams assets over HTTP(S) into `<file>.part`, then renames into place.
pub struct HttpTransfer {
    client: Client,
    retry: RetryPolicy,
    progress: Arc<dyn ProgressSink>,
}

impl HttpTransfer {
    pub fn new(timeout: Duration, connect_timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!("modelfetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            retry,
            progress: Arc::new(NoProgress),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.timeout, config.connect_timeout, config.retry)
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    async fn attempt(
        &self,
        asset: &AssetDescriptor,
        destination: &Path,
        partial: &Path,
    ) -> std::result::Result<u64, AttemptError> {
        let response = self
            .client
            .get(&asset.source_uri)
            .send()
            .await
            .map_err(AttemptError::http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::new(
                FailureKind::from_status(status.as_u16()),
                Error::Transfer(format!("HTTP {} from {}", status, asset.source_uri)),
            ));
        }

        let total = response.content_length();
        self.progress.on_start(&asset.id, total);

        let mut file = File::create(partial).await.map_err(AttemptError::io)?;
        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;
        let mut throttle = Throttle::new(PROGRESS_INTERVAL);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(AttemptError::http)?;
            file.write_all(&chunk).await.map_err(AttemptError::io)?;
            downloaded += chunk.len() as u64;
            if throttle.ready() {
                self.progress.on_progress(&asset.id, downloaded, total);
            }
        }

        file.flush().await.map_err(AttemptError::io)?;
        file.sync_all().await.map_err(AttemptError::io)?;
        drop(file);

        if let Some(total) = total {
            if downloaded != total {
                return Err(AttemptError::new(
                    FailureKind::Connection,
                    Error::Transfer(format!(
                        "connection closed after {} of {} bytes",
                        downloaded, total
                    )),
                ));
            }
        }

        tokio::fs::rename(partial, destination)
            .await
            .map_err(AttemptError::io)?;

        self.progress.on_progress(&asset.id, downloaded, total);
        self.progress.on_finish(&asset.id, downloaded);
        Ok(downloaded)
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn fetch(&self, asset: &AssetDescriptor, destination: &Path) -> TransferOutcome {
        let partial = partial_path(destination);
        let mut attempt = 1;

        loop {
            match self.attempt(asset, destination, &partial).await {
                Ok(bytes) => return TransferOutcome::downloaded(&asset.id, bytes),
                Err(failure) => {
                    remove_partial(&partial).await;
                    match self.retry.decide(attempt, failure.kind) {
                        RetryDecision::RetryAfter(delay) => {
                            tracing::warn!(
                                "{}: attempt {}/{} failed ({}), retrying in {:?}",
                                asset.id,
                                attempt,
                                self.retry.max_attempts,
                                failure.error,
                                delay
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        RetryDecision::NoRetry => {
                            return TransferOutcome::transfer_failed(
                                &asset.id,
                                failure.error.to_string(),
                            );
                        }
                    }
                }
            }
        }
    }
}

/// Side-by-side temp path; the destination only ever holds a complete body.
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Could not remove partial download {:?}: {}", path, e);
        }
    }
}
