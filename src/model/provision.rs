use crate::config::DEFAULT_JOBS;
use crate::error::{Error, Result};
use crate::model::checksum::{self, ExpectedDigest};
use crate::model::downloader::Transfer;
use crate::model::registry::{AssetDescriptor, AssetRegistry, ProvisioningMode};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    AlreadySatisfied,
    Downloaded,
    VerificationFailed,
    TransferFailed,
}

impl OutcomeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::AlreadySatisfied | OutcomeStatus::Downloaded)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OutcomeStatus::AlreadySatisfied => "ok",
            OutcomeStatus::Downloaded => "downloaded",
            OutcomeStatus::VerificationFailed => "verification failed",
            OutcomeStatus::TransferFailed => "transfer failed",
        };
        f.write_str(label)
    }
}

/// Terminal result for one asset in a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    pub asset_id: String,
    pub status: OutcomeStatus,
    /// Bytes received over the network; zero when nothing was fetched.
    pub bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl TransferOutcome {
    pub fn already_satisfied(asset_id: &str) -> Self {
        Self::new(asset_id, OutcomeStatus::AlreadySatisfied, 0, None)
    }

    pub fn downloaded(asset_id: &str, bytes: u64) -> Self {
        Self::new(asset_id, OutcomeStatus::Downloaded, bytes, None)
    }

    pub fn verification_failed(asset_id: &str, bytes: u64, detail: impl Into<String>) -> Self {
        Self::new(asset_id, OutcomeStatus::VerificationFailed, bytes, Some(detail.into()))
    }

    pub fn transfer_failed(asset_id: &str, detail: impl Into<String>) -> Self {
        Self::new(asset_id, OutcomeStatus::TransferFailed, 0, Some(detail.into()))
    }

    fn new(asset_id: &str, status: OutcomeStatus, bytes: u64, error_detail: Option<String>) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            status,
            bytes,
            error_detail,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Aggregate of a provisioning run, outcomes in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisioningResult {
    pub total: usize,
    pub succeeded: usize,
    pub outcomes: Vec<TransferOutcome>,
}

impl ProvisioningResult {
    pub fn push(&mut self, outcome: TransferOutcome) {
        self.total += 1;
        if outcome.is_success() {
            self.succeeded += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn is_success(&self) -> bool {
        self.succeeded == self.total
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.asset_id.as_str())
            .collect()
    }

    pub fn downloaded_bytes(&self) -> u64 {
        self.outcomes.iter().map(|o| o.bytes).sum()
    }

    pub fn summary(&self) -> String {
        let failed = self.failed_ids();
        if failed.is_empty() {
            format!("{}/{} models ready", self.succeeded, self.total)
        } else {
            format!(
                "{}/{} models ready, {} failed: {}",
                self.succeeded,
                self.total,
                failed.len(),
                failed.join(", ")
            )
        }
    }
}

impl FromIterator<TransferOutcome> for ProvisioningResult {
    fn from_iter<I: IntoIterator<Item = TransferOutcome>>(iter: I) -> Self {
        let mut result = Self::default();
        for outcome in iter {
            result.push(outcome);
        }
        result
    }
}

/// What is on disk for an asset, without touching the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalState {
    Missing,
    /// Exists, and the catalog has no digest to check against.
    Present,
    Verified,
    Corrupt,
}

impl LocalState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LocalState::Present | LocalState::Verified)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LocalStatus {
    pub asset_id: String,
    pub path: PathBuf,
    pub state: LocalState,
}

/// Drives a provisioning run: checks local files, fetches what is missing
/// or corrupt, and verifies fresh downloads.
pub struct Provisioner<T> {
    registry: AssetRegistry,
    transfer: T,
    jobs: usize,
}

impl<T: Transfer> Provisioner<T> {
    pub fn new(registry: AssetRegistry, transfer: T) -> Self {
        Self {
            registry,
            transfer,
            jobs: DEFAULT_JOBS,
        }
    }

    /// Number of assets processed concurrently.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    /// Ensure every asset of `mode` exists in `target_dir` with the right
    /// content.
    ///
    /// Only a failure to create `target_dir` is returned as an error; per-asset
    /// failures are recorded in the result and never abort the run.
    pub async fn provision(&self, target_dir: &Path, mode: ProvisioningMode) -> Result<ProvisioningResult> {
        tokio::fs::create_dir_all(target_dir)
            .await
            .map_err(|source| Error::Directory {
                path: target_dir.to_path_buf(),
                source,
            })?;

        let assets = self.registry.assets_for_mode(mode);
        tracing::info!(
            "Provisioning {} models (mode: {}) into {:?}",
            assets.len(),
            mode,
            target_dir
        );

        // `buffered` yields in input order, so outcomes stay in catalog order.
        let result: ProvisioningResult = stream::iter(assets)
            .map(|asset| self.provision_asset(asset, target_dir))
            .buffered(self.jobs)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect();

        if result.is_success() {
            tracing::info!("{}", result.summary());
        } else {
            tracing::error!("{}", result.summary());
        }
        Ok(result)
    }

    async fn provision_asset(&self, asset: &AssetDescriptor, dir: &Path) -> TransferOutcome {
        let path = asset.local_path(dir);

        if is_file(&path).await {
            match &asset.expected_digest {
                None => {
                    tracing::info!("Model already present: {}", asset.id);
                    return TransferOutcome::already_satisfied(&asset.id);
                }
                Some(expected) => match verify(&path, expected).await {
                    Ok(true) => {
                        tracing::info!("Model already present and verified: {}", asset.id);
                        return TransferOutcome::already_satisfied(&asset.id);
                    }
                    Ok(false) => {
                        tracing::warn!("Digest mismatch for {}, downloading again", asset.id)
                    }
                    Err(e) => {
                        tracing::warn!("Could not verify {} ({}), downloading again", asset.id, e)
                    }
                },
            }
        }

        tracing::info!(
            "Downloading model: {} (about {} MB)",
            asset.id,
            asset.approximate_size_mb
        );
        let outcome = self.transfer.fetch(asset, &path).await;
        if outcome.status != OutcomeStatus::Downloaded {
            tracing::error!(
                "Model download failed: {}: {}",
                asset.id,
                outcome.error_detail.as_deref().unwrap_or("unknown error")
            );
            return outcome;
        }

        if let Some(expected) = &asset.expected_digest {
            let failure = match verify(&path, expected).await {
                Ok(true) => None,
                Ok(false) => Some(format!("downloaded file does not match {}", expected)),
                Err(e) => Some(format!("could not verify downloaded file: {}", e)),
            };
            if let Some(detail) = failure {
                tracing::error!("Verification failed for {}: {}", asset.id, detail);
                return TransferOutcome::verification_failed(&asset.id, outcome.bytes, detail);
            }
        }

        tracing::info!("Model downloaded: {}", asset.id);
        outcome
    }
}

/// Report the local state of each asset of `mode`. Never creates
/// directories and never touches the network.
pub async fn inspect(
    registry: &AssetRegistry,
    target_dir: &Path,
    mode: ProvisioningMode,
) -> Vec<LocalStatus> {
    let mut statuses = Vec::new();
    for asset in registry.assets_for_mode(mode) {
        let path = asset.local_path(target_dir);
        let state = if !is_file(&path).await {
            LocalState::Missing
        } else {
            match &asset.expected_digest {
                None => LocalState::Present,
                Some(expected) => match verify(&path, expected).await {
                    Ok(true) => LocalState::Verified,
                    Ok(false) | Err(_) => LocalState::Corrupt,
                },
            }
        };
        statuses.push(LocalStatus {
            asset_id: asset.id.clone(),
            path,
            state,
        });
    }
    statuses
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

async fn verify(path: &Path, expected: &ExpectedDigest) -> Result<bool> {
    let path = path.to_path_buf();
    let expected = expected.clone();
    tokio::task::spawn_blocking(move || checksum::matches(&path, &expected))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}
