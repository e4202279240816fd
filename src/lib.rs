//! Provisioning of the model files an OCR inference engine needs before it
//! can start.
//!
//! The entry point is [`provision`]: it creates the target directory, checks
//! each selected asset against its expected digest, downloads what is missing
//! or corrupt, and reports one outcome per asset in catalog order.

pub mod config;
pub mod error;
pub mod model;

use std::path::Path;

pub use config::Config;
pub use error::{Error, Result};
pub use model::{AssetRegistry, ProvisioningMode, ProvisioningResult};

/// Provision the built-in catalog over HTTP with default settings.
pub async fn provision(target_dir: &Path, mode: ProvisioningMode) -> Result<ProvisioningResult> {
	let config = Config::new()?;
	let transfer = model::HttpTransfer::from_config(&config)?;
	model::Provisioner::new(AssetRegistry::builtin(), transfer)
		.with_jobs(config.jobs)
		.provision(target_dir, mode)
		.await
}
