use crate::error::{Error, Result};
use crate::model::{ProvisioningMode, RetryPolicy};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_JOBS: usize = 2;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime settings for a provisioning run.
///
/// Nothing here touches the filesystem: the models directory is created by
/// the provisioner, where a failure aborts the run.
#[derive(Debug, Clone)]
pub struct Config {
	pub models_dir: PathBuf,
	pub mode: ProvisioningMode,
	pub jobs: usize,
	pub timeout: Duration,
	pub connect_timeout: Duration,
	pub retry: RetryPolicy,
	pub catalog_path: Option<PathBuf>,
}

impl Config {
	pub fn new() -> Result<Self> {
		Ok(Self {
			models_dir: default_models_dir()?,
			mode: ProvisioningMode::default(),
			jobs: DEFAULT_JOBS,
			timeout: DEFAULT_TIMEOUT,
			connect_timeout: DEFAULT_CONNECT_TIMEOUT,
			retry: RetryPolicy::default(),
			catalog_path: None,
		})
	}

	/// Defaults overridden by `MODELFETCH_*` variables. Not validated, so
	/// callers can apply further overrides before calling `validate`.
	pub fn from_env() -> Result<Self> {
		let mut config = Self::new()?;

		if let Ok(dir) = std::env::var("MODELFETCH_MODELS_DIR") {
			config.models_dir = PathBuf::from(dir);
		}
		if let Ok(mode) = std::env::var("MODELFETCH_MODE") {
			config.mode = mode.parse()?;
		}
		if let Ok(jobs) = std::env::var("MODELFETCH_JOBS") {
			config.jobs = parse_var("MODELFETCH_JOBS", &jobs)?;
		}
		if let Ok(secs) = std::env::var("MODELFETCH_TIMEOUT_SECS") {
			config.timeout = Duration::from_secs(parse_var("MODELFETCH_TIMEOUT_SECS", &secs)?);
		}
		if let Ok(retries) = std::env::var("MODELFETCH_RETRIES") {
			config.retry.max_attempts = parse_var("MODELFETCH_RETRIES", &retries)?;
		}
		if let Ok(path) = std::env::var("MODELFETCH_CATALOG") {
			config.catalog_path = Some(PathBuf::from(path));
		}

		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.jobs == 0 {
			return Err(Error::Config("jobs must be at least 1".to_string()));
		}
		if self.retry.max_attempts == 0 {
			return Err(Error::Config("retries must be at least 1".to_string()));
		}
		if self.timeout.is_zero() {
			return Err(Error::Config("timeout must be greater than zero".to_string()));
		}
		Ok(())
	}
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
	value
		.trim()
		.parse()
		.map_err(|_| Error::Config(format!("Invalid value for {}: {:?}", name, value)))
}

/// `models/` next to the installed executable, falling back to the
/// platform data directory when the executable path is unavailable.
pub fn default_models_dir() -> Result<PathBuf> {
	if let Some(dir) = std::env::current_exe()
		.ok()
		.and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
	{
		return Ok(dir.join("models"));
	}

	let project_dirs = ProjectDirs::from("", "", "modelfetch")
		.ok_or_else(|| Error::Config("Could not determine data directory".to_string()))?;
	Ok(project_dirs.data_dir().join("models"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_valid() {
		let config = Config::new().unwrap();
		assert_eq!(config.mode, ProvisioningMode::Efficiency);
		assert_eq!(config.jobs, DEFAULT_JOBS);
		assert!(config.models_dir.ends_with("models"));
		config.validate().unwrap();
	}

	#[test]
	fn zero_jobs_is_rejected() {
		let mut config = Config::new().unwrap();
		config.jobs = 0;
		assert!(matches!(config.validate(), Err(Error::Config(_))));
	}

	#[test]
	fn parse_var_reports_name() {
		let err = parse_var::<usize>("MODELFETCH_JOBS", "many").unwrap_err();
		assert!(err.to_string().contains("MODELFETCH_JOBS"));
	}
}
