use clap::{Args, Parser, Subcommand};
use modelfetch::{Config, ProvisioningMode, ProvisioningResult};
use std::path::PathBuf;
use std::time::Duration;

/// Every selected model is ready.
pub const EXIT_READY: u8 = 0;
/// The run finished but some models failed.
pub const EXIT_PARTIAL: u8 = 1;
/// The run could not start or was aborted.
pub const EXIT_FATAL: u8 = 2;

#[derive(Parser)]
#[command(name = "modelfetch")]
#[command(version, about = "Download and verify the model files needed for OCR inference", long_about = None)]
pub struct Cli {
	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Args, Debug, Default)]
pub struct Selection {
	/// Model set to use: "efficiency" (mobile models) or "full" (all models)
	#[arg(long)]
	pub mode: Option<ProvisioningMode>,

	/// TOML catalog to use instead of the built-in model list
	#[arg(long)]
	pub catalog: Option<PathBuf>,
}

impl Selection {
	pub fn apply(&self, config: &mut Config) {
		if let Some(mode) = self.mode {
			config.mode = mode;
		}
		if let Some(catalog) = &self.catalog {
			config.catalog_path = Some(catalog.clone());
		}
	}
}

#[derive(Subcommand)]
pub enum Commands {
	/// Download missing or corrupt models into the models directory
	Provision {
		#[command(flatten)]
		selection: Selection,

		/// Models directory (defaults to `models/` next to the executable)
		#[arg(long)]
		dir: Option<PathBuf>,

		/// Number of models downloaded in parallel
		#[arg(long)]
		jobs: Option<usize>,

		/// Per-model transfer timeout in seconds
		#[arg(long)]
		timeout: Option<u64>,

		/// Attempts per model, including the first
		#[arg(long)]
		retries: Option<u32>,

		/// Print the result as JSON
		#[arg(long)]
		json: bool,
	},

	/// List the models in the catalog
	List {
		#[command(flatten)]
		selection: Selection,
	},

	/// Check local models without downloading anything
	Status {
		#[command(flatten)]
		selection: Selection,

		/// Models directory (defaults to `models/` next to the executable)
		#[arg(long)]
		dir: Option<PathBuf>,
	},

	/// Print the digest of a file
	Digest {
		file: PathBuf,

		/// Use SHA-256 instead of MD5
		#[arg(long)]
		sha256: bool,
	},
}

pub fn apply_transfer_overrides(
	config: &mut Config,
	dir: Option<PathBuf>,
	jobs: Option<usize>,
	timeout: Option<u64>,
	retries: Option<u32>,
) {
	if let Some(dir) = dir {
		config.models_dir = dir;
	}
	if let Some(jobs) = jobs {
		config.jobs = jobs;
	}
	if let Some(secs) = timeout {
		config.timeout = Duration::from_secs(secs);
	}
	if let Some(retries) = retries {
		config.retry.max_attempts = retries;
	}
}

pub fn exit_code(result: &modelfetch::Result<ProvisioningResult>) -> u8 {
	match result {
		Ok(result) if result.is_success() => EXIT_READY,
		Ok(_) => EXIT_PARTIAL,
		Err(_) => EXIT_FATAL,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use modelfetch::model::TransferOutcome;
	use modelfetch::Error;

	#[test]
	fn provision_flags_parse() {
		let cli = Cli::try_parse_from([
			"modelfetch",
			"provision",
			"--mode",
			"all",
			"--dir",
			"/tmp/models",
			"--jobs",
			"4",
			"--json",
		])
		.unwrap();

		match cli.command {
			Commands::Provision {
				selection,
				dir,
				jobs,
				json,
				..
			} => {
				assert_eq!(selection.mode, Some(ProvisioningMode::Full));
				assert_eq!(dir, Some(PathBuf::from("/tmp/models")));
				assert_eq!(jobs, Some(4));
				assert!(json);
			}
			_ => panic!("expected provision"),
		}
	}

	#[test]
	fn unknown_mode_is_rejected() {
		assert!(Cli::try_parse_from(["modelfetch", "list", "--mode", "tiny"]).is_err());
	}

	#[test]
	fn overrides_apply_to_config() {
		let mut config = Config::new().unwrap();
		Selection {
			mode: Some(ProvisioningMode::Full),
			catalog: None,
		}
		.apply(&mut config);
		apply_transfer_overrides(&mut config, None, Some(3), Some(5), Some(1));

		assert_eq!(config.mode, ProvisioningMode::Full);
		assert_eq!(config.jobs, 3);
		assert_eq!(config.timeout, Duration::from_secs(5));
		assert_eq!(config.retry.max_attempts, 1);
	}

	#[test]
	fn flags_override_invalid_environment_values() {
		let mut config = Config::new().unwrap();
		config.jobs = 0;
		assert!(config.validate().is_err());

		apply_transfer_overrides(&mut config, None, Some(4), None, None);
		config.validate().unwrap();
	}

	#[test]
	fn exit_codes_follow_result() {
		let ready: ProvisioningResult = vec![
			TransferOutcome::already_satisfied("det.onnx"),
			TransferOutcome::downloaded("rec.onnx", 42),
		]
		.into_iter()
		.collect();
		assert_eq!(exit_code(&Ok(ready)), EXIT_READY);

		let partial: ProvisioningResult = vec![
			TransferOutcome::downloaded("det.onnx", 42),
			TransferOutcome::transfer_failed("rec.onnx", "HTTP 404"),
		]
		.into_iter()
		.collect();
		assert_eq!(exit_code(&Ok(partial)), EXIT_PARTIAL);

		let fatal = Err(Error::Directory {
			path: PathBuf::from("/models"),
			source: std::io::Error::other("read-only file system"),
		});
		assert_eq!(exit_code(&fatal), EXIT_FATAL);
	}
}
