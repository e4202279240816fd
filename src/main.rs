mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use modelfetch::model::checksum::{self, DigestAlgorithm};
use modelfetch::model::{inspect, HttpTransfer, LogProgress, OutcomeStatus, Provisioner};
use modelfetch::{AssetRegistry, Config, ProvisioningResult};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

fn load_registry(config: &Config) -> anyhow::Result<AssetRegistry> {
    match &config.catalog_path {
        Some(path) => AssetRegistry::load(path)
            .with_context(|| format!("Failed to load catalog {}", path.display())),
        None => Ok(AssetRegistry::builtin()),
    }
}

fn report(result: &ProvisioningResult, models_dir: &Path) {
    for outcome in &result.outcomes {
        match outcome.status {
            OutcomeStatus::AlreadySatisfied | OutcomeStatus::Downloaded => {
                println!("✓ {} ({})", outcome.asset_id, outcome.status)
            }
            _ => println!(
                "✗ {} ({}): {}",
                outcome.asset_id,
                outcome.status,
                outcome.error_detail.as_deref().unwrap_or("")
            ),
        }
    }
    println!("\n{}", result.summary());
    println!("  Path: {:?}", models_dir);
    if !result.is_success() {
        println!("  Some models failed; check the network connection and run again.");
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    match cli.command {
        Commands::Provision {
            selection,
            dir,
            jobs,
            timeout,
            retries,
            json,
        } => {
            let mut config = Config::from_env()?;
            selection.apply(&mut config);
            cli::apply_transfer_overrides(&mut config, dir, jobs, timeout, retries);
            config.validate()?;

            let registry = load_registry(&config)?;
            let mut transfer = HttpTransfer::from_config(&config)?;
            if !json {
                transfer = transfer.with_progress(Arc::new(LogProgress));
            }
            let provisioner = Provisioner::new(registry, transfer).with_jobs(config.jobs);

            let result = provisioner.provision(&config.models_dir, config.mode).await;
            match &result {
                Ok(result) if json => println!("{}", serde_json::to_string_pretty(result)?),
                Ok(result) => report(result, &config.models_dir),
                Err(e) => eprintln!("Error: {}", e),
            }
            Ok(cli::exit_code(&result))
        }

        Commands::List { selection } => {
            let mut config = Config::from_env()?;
            selection.apply(&mut config);
            let registry = load_registry(&config)?;

            println!("Models for mode '{}':\n", config.mode);
            for asset in registry.assets_for_mode(config.mode) {
                let modes: Vec<&str> = asset.modes.iter().map(|m| m.as_str()).collect();
                println!("  {}", asset.id);
                println!("    Source: {}", asset.source_uri);
                println!("    Size: ~{} MB", asset.approximate_size_mb);
                println!("    Modes: {}", modes.join(", "));
                if let Some(digest) = &asset.expected_digest {
                    println!("    Digest: {}", digest);
                }
                println!();
            }
            Ok(cli::EXIT_READY)
        }

        Commands::Status { selection, dir } => {
            let mut config = Config::from_env()?;
            selection.apply(&mut config);
            if let Some(dir) = dir {
                config.models_dir = dir;
            }

            let registry = load_registry(&config)?;
            let statuses = inspect(&registry, &config.models_dir, config.mode).await;

            let ready = statuses.iter().filter(|s| s.state.is_ready()).count();
            for status in &statuses {
                println!("  {:<40} {:?}", status.asset_id, status.state);
            }
            println!("\n{}/{} models ready in {:?}", ready, statuses.len(), config.models_dir);

            if ready == statuses.len() {
                Ok(cli::EXIT_READY)
            } else {
                Ok(cli::EXIT_PARTIAL)
            }
        }

        // No configuration is loaded, so a bad environment cannot block it.
        Commands::Digest { file, sha256 } => {
            let algorithm = if sha256 {
                DigestAlgorithm::Sha256
            } else {
                DigestAlgorithm::Md5
            };
            let digest = checksum::digest(&file, algorithm)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            println!("{}  {}", digest, file.display());
            Ok(cli::EXIT_READY)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(cli::EXIT_FATAL)
        }
    }
}
