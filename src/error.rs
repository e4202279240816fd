use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("Failed to create model directory {}: {source}", .path.display())]
	Directory {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Invalid catalog: {0}")]
	Catalog(String),

	#[error("Configuration error: {0}")]
	Config(String),

	#[error("Invalid input: {0}")]
	InvalidInput(String),

	#[error("Transfer failed: {0}")]
	Transfer(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Serialization error: {0}")]
	Serialization(String),
}

impl From<toml::de::Error> for Error {
	fn from(err: toml::de::Error) -> Self {
		Error::Serialization(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
