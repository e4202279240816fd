//! Content digests for local model files.
//!
//! Digests detect truncated or corrupted downloads; they are not a security
//! boundary. Files are read in fixed-size chunks so memory stays bounded for
//! weights larger than RAM.

use crate::error::{Error, Result};
use md5::Md5;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

const BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    fn from_hex_length(len: usize) -> Option<Self> {
        match len {
            32 => Some(DigestAlgorithm::Md5),
            64 => Some(DigestAlgorithm::Sha256),
            _ => None,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Md5 => write!(f, "MD5"),
            DigestAlgorithm::Sha256 => write!(f, "SHA-256"),
        }
    }
}

/// Expected digest of an asset, stored as lowercase hex.
///
/// The algorithm follows from the hex length: 32 characters is MD5,
/// 64 is SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpectedDigest {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl ExpectedDigest {
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl FromStr for ExpectedDigest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().to_ascii_lowercase();
        let algorithm = DigestAlgorithm::from_hex_length(hex.len()).ok_or_else(|| {
            Error::InvalidInput(format!(
                "digest must be 32 (MD5) or 64 (SHA-256) hex characters, got {}",
                hex.len()
            ))
        })?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidInput(format!(
                "digest is not hexadecimal: {}",
                s
            )));
        }
        Ok(Self { algorithm, hex })
    }
}

impl fmt::Display for ExpectedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl Serialize for ExpectedDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex)
    }
}

/// Compute the digest of a file as lowercase hex.
pub fn digest(path: &Path, algorithm: DigestAlgorithm) -> Result<String> {
    match algorithm {
        DigestAlgorithm::Md5 => hash_file::<Md5>(path),
        DigestAlgorithm::Sha256 => hash_file::<Sha256>(path),
    }
}

/// Whether the file's content hashes to `expected`.
pub fn matches(path: &Path, expected: &ExpectedDigest) -> Result<bool> {
    let actual = digest(path, expected.algorithm)?;
    Ok(actual.eq_ignore_ascii_case(&expected.hex))
}

fn hash_file<D: Digest>(path: &Path) -> Result<String> {
    let mut f = File::open(path)?;
    let mut hasher = D::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
