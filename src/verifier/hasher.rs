//! Streaming content digests for duplicate detection.
//!
//! # Overview
//!
//! Files are read in fixed-size chunks so memory use stays flat regardless
//! of file size. BLAKE3 is the default; SHA-256 is available for users who
//! need digests comparable with other tools.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Read buffer size for streaming hashes (64 KiB).
const CHUNK_SIZE: usize = 64 * 1024;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// BLAKE3 (fast, default)
    #[default]
    Blake3,
    /// SHA-256
    Sha256,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blake3 => write!(f, "blake3"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "blake3" => Ok(Self::Blake3),
            "sha256" => Ok(Self::Sha256),
            other => Err(format!(
                "unknown hash algorithm '{other}' (expected blake3 or sha256)"
            )),
        }
    }
}

/// Content hash could not be computed for a file.
#[derive(Debug, Error)]
pub enum HashFault {
    /// File disappeared before it could be hashed.
    #[error("file not found while hashing: {0}")]
    NotFound(PathBuf),

    /// Any other read failure.
    #[error("failed to hash {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HashFault {
    fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

enum DigestState {
    Blake3(Box<blake3::Hasher>),
    Sha256(Sha256),
}

impl DigestState {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Blake3(h) => {
                h.update(data);
            }
            Self::Sha256(h) => h.update(data),
        }
    }

    fn finish_hex(self) -> String {
        match self {
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
            Self::Sha256(h) => format!("{:x}", h.finalize()),
        }
    }
}

/// Computes hex-encoded content digests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher {
    algorithm: HashAlgorithm,
}

impl ContentHasher {
    /// Create a hasher for the given algorithm.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Algorithm in use.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash an in-memory buffer.
    ///
    /// # Example
    ///
    /// ```
    /// use filevet::verifier::{ContentHasher, HashAlgorithm};
    ///
    /// let hasher = ContentHasher::new(HashAlgorithm::Sha256);
    /// assert_eq!(
    ///     hasher.hash_bytes(b""),
    ///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    /// );
    /// ```
    #[must_use]
    pub fn hash_bytes(&self, data: &[u8]) -> String {
        let mut state = DigestState::new(self.algorithm);
        state.update(data);
        state.finish_hex()
    }

    /// Hash a file's contents.
    ///
    /// # Errors
    ///
    /// Returns [`HashFault`] if the file cannot be opened or read.
    pub fn hash_file(&self, path: &Path) -> Result<String, HashFault> {
        let mut file = File::open(path).map_err(|e| HashFault::from_io(path, e))?;
        let mut state = DigestState::new(self.algorithm);
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashFault::from_io(path, e)),
            };
            state.update(&buf[..n]);
        }

        Ok(state.finish_hex())
    }
}
