//! Content fingerprints used as a proxy for byte equality.

use crate::error::{Result, SyncError};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUFFER_SIZE: usize = 64 * 1024;

/// Digest used to fingerprint file contents
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintAlgorithm {
    /// BLAKE3 (default, cryptographic)
    #[default]
    Blake3,

    /// xxHash3 128-bit (faster, non-cryptographic)
    Xxh3,
}

impl fmt::Display for FingerprintAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blake3 => write!(f, "blake3"),
            Self::Xxh3 => write!(f, "xxh3"),
        }
    }
}

/// Digest over a file's full contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fingerprint {
    Blake3([u8; 32]),
    Xxh3(u128),
}

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        match self {
            Self::Blake3(bytes) => hex::encode(bytes),
            Self::Xxh3(value) => hex::encode(value.to_be_bytes()),
        }
    }
}

/// Stream a file through the chosen digest
///
/// The file handle is dropped as soon as the digest is finalized.
pub fn fingerprint_file(path: &Path, algorithm: FingerprintAlgorithm) -> Result<Fingerprint> {
    let to_err = |source| SyncError::FingerprintError {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(to_err)?;
    let mut buffer = vec![0u8; BUFFER_SIZE];

    match algorithm {
        FingerprintAlgorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            loop {
                let n = file.read(&mut buffer).map_err(to_err)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buffer[..n]);
            }
            Ok(Fingerprint::Blake3(*hasher.finalize().as_bytes()))
        }
        FingerprintAlgorithm::Xxh3 => {
            let mut hasher = xxhash_rust::xxh3::Xxh3::new();
            loop {
                let n = file.read(&mut buffer).map_err(to_err)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buffer[..n]);
            }
            Ok(Fingerprint::Xxh3(hasher.digest128()))
        }
    }
}

/// Check whether two files hold the same bytes
///
/// Files of different length are never equal, so sizes are compared before
/// anything is read.
pub fn files_equal(a: &Path, b: &Path, algorithm: FingerprintAlgorithm) -> Result<bool> {
    let size_a = std::fs::metadata(a)
        .map_err(|source| SyncError::FingerprintError {
            path: a.to_path_buf(),
            source,
        })?
        .len();
    let size_b = std::fs::metadata(b)
        .map_err(|source| SyncError::FingerprintError {
            path: b.to_path_buf(),
            source,
        })?
        .len();

    if size_a != size_b {
        return Ok(false);
    }

    Ok(fingerprint_file(a, algorithm)? == fingerprint_file(b, algorithm)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_blake3_matches_reference() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello.txt");
        fs::write(&path, b"hello").unwrap();

        let fp = fingerprint_file(&path, FingerprintAlgorithm::Blake3).unwrap();
        assert_eq!(fp.to_hex(), blake3::hash(b"hello").to_hex().to_string());
    }

    #[test]
    fn test_large_file_spans_buffers() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big.bin");
        let data: Vec<u8> = (0..(BUFFER_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        let fp = fingerprint_file(&path, FingerprintAlgorithm::Xxh3).unwrap();
        assert_eq!(fp, Fingerprint::Xxh3(xxhash_rust::xxh3::xxh3_128(&data)));
    }

    #[test]
    fn test_files_equal() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        let c = temp.path().join("c");
        let d = temp.path().join("d");
        fs::write(&a, "hello").unwrap();
        fs::write(&b, "hello").unwrap();
        fs::write(&c, "hallo").unwrap();
        fs::write(&d, "hello world").unwrap();

        for algorithm in [FingerprintAlgorithm::Blake3, FingerprintAlgorithm::Xxh3] {
            assert!(files_equal(&a, &b, algorithm).unwrap());
            assert!(!files_equal(&a, &c, algorithm).unwrap());
            assert!(!files_equal(&a, &d, algorithm).unwrap());
        }
    }

    #[test]
    fn test_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("gone.txt");

        let err = fingerprint_file(&missing, FingerprintAlgorithm::Blake3).unwrap_err();
        assert!(matches!(err, SyncError::FingerprintError { .. }));
        assert_eq!(err.path(), Some(missing.as_path()));
    }
}
