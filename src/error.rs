use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Source folder not found: {path}\nMake sure the path exists, is a directory, and you have read permissions.")]
    SourceNotFound { path: PathBuf },

    #[error("Replica folder not found: {path}\nThe replica directory must exist before mirroring starts.")]
    ReplicaNotFound { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read directory: {path}\nCause: {source}\nCheck that the directory exists and you have read permissions.")]
    ReadDirError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to fingerprint file: {path}\nCause: {source}\nThe file may have been removed or locked while it was being read.")]
    FingerprintError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to copy: {path}\nCause: {source}\nCheck disk space and write permissions on the replica.")]
    CopyError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to remove: {path}\nCause: {source}\nCheck write permissions on the replica.")]
    RemoveError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Directory tree too deep: {path}\nMaximum depth is {max_depth}. Raise --max-depth if this nesting is intended.")]
    DepthExceeded { path: PathBuf, max_depth: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Path the failed operation was working on, if known
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::SourceNotFound { path }
            | Self::ReplicaNotFound { path }
            | Self::ReadDirError { path, .. }
            | Self::FingerprintError { path, .. }
            | Self::CopyError { path, .. }
            | Self::RemoveError { path, .. }
            | Self::DepthExceeded { path, .. } => Some(path),
            Self::Io(_) | Self::Config(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
