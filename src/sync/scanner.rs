use crate::error::{Result, SyncError};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

impl EntryKind {
    pub fn is_dir(self) -> bool {
        matches!(self, Self::Dir)
    }
}

/// Entries directly under one directory, unique by name
///
/// Names are kept sorted so traversal and log output are deterministic.
#[derive(Debug, Clone)]
pub struct DirListing {
    path: PathBuf,
    entries: BTreeMap<OsString, EntryKind>,
}

impl DirListing {
    /// List a single directory level (no recursion)
    ///
    /// Kinds are resolved through symlinks, so a link to a directory lists as
    /// a directory. Entries whose target can't be resolved list as files and
    /// fail later when they are read.
    pub fn read(path: &Path) -> Result<Self> {
        let read_dir_err = |source| SyncError::ReadDirError {
            path: path.to_path_buf(),
            source,
        };

        let mut entries = BTreeMap::new();
        for entry in fs::read_dir(path).map_err(read_dir_err)? {
            let entry = entry.map_err(read_dir_err)?;

            let is_dir = match fs::metadata(entry.path()) {
                Ok(metadata) => metadata.is_dir(),
                Err(_) => entry.file_type().map(|t| t.is_dir()).unwrap_or(false),
            };

            let kind = if is_dir { EntryKind::Dir } else { EntryKind::File };
            entries.insert(entry.file_name(), kind);
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &OsStr) -> bool {
        self.entries.contains_key(name)
    }

    pub fn kind(&self, name: &OsStr) -> Option<EntryKind> {
        self.entries.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, EntryKind)> {
        self.entries.iter().map(|(name, kind)| (name.as_os_str(), *kind))
    }
}
