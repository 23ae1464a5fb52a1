use crate::error::{Result, SyncError};
use crate::sync::scanner::EntryKind;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Copy one file, replacing `dest` atomically
///
/// The bytes land in a temporary file next to `dest` which is then renamed
/// over it, so a failed copy never leaves a truncated replica file behind.
/// Returns the number of bytes copied.
pub fn copy_file(source: &Path, dest: &Path, preserve_metadata: bool) -> Result<u64> {
    let copy_err = |source| SyncError::CopyError {
        path: dest.to_path_buf(),
        source,
    };

    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut input = File::open(source).map_err(copy_err)?;
    let source_meta = input.metadata().map_err(copy_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(copy_err)?;
    let bytes = io::copy(&mut input, tmp.as_file_mut()).map_err(copy_err)?;
    tmp.as_file().sync_all().map_err(copy_err)?;

    if preserve_metadata {
        fs::set_permissions(tmp.path(), source_meta.permissions()).map_err(copy_err)?;
    }

    tmp.persist(dest).map_err(|e| copy_err(e.error))?;

    if preserve_metadata {
        if let Ok(mtime) = source_meta.modified() {
            if let Err(e) = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime)) {
                tracing::debug!("Could not set mtime on {}: {}", dest.display(), e);
            }
        }
    }

    Ok(bytes)
}

/// Recursively copy the directory `source` to `dest`, which must not exist yet
///
/// `level` is the nesting level of `source` below the mirrored root. A
/// directory may sit at most at level `max_depth` and a file one level below
/// it, the same bound the comparator walks. Symlinks are followed; a link
/// cycle or a tree past that bound aborts the copy and removes the partial
/// `dest`. Only file metadata is preserved; directories are created with
/// default permissions. Returns the number of files copied.
pub fn copy_tree(
    source: &Path,
    dest: &Path,
    level: usize,
    max_depth: usize,
    preserve_metadata: bool,
) -> Result<u64> {
    let result = copy_tree_inner(source, dest, level, max_depth, preserve_metadata);
    if result.is_err() && dest.exists() {
        if let Err(e) = fs::remove_dir_all(dest) {
            tracing::debug!("Could not remove partial copy {}: {}", dest.display(), e);
        }
    }
    result
}

fn copy_tree_inner(
    source: &Path,
    dest: &Path,
    level: usize,
    max_depth: usize,
    preserve_metadata: bool,
) -> Result<u64> {
    let mut files = 0;

    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(|e| SyncError::CopyError {
            path: e.path().unwrap_or(source).to_path_buf(),
            source: io::Error::from(e),
        })?;

        let entry_level = level + entry.depth();
        let limit = if entry.file_type().is_dir() {
            max_depth
        } else {
            max_depth + 1
        };
        if entry_level > limit {
            return Err(SyncError::DepthExceeded {
                path: entry.path().to_path_buf(),
                max_depth,
            });
        }

        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| SyncError::CopyError {
                path: entry.path().to_path_buf(),
                source: io::Error::other("entry escaped the source tree"),
            })?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|source| SyncError::CopyError {
                path: target.clone(),
                source,
            })?;
        } else {
            copy_file(entry.path(), &target, preserve_metadata)?;
            files += 1;
        }
    }

    Ok(files)
}

/// Copy a file or directory found at nesting `level` to `dest`
pub fn copy_entry(
    source: &Path,
    dest: &Path,
    kind: EntryKind,
    level: usize,
    max_depth: usize,
    preserve_metadata: bool,
) -> Result<()> {
    match kind {
        EntryKind::Dir => {
            copy_tree(source, dest, level, max_depth, preserve_metadata).map(|_| ())
        }
        EntryKind::File => copy_file(source, dest, preserve_metadata).map(|_| ()),
    }
}

/// Remove a file or a whole directory tree
///
/// A symlink is removed itself, never its target.
pub fn remove_entry(path: &Path, kind: EntryKind) -> Result<()> {
    let is_link = fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);

    let result = if kind.is_dir() && !is_link {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|source| SyncError::RemoveError {
        path: path.to_path_buf(),
        source,
    })
}

/// Check that `path` exists and is a directory
pub fn is_existing_dir(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}
