use super::output::{EventSink, MismatchReason, SyncEvent};
use super::scanner::{DirListing, EntryKind};
use crate::error::{Result, SyncError};
use crate::fingerprint::{files_equal, FingerprintAlgorithm};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Read-only check that two directory trees hold the same content
pub struct TreeComparator {
    algorithm: FingerprintAlgorithm,
    max_depth: usize,
    sink: Arc<dyn EventSink>,
}

impl TreeComparator {
    pub fn new(algorithm: FingerprintAlgorithm, sink: Arc<dyn EventSink>) -> Self {
        Self {
            algorithm,
            max_depth: DEFAULT_MAX_DEPTH,
            sink,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn algorithm(&self) -> FingerprintAlgorithm {
        self.algorithm
    }

    /// Compare `left` against `right`, descending into shared subdirectories
    ///
    /// Driven by the names in `left`: the trees differ if the entry counts
    /// differ, or if any name in `left` is missing from `right`, has another
    /// kind there, or has different contents. Names are unique within a
    /// listing, so equal counts plus every left name present means the name
    /// sets are identical.
    ///
    /// Walks with an explicit stack and stops at the first difference.
    pub fn trees_equal(&self, left: &Path, right: &Path) -> Result<bool> {
        let mut pending: Vec<(PathBuf, PathBuf, usize)> =
            vec![(left.to_path_buf(), right.to_path_buf(), 0)];

        while let Some((left_dir, right_dir, depth)) = pending.pop() {
            let left_listing = DirListing::read(&left_dir)?;
            let right_listing = DirListing::read(&right_dir)?;

            if left_listing.len() != right_listing.len() {
                self.mismatch(
                    &left_dir,
                    MismatchReason::EntryCount {
                        left: left_listing.len(),
                        right: right_listing.len(),
                    },
                );
                return Ok(false);
            }

            for (name, left_kind) in left_listing.iter() {
                let left_path = left_dir.join(name);
                let right_path = right_dir.join(name);

                let right_kind = match right_listing.kind(name) {
                    Some(kind) => kind,
                    None => {
                        self.mismatch(&left_path, MismatchReason::Missing);
                        return Ok(false);
                    }
                };

                match (left_kind, right_kind) {
                    (EntryKind::Dir, EntryKind::Dir) => {
                        if depth + 1 > self.max_depth {
                            return Err(SyncError::DepthExceeded {
                                path: left_path,
                                max_depth: self.max_depth,
                            });
                        }
                        pending.push((left_path, right_path, depth + 1));
                    }
                    (EntryKind::File, EntryKind::File) => {
                        if !files_equal(&left_path, &right_path, self.algorithm)? {
                            self.mismatch(&left_path, MismatchReason::ContentChanged);
                            return Ok(false);
                        }
                    }
                    _ => {
                        self.mismatch(&left_path, MismatchReason::KindChanged);
                        return Ok(false);
                    }
                }
            }
        }

        Ok(true)
    }

    fn mismatch(&self, path: &Path, reason: MismatchReason) {
        self.sink.record(SyncEvent::Mismatch {
            path: path.to_path_buf(),
            reason,
        });
    }
}
