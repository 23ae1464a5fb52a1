use super::compare::{TreeComparator, DEFAULT_MAX_DEPTH};
use super::output::{EventSink, Operation, SyncEvent};
use super::scanner::{DirListing, EntryKind};
use crate::error::{Result, SyncError};
use crate::fingerprint::{files_equal, FingerprintAlgorithm};
use crate::fs_util::{copy_entry, copy_file, remove_entry};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Tally of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub unchanged: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl SyncOutcome {
    /// Number of entries that were written or removed
    pub fn changes(&self) -> usize {
        self.updated + self.deleted
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sync: {}; update: {}; delete: {}; failed: {}",
            self.unchanged, self.updated, self.deleted, self.failed
        )
    }
}

/// What to do with a subdirectory that exists on both sides but differs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryPolicy {
    /// Remove the replica subtree and copy the source subtree in its place
    #[default]
    Replace,

    /// Descend and reconcile the subtree entry by entry
    Merge,
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    pub algorithm: FingerprintAlgorithm,
    pub policy: DirectoryPolicy,
    pub max_depth: usize,
    pub preserve_metadata: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            algorithm: FingerprintAlgorithm::default(),
            policy: DirectoryPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            preserve_metadata: true,
        }
    }
}

/// Pair of directories still waiting to be merged
struct PendingDir {
    source: PathBuf,
    replica: PathBuf,
    relative: PathBuf,
    depth: usize,
}

/// Mutates a replica tree in place until it matches the source tree
pub struct Reconciler {
    options: ReconcileOptions,
    comparator: TreeComparator,
    sink: Arc<dyn EventSink>,
}

impl Reconciler {
    pub fn new(options: ReconcileOptions, sink: Arc<dyn EventSink>) -> Self {
        let comparator =
            TreeComparator::new(options.algorithm, sink.clone()).with_max_depth(options.max_depth);
        Self {
            options,
            comparator,
            sink,
        }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Bring `replica` in line with `source`
    ///
    /// Entries only in the replica are deleted, entries whose content differs
    /// are overwritten, entries only in the source are copied. Failures on a
    /// single entry are recorded and counted in `failed`; only a failure to
    /// list the two top-level directories aborts the pass.
    pub fn reconcile(&self, source: &Path, replica: &Path) -> Result<SyncOutcome> {
        let mut outcome = SyncOutcome::default();
        let mut pending = Vec::new();

        let source_listing = DirListing::read(source)?;
        let replica_listing = DirListing::read(replica)?;
        self.reconcile_level(
            &source_listing,
            &replica_listing,
            Path::new(""),
            0,
            &mut outcome,
            &mut pending,
        );

        while let Some(dir) = pending.pop() {
            let listings = DirListing::read(&dir.source)
                .and_then(|s| DirListing::read(&dir.replica).map(|r| (s, r)));

            match listings {
                Ok((source_listing, replica_listing)) => self.reconcile_level(
                    &source_listing,
                    &replica_listing,
                    &dir.relative,
                    dir.depth,
                    &mut outcome,
                    &mut pending,
                ),
                Err(e) => self.fail(&dir.relative, Operation::List, &e, &mut outcome),
            }
        }

        tracing::debug!(
            "Reconciled {} -> {}: {}",
            source.display(),
            replica.display(),
            outcome
        );
        Ok(outcome)
    }

    fn reconcile_level(
        &self,
        source: &DirListing,
        replica: &DirListing,
        relative: &Path,
        depth: usize,
        outcome: &mut SyncOutcome,
        pending: &mut Vec<PendingDir>,
    ) {
        for (name, replica_kind) in replica.iter() {
            let rel = relative.join(name);
            let source_path = source.path().join(name);
            let replica_path = replica.path().join(name);

            let Some(source_kind) = source.kind(name) else {
                match remove_entry(&replica_path, replica_kind) {
                    Ok(()) => {
                        self.sink.record(SyncEvent::Deleted { name: rel });
                        outcome.deleted += 1;
                    }
                    Err(e) => self.fail(&rel, Operation::Remove, &e, outcome),
                }
                continue;
            };

            match (source_kind, replica_kind) {
                (EntryKind::Dir, EntryKind::Dir) => {
                    match self.comparator.trees_equal(&source_path, &replica_path) {
                        Ok(true) => self.up_to_date(rel, outcome),
                        Ok(false) if self.options.policy == DirectoryPolicy::Merge => {
                            if depth + 1 > self.options.max_depth {
                                let err = SyncError::DepthExceeded {
                                    path: replica_path,
                                    max_depth: self.options.max_depth,
                                };
                                self.fail(&rel, Operation::List, &err, outcome);
                            } else {
                                pending.push(PendingDir {
                                    source: source_path,
                                    replica: replica_path,
                                    relative: rel,
                                    depth: depth + 1,
                                });
                            }
                        }
                        Ok(false) => self.replace(
                            &source_path,
                            &replica_path,
                            source_kind,
                            replica_kind,
                            rel,
                            depth,
                            outcome,
                        ),
                        Err(e) => self.fail(&rel, Operation::Compare, &e, outcome),
                    }
                }
                (EntryKind::File, EntryKind::File) => {
                    match files_equal(&source_path, &replica_path, self.options.algorithm) {
                        Ok(true) => self.up_to_date(rel, outcome),
                        Ok(false) => self.replace(
                            &source_path,
                            &replica_path,
                            source_kind,
                            replica_kind,
                            rel,
                            depth,
                            outcome,
                        ),
                        Err(e) => self.fail(&rel, Operation::Fingerprint, &e, outcome),
                    }
                }
                // Kind changed between file and directory
                _ => self.replace(
                    &source_path,
                    &replica_path,
                    source_kind,
                    replica_kind,
                    rel,
                    depth,
                    outcome,
                ),
            }
        }

        for (name, source_kind) in source.iter() {
            if replica.contains(name) {
                continue;
            }

            let rel = relative.join(name);
            let replica_path = replica.path().join(name);
            match copy_entry(
                &source.path().join(name),
                &replica_path,
                source_kind,
                depth + 1,
                self.options.max_depth,
                self.options.preserve_metadata,
            ) {
                Ok(()) => {
                    self.sink.record(SyncEvent::Copied { name: rel });
                    outcome.updated += 1;
                }
                Err(e) => self.fail(&rel, Operation::Copy, &e, outcome),
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn replace(
        &self,
        source_path: &Path,
        replica_path: &Path,
        source_kind: EntryKind,
        replica_kind: EntryKind,
        rel: PathBuf,
        depth: usize,
        outcome: &mut SyncOutcome,
    ) {
        let preserve = self.options.preserve_metadata;

        let result = if source_kind == EntryKind::File && replica_kind == EntryKind::File {
            // Atomic rename over the old file, no separate remove needed
            copy_file(source_path, replica_path, preserve)
                .map(|_| ())
                .map_err(|e| (Operation::Copy, e))
        } else {
            remove_entry(replica_path, replica_kind)
                .map_err(|e| (Operation::Remove, e))
                .and_then(|()| {
                    copy_entry(
                        source_path,
                        replica_path,
                        source_kind,
                        depth + 1,
                        self.options.max_depth,
                        preserve,
                    )
                    .map_err(|e| (Operation::Copy, e))
                })
        };

        match result {
            Ok(()) => {
                self.sink.record(SyncEvent::Updated { name: rel });
                outcome.updated += 1;
            }
            Err((operation, e)) => self.fail(&rel, operation, &e, outcome),
        }
    }

    fn up_to_date(&self, rel: PathBuf, outcome: &mut SyncOutcome) {
        self.sink.record(SyncEvent::UpToDate { name: rel });
        outcome.unchanged += 1;
    }

    fn fail(&self, rel: &Path, operation: Operation, err: &SyncError, outcome: &mut SyncOutcome) {
        self.sink.record(SyncEvent::Failed {
            name: rel.to_path_buf(),
            operation,
            error: err.to_string().replace('\n', "; "),
        });
        outcome.failed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::output::MemorySink;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn reconciler(policy: DirectoryPolicy) -> (Reconciler, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let options = ReconcileOptions {
            policy,
            ..ReconcileOptions::default()
        };
        (Reconciler::new(options, sink.clone()), sink)
    }

    #[test]
    fn test_outcome_display() {
        let outcome = SyncOutcome {
            unchanged: 3,
            updated: 2,
            deleted: 1,
            failed: 0,
        };
        assert_eq!(outcome.to_string(), "sync: 3; update: 2; delete: 1; failed: 0");
        assert_eq!(outcome.changes(), 3);
    }

    #[test]
    fn test_copies_missing_entries() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write(src.path(), "a.txt", "hello");
        write(src.path(), "dir/b.txt", "x");

        let (rec, sink) = reconciler(DirectoryPolicy::Replace);
        let outcome = rec.reconcile(src.path(), dst.path()).unwrap();

        assert_eq!(outcome.updated, 2);
        assert_eq!(outcome.unchanged, 0);
        assert_eq!(fs::read_to_string(dst.path().join("a.txt")).unwrap(), "hello");
        assert_eq!(fs::read_to_string(dst.path().join("dir/b.txt")).unwrap(), "x");
        assert_eq!(sink.messages(), vec!["a.txt is copied", "dir is copied"]);
    }

    #[test]
    fn test_replace_policy_rewrites_whole_dir() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write(src.path(), "dir/b.txt", "x");
        write(src.path(), "dir/same.txt", "same");
        write(dst.path(), "dir/b.txt", "y");
        write(dst.path(), "dir/same.txt", "same");
        write(dst.path(), "dir/stale.txt", "stale");

        let (rec, sink) = reconciler(DirectoryPolicy::Replace);
        let outcome = rec.reconcile(src.path(), dst.path()).unwrap();

        assert_eq!(
            outcome,
            SyncOutcome {
                unchanged: 0,
                updated: 1,
                deleted: 0,
                failed: 0
            }
        );
        assert_eq!(fs::read_to_string(dst.path().join("dir/b.txt")).unwrap(), "x");
        assert!(!dst.path().join("dir/stale.txt").exists());
        assert!(sink.messages().contains(&"dir is updated".to_string()));
    }

    #[test]
    fn test_merge_policy_touches_only_differences() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write(src.path(), "dir/b.txt", "x");
        write(src.path(), "dir/same.txt", "same");
        write(dst.path(), "dir/b.txt", "y");
        write(dst.path(), "dir/same.txt", "same");
        write(dst.path(), "dir/stale.txt", "stale");

        let (rec, sink) = reconciler(DirectoryPolicy::Merge);
        let outcome = rec.reconcile(src.path(), dst.path()).unwrap();

        assert_eq!(
            outcome,
            SyncOutcome {
                unchanged: 1,
                updated: 1,
                deleted: 1,
                failed: 0
            }
        );
        let messages = sink.messages();
        let b = Path::new("dir").join("b.txt");
        let stale = Path::new("dir").join("stale.txt");
        assert!(messages.contains(&format!("{} is updated", b.display())));
        assert!(messages.contains(&format!("{} is deleted", stale.display())));
    }

    #[test]
    fn test_kind_change_file_to_dir() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write(src.path(), "thing/inner.txt", "inner");
        write(dst.path(), "thing", "was a file");

        let (rec, _) = reconciler(DirectoryPolicy::Replace);
        let outcome = rec.reconcile(src.path(), dst.path()).unwrap();

        assert_eq!(outcome.updated, 1);
        assert!(dst.path().join("thing").is_dir());
        assert_eq!(
            fs::read_to_string(dst.path().join("thing/inner.txt")).unwrap(),
            "inner"
        );
    }

    #[test]
    fn test_kind_change_dir_to_file() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write(src.path(), "thing", "now a file");
        write(dst.path(), "thing/inner.txt", "inner");

        let (rec, _) = reconciler(DirectoryPolicy::Merge);
        let outcome = rec.reconcile(src.path(), dst.path()).unwrap();

        assert_eq!(outcome.updated, 1);
        assert_eq!(
            fs::read_to_string(dst.path().join("thing")).unwrap(),
            "now a file"
        );
    }

    #[test]
    fn test_deletes_extraneous_dir() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write(dst.path(), "old/deep/file.txt", "old");

        let (rec, sink) = reconciler(DirectoryPolicy::Replace);
        let outcome = rec.reconcile(src.path(), dst.path()).unwrap();

        assert_eq!(outcome.deleted, 1);
        assert!(!dst.path().join("old").exists());
        assert_eq!(sink.messages(), vec!["old is deleted"]);
    }

    #[test]
    fn test_missing_replica_aborts() {
        let src = TempDir::new().unwrap();
        let missing = src.path().join("missing");

        let (rec, _) = reconciler(DirectoryPolicy::Replace);
        let err = rec.reconcile(src.path(), &missing).unwrap_err();
        assert!(matches!(err, SyncError::ReadDirError { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_unreadable_source_file_is_counted_as_failed() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write(src.path(), "ok.txt", "ok");
        // Dangling link: listed as a file, but opening it fails for any user
        std::os::unix::fs::symlink(src.path().join("missing-target"), src.path().join("dangling"))
            .unwrap();

        let (rec, sink) = reconciler(DirectoryPolicy::Replace);
        let outcome = rec.reconcile(src.path(), dst.path()).unwrap();

        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.failed, 1);
        assert!(sink.events().iter().any(|e| matches!(
            e,
            SyncEvent::Failed {
                name,
                operation: Operation::Copy,
                ..
            } if name == Path::new("dangling")
        )));
        assert_eq!(fs::read_to_string(dst.path().join("ok.txt")).unwrap(), "ok");
        assert!(!dst.path().join("dangling").exists());
    }

    #[test]
    fn test_deepest_comparable_tree_is_copied() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write(src.path(), "1/2/f.txt", "f");

        let comparator = TreeComparator::new(FingerprintAlgorithm::Blake3, Arc::new(MemorySink::new()))
            .with_max_depth(2);
        assert!(comparator.trees_equal(src.path(), src.path()).unwrap());

        let sink = Arc::new(MemorySink::new());
        let options = ReconcileOptions {
            max_depth: 2,
            ..ReconcileOptions::default()
        };
        for policy in [DirectoryPolicy::Replace, DirectoryPolicy::Merge] {
            let dst = TempDir::new().unwrap();
            let rec = Reconciler::new(ReconcileOptions { policy, ..options }, sink.clone());
            let outcome = rec.reconcile(src.path(), dst.path()).unwrap();

            assert_eq!(outcome.failed, 0);
            assert_eq!(fs::read_to_string(dst.path().join("1/2/f.txt")).unwrap(), "f");
            assert!(comparator.trees_equal(src.path(), dst.path()).unwrap());
        }

        // One level deeper is past the limit, reported against the configured depth
        write(src.path(), "1/2/3/g.txt", "g");
        let rec = Reconciler::new(options, sink.clone());
        let outcome = rec.reconcile(src.path(), dst.path()).unwrap();

        assert_eq!(outcome.failed, 1);
        assert!(sink.messages().iter().any(|m| m.contains("Maximum depth is 2")));
        assert!(!dst.path().join("1").exists());
    }
}
