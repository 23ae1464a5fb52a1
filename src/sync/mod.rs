pub mod compare;
pub mod output;
pub mod reconcile;
pub mod scanner;

use crate::error::{Result, SyncError};
use crate::fs_util::is_existing_dir;
use compare::TreeComparator;
use output::{EventSink, Operation, Role, SyncEvent};
use reconcile::{ReconcileOptions, Reconciler, SyncOutcome};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Result of a single poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    /// Trees already matched, nothing was touched
    UpToDate,
    /// The replica was reconciled
    Reconciled(SyncOutcome),
    /// One of the folders is gone, the loop must end
    Stopped(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    SourceMissing,
    ReplicaMissing,
    Shutdown,
}

pub struct MirrorConfig {
    pub source: PathBuf,
    pub replica: PathBuf,
    pub interval: Duration,
    pub options: ReconcileOptions,
}

/// Periodically mirrors a source folder onto a replica folder
///
/// Every poll re-reads both trees from disk; nothing is carried over
/// between polls.
pub struct Mirror {
    source: PathBuf,
    replica: PathBuf,
    interval: Duration,
    comparator: TreeComparator,
    reconciler: Reconciler,
    sink: Arc<dyn EventSink>,
}

impl Mirror {
    pub fn new(config: MirrorConfig, sink: Arc<dyn EventSink>) -> Self {
        let comparator = TreeComparator::new(config.options.algorithm, sink.clone())
            .with_max_depth(config.options.max_depth);
        let reconciler = Reconciler::new(config.options, sink.clone());

        Self {
            source: config.source,
            replica: config.replica,
            interval: config.interval,
            comparator,
            reconciler,
            sink,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn replica(&self) -> &Path {
        &self.replica
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Startup check: both folders must exist and be directories
    ///
    /// A missing folder here is fatal, unlike one that vanishes later.
    pub fn check_preconditions(&self) -> Result<()> {
        match self.check_folders() {
            None => Ok(()),
            Some(StopReason::SourceMissing) => Err(SyncError::SourceNotFound {
                path: self.source.clone(),
            }),
            Some(_) => Err(SyncError::ReplicaNotFound {
                path: self.replica.clone(),
            }),
        }
    }

    /// Run one iteration: existence check, fast-path compare, reconcile
    ///
    /// A comparator error is recorded and the poll falls through to
    /// reconcile, which handles the offending entry on its own. Only a
    /// failure to list the top-level folders aborts this poll; the caller
    /// decides whether to retry.
    pub fn poll_once(&self) -> Result<PollResult> {
        if let Some(reason) = self.check_folders() {
            return Ok(PollResult::Stopped(reason));
        }

        match self.comparator.trees_equal(&self.source, &self.replica) {
            Ok(true) => {
                self.sink.record(SyncEvent::TreesMatch);
                return Ok(PollResult::UpToDate);
            }
            Ok(false) => {}
            Err(e) => {
                let name = e
                    .path()
                    .and_then(|p| p.strip_prefix(&self.source).ok())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                self.sink.record(SyncEvent::Failed {
                    name,
                    operation: Operation::Compare,
                    error: e.to_string().replace('\n', "; "),
                });
            }
        }

        let outcome = self.reconciler.reconcile(&self.source, &self.replica)?;
        self.sink.record(SyncEvent::Summary(outcome));
        Ok(PollResult::Reconciled(outcome))
    }

    /// Poll until a folder disappears or `shutdown` resolves
    ///
    /// Polls run one at a time on the blocking pool; the interval sleep is
    /// the only point where shutdown is observed. A failed poll is logged and
    /// retried after the next interval.
    pub async fn run<F>(self: Arc<Self>, shutdown: F) -> Result<StopReason>
    where
        F: Future<Output = ()>,
    {
        self.check_preconditions()?;
        tokio::pin!(shutdown);

        loop {
            let this = Arc::clone(&self);
            let result = tokio::task::spawn_blocking(move || this.poll_once())
                .await
                .map_err(|e| SyncError::Io(std::io::Error::other(e.to_string())))?;

            match result {
                Ok(PollResult::Stopped(reason)) => return Ok(reason),
                Ok(_) => {}
                Err(e) => self.sink.record(SyncEvent::PollFailed {
                    error: e.to_string().replace('\n', "; "),
                }),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping mirror");
                    return Ok(StopReason::Shutdown);
                }
            }
        }
    }

    /// Record the existence of both folders, returning which one is missing
    fn check_folders(&self) -> Option<StopReason> {
        let folders = [
            (Role::Source, &self.source, StopReason::SourceMissing),
            (Role::Replica, &self.replica, StopReason::ReplicaMissing),
        ];

        for (role, path, reason) in folders {
            if is_existing_dir(path) {
                self.sink.record(SyncEvent::FolderExists {
                    role,
                    path: path.clone(),
                });
            } else {
                self.sink.record(SyncEvent::FolderMissing {
                    role,
                    path: path.clone(),
                });
                return Some(reason);
            }
        }

        None
    }
}
