use super::reconcile::SyncOutcome;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

/// Which side of the mirror a folder event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Source,
    Replica,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Replica => write!(f, "replica"),
        }
    }
}

/// Filesystem operation that failed on an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Fingerprint,
    Compare,
    Copy,
    Remove,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::List => "list",
            Self::Fingerprint => "fingerprint",
            Self::Compare => "compare",
            Self::Copy => "copy",
            Self::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// Why the comparator decided two trees differ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchReason {
    EntryCount { left: usize, right: usize },
    Missing,
    KindChanged,
    ContentChanged,
}

/// Something notable that happened during a poll
///
/// Entry names are relative to the replica (or source) root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    FolderExists { role: Role, path: PathBuf },
    FolderMissing { role: Role, path: PathBuf },
    TreesMatch,
    Mismatch { path: PathBuf, reason: MismatchReason },
    UpToDate { name: PathBuf },
    Updated { name: PathBuf },
    Copied { name: PathBuf },
    Deleted { name: PathBuf },
    Failed {
        name: PathBuf,
        operation: Operation,
        error: String,
    },
    Summary(SyncOutcome),
    PollFailed { error: String },
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FolderExists { role, path } => {
                write!(f, "{} folder exists: {}", role, path.display())
            }
            Self::FolderMissing { role, path } => {
                write!(f, "{} folder does not exist: {}", role, path.display())
            }
            Self::TreesMatch => write!(f, "file is up to date"),
            Self::Mismatch { path, reason } => match reason {
                MismatchReason::EntryCount { left, right } => write!(
                    f,
                    "{} differs: {} entries vs {}",
                    path.display(),
                    left,
                    right
                ),
                MismatchReason::Missing => write!(f, "{} is missing from replica", path.display()),
                MismatchReason::KindChanged => write!(f, "{} changed kind", path.display()),
                MismatchReason::ContentChanged => write!(f, "{} content differs", path.display()),
            },
            Self::UpToDate { name } => write!(f, "{} is up to date", name.display()),
            Self::Updated { name } => write!(f, "{} is updated", name.display()),
            Self::Copied { name } => write!(f, "{} is copied", name.display()),
            Self::Deleted { name } => write!(f, "{} is deleted", name.display()),
            Self::Failed {
                name,
                operation,
                error,
            } => write!(f, "{} failed to {}: {}", name.display(), operation, error),
            Self::Summary(outcome) => write!(f, "{}", outcome),
            Self::PollFailed { error } => write!(f, "sync aborted, retrying next poll: {}", error),
        }
    }
}

/// Destination for sync events
///
/// Handed to the comparator, reconciler and poll loop instead of relying on
/// a global logger.
pub trait EventSink: Send + Sync {
    fn record(&self, event: SyncEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: SyncEvent) {
        match &event {
            SyncEvent::Failed { .. } | SyncEvent::PollFailed { .. } => {
                tracing::warn!("{}", event)
            }
            SyncEvent::Mismatch { .. } => tracing::debug!("{}", event),
            _ => tracing::info!("{}", event),
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SyncEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Rendered log lines, in recording order
    pub fn messages(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: SyncEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
