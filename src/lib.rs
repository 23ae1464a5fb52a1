pub mod config;
pub mod error;
pub mod fingerprint;
pub mod fs_util;
pub mod sync;

pub use error::{Result, SyncError};
pub use fingerprint::FingerprintAlgorithm;
pub use sync::compare::TreeComparator;
pub use sync::output::{EventSink, MemorySink, SyncEvent, TracingSink};
pub use sync::reconcile::{DirectoryPolicy, ReconcileOptions, Reconciler, SyncOutcome};
pub use sync::{Mirror, MirrorConfig, PollResult, StopReason};
