use mirror::{
    DirectoryPolicy, FingerprintAlgorithm, MemorySink, ReconcileOptions, Reconciler, SyncOutcome,
    TreeComparator,
};
use proptest::prelude::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Entries are (path, content); `None` content means a directory.
/// A small name pool makes collisions and kind clashes between trees likely.
fn tree_strategy() -> impl Strategy<Value = Vec<(Vec<String>, Option<String>)>> {
    let name = prop::sample::select(vec!["a", "b", "c", "d"]).prop_map(String::from);
    let path = prop::collection::vec(name, 1..4);
    let content = prop::option::of("[a-z]{0,8}");
    prop::collection::vec((path, content), 0..12)
}

/// Materialize entries, skipping any that clash with what already exists
fn build(root: &Path, entries: &[(Vec<String>, Option<String>)]) {
    for (components, content) in entries {
        let mut path = root.to_path_buf();
        let mut blocked = false;
        for (i, component) in components.iter().enumerate() {
            path.push(component);
            let last = i + 1 == components.len();
            if !last || content.is_none() {
                if path.is_file() {
                    blocked = true;
                    break;
                }
                if !path.exists() {
                    fs::create_dir(&path).unwrap();
                }
            }
        }
        if blocked {
            continue;
        }
        if let Some(content) = content {
            if !path.exists() {
                fs::write(&path, content).unwrap();
            }
        }
    }
}

fn options(policy: DirectoryPolicy) -> ReconcileOptions {
    ReconcileOptions {
        policy,
        ..ReconcileOptions::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn reconcile_converges_and_is_idempotent(
        source_entries in tree_strategy(),
        replica_entries in tree_strategy(),
        merge in any::<bool>(),
    ) {
        let source = TempDir::new().unwrap();
        let replica = TempDir::new().unwrap();
        build(source.path(), &source_entries);
        build(replica.path(), &replica_entries);

        let policy = if merge { DirectoryPolicy::Merge } else { DirectoryPolicy::Replace };
        let sink = Arc::new(MemorySink::new());
        let reconciler = Reconciler::new(options(policy), sink.clone());
        let comparator = TreeComparator::new(FingerprintAlgorithm::Blake3, sink);

        let first = reconciler.reconcile(source.path(), replica.path()).unwrap();
        prop_assert_eq!(first.failed, 0);
        prop_assert!(comparator.trees_equal(source.path(), replica.path()).unwrap());
        prop_assert!(comparator.trees_equal(replica.path(), source.path()).unwrap());

        let top_level = fs::read_dir(source.path()).unwrap().count();
        let second = reconciler.reconcile(source.path(), replica.path()).unwrap();
        prop_assert_eq!(second, SyncOutcome { unchanged: top_level, updated: 0, deleted: 0, failed: 0 });
    }
}
