//! Conformance test suite for [`ClusterStore`] implementations.
//!
//! Every store adapter (the in-memory one, or one wrapping a real
//! control-plane client against a test cluster) can run the same checks to
//! confirm it honours the contract the reapers rely on. Each function takes
//! a fresh, empty store.
//!
//! ```no_run
//! use credential_gc_store::{MemoryClusterStore, conformance};
//!
//! #[tokio::test]
//! async fn update_with_stale_version_conflicts() {
//!     conformance::update_with_stale_version_conflicts(&MemoryClusterStore::new()).await;
//! }
//! ```
//!
//! | Category | Contract aspect |
//! |----------|-----------------|
//! | Read | missing records read as `None`, reads carry the current version |
//! | Write | versions advance, stale versions conflict, missing records are `NotFound` |
//! | Delete | deletes remove, deleting an absent record is `NotFound` |
//! | Concurrent | of N racing updates from one read, exactly one wins |

use std::sync::Arc;

use crate::{
    assert_conflict, assert_not_found, error::StorageError, store::ClusterStore,
    types::ConfigRecord,
};

const NAMESPACE: &str = "conformance";

fn seed(name: &str) -> ConfigRecord {
    ConfigRecord::builder().namespace(NAMESPACE).name(name).build().with_entry("seed", "value")
}

/// `get` on a missing record returns `Ok(None)`.
pub async fn get_missing_returns_none<S: ClusterStore>(store: &S) {
    let result = store.get(NAMESPACE, "missing").await;
    assert!(matches!(result, Ok(None)), "missing record should read as None: {result:?}");
}

/// `create` then `get` returns the data and the assigned version.
pub async fn create_then_get_returns_record<S: ClusterStore>(store: &S) {
    let version = store.create(&seed("created")).await.expect("create should succeed");
    let record = store.get(NAMESPACE, "created").await.expect("get").expect("record exists");
    assert_eq!(record.version, version, "read must carry the version assigned on create");
    assert!(record.contains_entry("seed"));
}

/// `create` on an existing record is a conflict.
pub async fn create_existing_conflicts<S: ClusterStore>(store: &S) {
    store.create(&seed("twice")).await.expect("first create");
    let result = store.create(&seed("twice")).await;
    assert_conflict!(result);
}

/// A successful `update` assigns a strictly newer version.
pub async fn update_advances_version<S: ClusterStore>(store: &S) {
    store.create(&seed("advancing")).await.expect("create");
    let read = store.get(NAMESPACE, "advancing").await.expect("get").expect("exists");

    let new_version = store.update(&read).await.expect("update with current version");

    assert!(new_version > read.version, "{new_version} should be newer than {}", read.version);
}

/// An `update` carrying a stale version is rejected and leaves the record untouched.
pub async fn update_with_stale_version_conflicts<S: ClusterStore>(store: &S) {
    store.create(&seed("contended")).await.expect("create");
    let stale = store.get(NAMESPACE, "contended").await.expect("get").expect("exists");
    store.update(&stale.clone().with_entry("winner", "1")).await.expect("first writer wins");

    let result = store.update(&stale.with_entry("loser", "1")).await;

    assert_conflict!(result);
    let stored = store.get(NAMESPACE, "contended").await.expect("get").expect("exists");
    assert!(stored.contains_entry("winner"));
    assert!(!stored.contains_entry("loser"), "rejected write must not be applied");
}

/// An `update` of a record that does not exist is `NotFound`.
pub async fn update_missing_not_found<S: ClusterStore>(store: &S) {
    let result = store.update(&seed("never-created")).await;
    assert_not_found!(result);
}

/// `delete` removes the record.
pub async fn delete_removes_record<S: ClusterStore>(store: &S) {
    store.create(&seed("doomed")).await.expect("create");
    store.delete(NAMESPACE, "doomed").await.expect("delete");
    let result = store.get(NAMESPACE, "doomed").await.expect("get after delete");
    assert!(result.is_none(), "record should be gone after delete");
}

/// `delete` of an absent record is `NotFound`, never a different error.
pub async fn delete_missing_not_found<S: ClusterStore>(store: &S) {
    let result = store.delete(NAMESPACE, "absent").await;
    assert_not_found!(result);
}

/// Of many updates racing from the same read, exactly one succeeds and the
/// rest conflict.
pub async fn concurrent_updates_exactly_one_wins<S: ClusterStore + 'static>(store: Arc<S>) {
    const WRITERS: usize = 8;

    store.create(&seed("raced")).await.expect("create");
    let read = store.get(NAMESPACE, "raced").await.expect("get").expect("exists");

    let mut handles = Vec::with_capacity(WRITERS);
    for writer in 0..WRITERS {
        let store = Arc::clone(&store);
        let record = read.clone().with_entry(format!("writer-{writer}"), "1");
        handles.push(tokio::spawn(async move { store.update(&record).await }));
    }

    let mut wins = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.expect("writer task should not panic") {
            Ok(_) => wins += 1,
            Err(StorageError::Conflict) => conflicts += 1,
            Err(other) => panic!("unexpected error from racing update: {other:?}"),
        }
    }

    assert_eq!(wins, 1, "exactly one racing update should win");
    assert_eq!(conflicts, WRITERS - 1);
}
