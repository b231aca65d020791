//! Shared fixtures for vtopo integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vtopo::{RetryPolicy, Topology};
use vtopo_store::{CreateMode, NodeStore, RedbNodeStore, Stat, StoreError, StoreResult, Watch};

/// In-memory store that injects failures on demand.
pub struct FlakyStore {
    pub inner: RedbNodeStore,
    /// Number of upcoming `exists_w` calls that fail as unavailable.
    pub exists_failures: AtomicUsize,
    /// Total `exists_w` calls seen.
    pub exists_calls: AtomicUsize,
    /// Paths whose `delete` always fails.
    pub failing_deletes: Mutex<HashSet<String>>,
    /// Paths whose `create` always fails.
    pub failing_creates: Mutex<HashSet<String>>,
    /// Every `delete` attempt, in order.
    pub delete_attempts: Mutex<Vec<String>>,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: RedbNodeStore::open_in_memory().unwrap(),
            exists_failures: AtomicUsize::new(0),
            exists_calls: AtomicUsize::new(0),
            failing_deletes: Mutex::new(HashSet::new()),
            failing_creates: Mutex::new(HashSet::new()),
            delete_attempts: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_next_exists(&self, n: usize) {
        self.exists_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_delete_of(&self, path: &str) {
        self.failing_deletes.lock().unwrap().insert(path.to_string());
    }

    pub fn fail_create_of(&self, path: &str) {
        self.failing_creates.lock().unwrap().insert(path.to_string());
    }
}

impl NodeStore for FlakyStore {
    fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> StoreResult<String> {
        if self.failing_creates.lock().unwrap().contains(path) {
            return Err(StoreError::Unavailable(format!("injected create failure: {path}")));
        }
        self.inner.create(path, data, mode)
    }

    fn get(&self, path: &str) -> StoreResult<(Vec<u8>, Stat)> {
        self.inner.get(path)
    }

    fn get_w(&self, path: &str) -> StoreResult<(Vec<u8>, Stat, Watch)> {
        self.inner.get_w(path)
    }

    fn exists_w(&self, path: &str) -> StoreResult<(Option<Stat>, Watch)> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.exists_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.exists_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("injected connection loss".to_string()));
        }
        self.inner.exists_w(path)
    }

    fn set(&self, path: &str, data: &[u8], expected_version: i32) -> StoreResult<Stat> {
        self.inner.set(path, data, expected_version)
    }

    fn children(&self, path: &str) -> StoreResult<(Vec<String>, Stat)> {
        self.inner.children(path)
    }

    fn delete(&self, path: &str, expected_version: i32) -> StoreResult<()> {
        self.delete_attempts.lock().unwrap().push(path.to_string());
        if self.failing_deletes.lock().unwrap().contains(path) {
            return Err(StoreError::Unavailable(format!("injected delete failure: {path}")));
        }
        self.inner.delete(path, expected_version)
    }
}

/// Retry policy short enough for tests.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(20), Duration::from_millis(20))
}

pub fn memory_topology() -> (Topology, Arc<RedbNodeStore>) {
    let store = Arc::new(RedbNodeStore::open_in_memory().unwrap());
    (Topology::new(store.clone(), fast_retry()), store)
}

pub fn flaky_topology() -> (Topology, Arc<FlakyStore>) {
    let store = FlakyStore::new();
    (Topology::new(store.clone(), fast_retry()), store)
}
