//! The `NodeStore` trait: the narrow interface the coordination layer
//! consumes from a hierarchical consensus store.

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::types::*;

/// Hierarchical, versioned, watch-capable node store.
///
/// All calls are synchronous round trips. Implementations must be safe to
/// share between threads; the coordination layer holds them as
/// `Arc<dyn NodeStore>`.
pub trait NodeStore: Send + Sync {
    /// Create a node. With [`CreateMode::Sequential`] the store appends a
    /// counter to `path`; the returned string is the path actually created.
    fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> StoreResult<String>;

    /// Read a node's payload and metadata.
    fn get(&self, path: &str) -> StoreResult<(Vec<u8>, Stat)>;

    /// Read a node and register a watch for its next change or deletion.
    fn get_w(&self, path: &str) -> StoreResult<(Vec<u8>, Stat, Watch)>;

    /// Check for existence and register a watch. The watch fires on creation
    /// if the node is absent, or on change/deletion if it exists.
    fn exists_w(&self, path: &str) -> StoreResult<(Option<Stat>, Watch)>;

    /// Conditional write. `expected_version` of [`ANY_VERSION`] skips the check.
    fn set(&self, path: &str, data: &[u8], expected_version: i32) -> StoreResult<Stat>;

    /// Names of the direct children of `path`, in store order.
    fn children(&self, path: &str) -> StoreResult<(Vec<String>, Stat)>;

    /// Conditional delete of a childless node.
    fn delete(&self, path: &str, expected_version: i32) -> StoreResult<()>;

    /// Create `path`, creating any missing ancestors with empty payloads.
    fn create_recursive(&self, path: &str, data: &[u8], mode: CreateMode) -> StoreResult<String> {
        match self.create(path, data, mode) {
            Err(StoreError::NoNode(_)) => {
                let parent = parent_path(path.trim_end_matches('/'))
                    .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
                let parent_target = if mode == CreateMode::Sequential && path.ends_with('/') {
                    path.trim_end_matches('/')
                } else {
                    parent
                };
                match self.create_recursive(parent_target, &[], CreateMode::Persistent) {
                    Ok(_) | Err(StoreError::NodeExists(_)) => {}
                    Err(e) => return Err(e),
                }
                self.create(path, data, mode)
            }
            other => other,
        }
    }

    /// Delete `path` and its whole subtree. Only the root of the subtree is
    /// version-checked; descendants are removed unconditionally.
    fn delete_recursive(&self, path: &str, expected_version: i32) -> StoreResult<()> {
        let (children, _) = self.children(path)?;
        for child in children {
            match self.delete_recursive(&join_path(path, &child), ANY_VERSION) {
                Ok(()) | Err(StoreError::NoNode(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.delete(path, expected_version)
    }

    /// Read-modify-write loop over a single node.
    ///
    /// `update` receives the current payload and stat (`None` when the node
    /// does not exist) and returns the bytes to store or [`Change::Skip`].
    /// A lost race (`BadVersion`, or `NodeExists` while creating) re-reads
    /// and calls `update` again, indefinitely; any other error is returned.
    /// Writing bytes identical to the current payload is elided.
    fn retry_change(
        &self,
        path: &str,
        mode: CreateMode,
        update: &mut dyn FnMut(Option<(&[u8], &Stat)>) -> StoreResult<Change>,
    ) -> StoreResult<ChangeOutcome> {
        loop {
            match self.get(path) {
                Ok((current, stat)) => {
                    let data = match update(Some((&current, &stat)))? {
                        Change::Skip => return Ok(ChangeOutcome::Skipped),
                        Change::Write(data) => data,
                    };
                    if data == current {
                        return Ok(ChangeOutcome::Updated(stat));
                    }
                    match self.set(path, &data, stat.version) {
                        Ok(stat) => return Ok(ChangeOutcome::Updated(stat)),
                        Err(StoreError::BadVersion { .. }) | Err(StoreError::NoNode(_)) => {
                            debug!(%path, version = stat.version, "conditional update lost race, retrying");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(StoreError::NoNode(_)) => {
                    let data = match update(None)? {
                        Change::Skip => return Ok(ChangeOutcome::Skipped),
                        Change::Write(data) => data,
                    };
                    match self.create(path, &data, mode) {
                        Ok(created) => {
                            return match self.get(&created) {
                                Ok((_, stat)) => Ok(ChangeOutcome::Updated(stat)),
                                // Removed again before the read; the write
                                // itself landed at the initial version.
                                Err(StoreError::NoNode(_)) => Ok(ChangeOutcome::Updated(Stat::default())),
                                Err(e) => Err(e),
                            };
                        }
                        Err(StoreError::NodeExists(_)) => {
                            debug!(%path, "concurrent create, retrying");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
