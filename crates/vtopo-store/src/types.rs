//! Node metadata, watch events, and path helpers shared by store
//! implementations.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::{StoreError, StoreResult};

/// Version value that disables the version check on `set` and `delete`.
pub const ANY_VERSION: i32 = -1;

/// Width of the counter appended to sequential node names.
pub const SEQUENCE_WIDTH: usize = 10;

// ── Stat ──────────────────────────────────────────────────────────

/// Per-node metadata maintained by the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// Data version. Starts at 0 on creation, incremented by every `set`.
    pub version: i32,
    /// Child version. Incremented on every child create or delete; also the
    /// counter used to name sequential children.
    pub cversion: i32,
    /// Number of direct children.
    pub num_children: u32,
}

// ── Create mode ───────────────────────────────────────────────────

/// How `create` names the new node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateMode {
    /// Create exactly the given path.
    #[default]
    Persistent,
    /// Append a zero-padded, strictly increasing counter to the given path.
    /// A path ending in `/` yields a child of that directory.
    Sequential,
}

// ── Watches ───────────────────────────────────────────────────────

/// Event delivered to a single-fire watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created,
    Deleted,
    DataChanged,
    ChildrenChanged,
    /// Session-level notification (disconnect, reconnect, store closed).
    Session(String),
}

/// Single-fire watch handle. Resolves once with the next event on the
/// watched path; an `Err` means the store dropped the watch.
pub type Watch = oneshot::Receiver<WatchEvent>;

// ── Conditional update ────────────────────────────────────────────

/// Decision returned by a `retry_change` update function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Write these bytes (create the node if it was absent).
    Write(Vec<u8>),
    /// Leave the node alone.
    Skip,
}

/// Outcome of a successful `retry_change`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The node now holds the requested bytes.
    Updated(Stat),
    /// The update function asked to skip; nothing was written.
    Skipped,
}

// ── Paths ─────────────────────────────────────────────────────────

/// Validate an absolute node path: leading `/`, no trailing `/` (except the
/// root itself), no empty segments.
pub fn validate_path(path: &str) -> StoreResult<()> {
    if path == "/" {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') || path.contains("//") {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Parent of an absolute path. The parent of a top-level node is `/`.
pub fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(i) => Some(&path[..i]),
        None => None,
    }
}

/// Join a directory path and a child name.
pub fn join_path(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Format a sequential counter the way sequential node names carry it.
pub fn sequence_suffix(counter: i32) -> String {
    format!("{counter:0width$}", width = SEQUENCE_WIDTH)
}
