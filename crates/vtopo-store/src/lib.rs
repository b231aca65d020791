//! vtopo-store: hierarchical, versioned, watch-capable node store.
//!
//! The coordination layer in `vtopo` talks to its backing store through the
//! narrow [`NodeStore`] trait: a tree of `/`-separated paths where every node
//! carries an opaque byte payload and a [`Stat`] with a version that is
//! bumped on each write.
//!
//! # Architecture
//!
//! ```text
//! NodeStore (trait)
//!   ├── create / get / get_w / exists_w / set / children / delete
//!   └── provided: create_recursive, delete_recursive, retry_change
//!
//! RedbNodeStore
//!   ├── node_data  table: path → payload
//!   ├── node_stat  table: path → JSON Stat
//!   └── WatchRegistry: single-fire oneshot watches, fired after commit
//! ```
//!
//! `RedbNodeStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across threads and async tasks.

pub mod error;
pub mod redb_store;
pub mod store;
pub mod types;
pub mod watch;

pub use error::{StoreError, StoreResult};
pub use redb_store::RedbNodeStore;
pub use store::NodeStore;
pub use types::*;
