//! vtopo: topology registry for a sharded database cluster.
//!
//! Turns a hierarchical, versioned, watch-capable [`NodeStore`] into the
//! cluster's metadata registry: tablet registration, the serving graph that
//! routing layers read, and a remote-action queue used to command tablets
//! and wait for their completion.
//!
//! # Architecture
//!
//! ```text
//! Topology
//!   ├── TabletRegistry   /zk/<cell>/vt/tablets/<uid>{,/action,/actionlog}
//!   ├── ServingGraph     /zk/<cell>/vt/ns/<keyspace>/<shard>/<tablet_type>
//!   │   └── update_tablet_endpoint → read / merge / conditional write, retried
//!   └── ActionQueue
//!       ├── write_tablet_action   → sequential node under .../action/
//!       ├── wait_for_tablet_action → exists-watch on .../actionlog/<seq>
//!       └── purge_tablet_actions  → predicate-driven action log cleanup
//! ```
//!
//! Every component holds the store as an injected `Arc<dyn NodeStore>`;
//! store errors are normalized into [`TopoError`] at each operation boundary.
//!
//! [`NodeStore`]: vtopo_store::NodeStore

pub mod action;
pub mod backoff;
pub mod config;
pub mod error;
pub mod naming;
pub mod paths;
pub mod serving;
pub mod tablet;
pub mod topo;

pub use action::ActionQueue;
pub use backoff::RetryPolicy;
pub use config::TopoConfig;
pub use error::{TopoError, TopoResult};
pub use naming::*;
pub use serving::{EndpointUpdate, ServingGraph};
pub use tablet::TabletRegistry;
pub use topo::Topology;
