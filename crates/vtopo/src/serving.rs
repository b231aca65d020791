//! Serving graph: where each keyspace/shard/tablet type is served from.
//!
//! `SrvKeyspace`, `SrvShard` and whole endpoint lists are owned by a single
//! rebuild process and replaced wholesale. Individual tablets refresh their
//! own entry with [`ServingGraph::update_tablet_endpoint`], which merges into
//! the shared list under the store's conditional write.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use vtopo_store::{ANY_VERSION, Change, ChangeOutcome, CreateMode, NodeStore, StoreError};

use crate::error::{AtPath, TopoError, TopoResult};
use crate::naming::{SrvKeyspace, SrvShard, TabletType, Versioned, VtnsAddr, VtnsAddrs};
use crate::paths;

/// Result of publishing a single tablet endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointUpdate {
    /// The endpoint list now contains the endpoint.
    Updated,
    /// No endpoint list exists yet for this type; nothing was written.
    Skipped,
}

#[derive(Clone)]
pub struct ServingGraph {
    store: Arc<dyn NodeStore>,
}

fn encode<T: Serialize>(path: &str, value: &T) -> TopoResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| TopoError::Codec {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(path: &str, data: &[u8]) -> TopoResult<T> {
    serde_json::from_slice(data).map_err(|e| TopoError::Codec {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Merge `addr` into a serialized endpoint list, keyed by uid. Existing
/// entries keep their position; a new uid is appended. An empty payload is
/// treated as an empty list.
pub fn merge_endpoint(current: &[u8], addr: &VtnsAddr) -> serde_json::Result<Vec<u8>> {
    let mut addrs: VtnsAddrs = if current.is_empty() {
        VtnsAddrs::default()
    } else {
        serde_json::from_slice(current)?
    };
    addrs.upsert(addr);
    serde_json::to_vec(&addrs)
}

impl ServingGraph {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    fn read<T: DeserializeOwned>(&self, path: &str) -> TopoResult<Versioned<T>> {
        let (data, stat) = self.store.get(path).at(path)?;
        Ok(Versioned {
            value: decode(path, &data)?,
            version: stat.version,
        })
    }

    // ── Keyspace / shard ───────────────────────────────────────────

    pub fn update_srv_keyspace(
        &self,
        cell: &str,
        keyspace: &str,
        srv_keyspace: &SrvKeyspace,
    ) -> TopoResult<()> {
        let path = paths::vt_keyspace(cell, keyspace)?;
        let data = encode(&path, srv_keyspace)?;
        self.store.set(&path, &data, ANY_VERSION).at(&path)?;
        debug!(%path, "srv keyspace replaced");
        Ok(())
    }

    pub fn get_srv_keyspace(&self, cell: &str, keyspace: &str) -> TopoResult<Versioned<SrvKeyspace>> {
        self.read(&paths::vt_keyspace(cell, keyspace)?)
    }

    pub fn update_srv_shard(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        srv_shard: &SrvShard,
    ) -> TopoResult<()> {
        let path = paths::vt_shard(cell, keyspace, shard)?;
        let data = encode(&path, srv_shard)?;
        self.store.set(&path, &data, ANY_VERSION).at(&path)?;
        debug!(%path, "srv shard replaced");
        Ok(())
    }

    pub fn get_srv_shard(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
    ) -> TopoResult<Versioned<SrvShard>> {
        self.read(&paths::vt_shard(cell, keyspace, shard)?)
    }

    /// Tablet types with a published endpoint list under the shard.
    pub fn get_srv_tablet_types_per_shard(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
    ) -> TopoResult<Vec<TabletType>> {
        let path = paths::vt_shard(cell, keyspace, shard)?;
        let (children, _) = self.store.children(&path).at(&path)?;
        children.iter().map(|c| c.parse()).collect()
    }

    // ── Endpoint lists ─────────────────────────────────────────────

    /// Replace the endpoint list for a tablet type, creating it (and its
    /// ancestors) if needed.
    pub fn update_srv_tablet_type(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
        addrs: &VtnsAddrs,
    ) -> TopoResult<()> {
        let path = paths::vt_serving_type(cell, keyspace, shard, tablet_type)?;
        let data = encode(&path, addrs)?;
        match self
            .store
            .create_recursive(&path, &data, CreateMode::Persistent)
        {
            Ok(_) => {}
            Err(StoreError::NodeExists(_)) => {
                // Multiple writers shouldn't be here; the rebuild is
                // idempotent, so stomp over whatever is there.
                self.store
                    .retry_change(&path, CreateMode::Persistent, &mut |_| {
                        Ok(Change::Write(data.clone()))
                    })
                    .at(&path)?;
            }
            Err(e) => return Err(TopoError::from_store(&path, e)),
        }
        info!(%path, entries = addrs.entries.len(), "srv tablet type replaced");
        Ok(())
    }

    pub fn get_srv_tablet_type(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
    ) -> TopoResult<Versioned<VtnsAddrs>> {
        self.read(&paths::vt_serving_type(cell, keyspace, shard, tablet_type)?)
    }

    pub fn delete_srv_tablet_type(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
    ) -> TopoResult<()> {
        let path = paths::vt_serving_type(cell, keyspace, shard, tablet_type)?;
        self.store.delete(&path, ANY_VERSION).at(&path)?;
        info!(%path, "srv tablet type deleted");
        Ok(())
    }

    /// Publish one tablet's endpoint into the shared list without touching
    /// other tablets' entries.
    ///
    /// If the list does not exist the tablet has not been placed in the
    /// serving graph yet, so nothing is written and the next rebuild picks
    /// the tablet up. Lost races against other writers are retried until the
    /// write lands or a different error occurs.
    pub fn update_tablet_endpoint(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
        addr: &VtnsAddr,
    ) -> TopoResult<EndpointUpdate> {
        let path = paths::vt_serving_type(cell, keyspace, shard, tablet_type)?;
        let mut codec_error = None;
        let result = self
            .store
            .retry_change(&path, CreateMode::Persistent, &mut |current| {
                let Some((data, _)) = current else {
                    return Ok(Change::Skip);
                };
                merge_endpoint(data, addr).map(Change::Write).map_err(|e| {
                    let reason = e.to_string();
                    codec_error = Some(reason.clone());
                    StoreError::Deserialize(reason)
                })
            });
        let outcome = match (result, codec_error) {
            (Err(_), Some(reason)) => return Err(TopoError::Codec { path, reason }),
            (result, _) => result.at(&path)?,
        };

        match outcome {
            ChangeOutcome::Updated(stat) => {
                debug!(%path, uid = addr.uid, version = stat.version, "tablet endpoint published");
                Ok(EndpointUpdate::Updated)
            }
            ChangeOutcome::Skipped => {
                debug!(%path, uid = addr.uid, "no serving graph entry yet, endpoint not published");
                Ok(EndpointUpdate::Skipped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::KeyRange;
    use vtopo_store::RedbNodeStore;

    fn graph() -> ServingGraph {
        ServingGraph::new(Arc::new(RedbNodeStore::open_in_memory().unwrap()))
    }

    #[test]
    fn merge_into_empty_payload() {
        let merged = merge_endpoint(b"", &VtnsAddr::new(1, "a", 1)).unwrap();
        let addrs: VtnsAddrs = serde_json::from_slice(&merged).unwrap();
        assert_eq!(addrs.entries.len(), 1);
    }

    #[test]
    fn merge_rejects_garbage() {
        assert!(merge_endpoint(b"not json", &VtnsAddr::new(1, "a", 1)).is_err());
    }

    #[test]
    fn update_srv_tablet_type_creates_then_replaces() {
        let graph = graph();
        let first = VtnsAddrs::new(vec![VtnsAddr::new(1, "a", 1)]);
        let second = VtnsAddrs::new(vec![VtnsAddr::new(2, "b", 2)]);

        graph
            .update_srv_tablet_type("nyc", "user", "0", TabletType::Replica, &first)
            .unwrap();
        graph
            .update_srv_tablet_type("nyc", "user", "0", TabletType::Replica, &second)
            .unwrap();

        let read = graph
            .get_srv_tablet_type("nyc", "user", "0", TabletType::Replica)
            .unwrap();
        assert_eq!(read.value, second);
        assert_eq!(read.version, 1);
    }

    #[test]
    fn endpoint_update_skips_missing_list() {
        let graph = graph();
        let outcome = graph
            .update_tablet_endpoint("nyc", "user", "0", TabletType::Master, &VtnsAddr::new(1, "a", 1))
            .unwrap();
        assert_eq!(outcome, EndpointUpdate::Skipped);
        assert!(graph
            .get_srv_tablet_type("nyc", "user", "0", TabletType::Master)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn endpoint_update_replaces_and_appends() {
        let graph = graph();
        let initial = VtnsAddrs::new(vec![VtnsAddr::new(1, "a", 1), VtnsAddr::new(2, "b", 2)]);
        graph
            .update_srv_tablet_type("nyc", "user", "0", TabletType::Replica, &initial)
            .unwrap();

        graph
            .update_tablet_endpoint("nyc", "user", "0", TabletType::Replica, &VtnsAddr::new(1, "a-moved", 9))
            .unwrap();
        graph
            .update_tablet_endpoint("nyc", "user", "0", TabletType::Replica, &VtnsAddr::new(3, "c", 3))
            .unwrap();

        let read = graph
            .get_srv_tablet_type("nyc", "user", "0", TabletType::Replica)
            .unwrap()
            .value;
        let hosts: Vec<&str> = read.entries.iter().map(|e| e.host.as_str()).collect();
        assert_eq!(hosts, vec!["a-moved", "b", "c"]);
    }

    #[test]
    fn identical_endpoint_does_not_bump_version() {
        let graph = graph();
        let addr = VtnsAddr::new(1, "a", 1);
        graph
            .update_srv_tablet_type("nyc", "user", "0", TabletType::Replica, &VtnsAddrs::new(vec![addr.clone()]))
            .unwrap();

        let outcome = graph
            .update_tablet_endpoint("nyc", "user", "0", TabletType::Replica, &addr)
            .unwrap();
        assert_eq!(outcome, EndpointUpdate::Updated);
        let read = graph
            .get_srv_tablet_type("nyc", "user", "0", TabletType::Replica)
            .unwrap();
        assert_eq!(read.version, 0);
    }

    #[test]
    fn corrupt_list_surfaces_error() {
        let store = Arc::new(RedbNodeStore::open_in_memory().unwrap());
        store
            .create_recursive("/zk/nyc/vt/ns/user/0/replica", b"{{", CreateMode::Persistent)
            .unwrap();
        let graph = ServingGraph::new(store);

        match graph.update_tablet_endpoint("nyc", "user", "0", TabletType::Replica, &VtnsAddr::new(1, "a", 1)) {
            Err(TopoError::Codec { path, .. }) => assert_eq!(path, "/zk/nyc/vt/ns/user/0/replica"),
            other => panic!("expected Codec, got {other:?}"),
        }
        assert!(matches!(
            graph.get_srv_tablet_type("nyc", "user", "0", TabletType::Replica),
            Err(TopoError::Codec { .. })
        ));
    }

    #[test]
    fn shard_and_keyspace_records() {
        let graph = graph();
        // The rebuild creates the shard path as a side effect of publishing
        // its first endpoint list.
        graph
            .update_srv_tablet_type("nyc", "user", "-80", TabletType::Master, &VtnsAddrs::default())
            .unwrap();
        graph
            .update_srv_tablet_type("nyc", "user", "-80", TabletType::Replica, &VtnsAddrs::default())
            .unwrap();

        let shard = SrvShard {
            key_range: KeyRange {
                start: String::new(),
                end: "80".to_string(),
            },
            served_types: vec![TabletType::Master, TabletType::Replica],
            tablet_types: vec![TabletType::Master, TabletType::Replica],
        };
        graph.update_srv_shard("nyc", "user", "-80", &shard).unwrap();
        assert_eq!(graph.get_srv_shard("nyc", "user", "-80").unwrap().value, shard);

        let keyspace = SrvKeyspace {
            shards: vec![shard],
            tablet_types: vec![TabletType::Master],
        };
        graph.update_srv_keyspace("nyc", "user", &keyspace).unwrap();
        assert_eq!(graph.get_srv_keyspace("nyc", "user").unwrap().value, keyspace);

        assert_eq!(
            graph.get_srv_tablet_types_per_shard("nyc", "user", "-80").unwrap(),
            vec![TabletType::Master, TabletType::Replica]
        );
    }

    #[test]
    fn missing_records_are_not_found() {
        let graph = graph();
        assert!(graph.get_srv_keyspace("nyc", "user").unwrap_err().is_not_found());
        assert!(graph.get_srv_shard("nyc", "user", "0").unwrap_err().is_not_found());
        assert!(graph
            .get_srv_tablet_types_per_shard("nyc", "user", "0")
            .unwrap_err()
            .is_not_found());
        assert!(graph
            .update_srv_keyspace("nyc", "user", &SrvKeyspace::default())
            .unwrap_err()
            .is_not_found());
    }
}
