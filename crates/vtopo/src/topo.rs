//! Topology: the registry components wired to one store.

use std::sync::Arc;

use tracing::info;
use vtopo_store::{NodeStore, RedbNodeStore};

use crate::action::ActionQueue;
use crate::backoff::RetryPolicy;
use crate::config::TopoConfig;
use crate::serving::ServingGraph;
use crate::tablet::TabletRegistry;

/// All registry components sharing a single store handle.
#[derive(Clone)]
pub struct Topology {
    pub tablets: TabletRegistry,
    pub serving: ServingGraph,
    pub actions: ActionQueue,
    store: Arc<dyn NodeStore>,
}

impl Topology {
    pub fn new(store: Arc<dyn NodeStore>, retry: RetryPolicy) -> Self {
        Self {
            tablets: TabletRegistry::new(store.clone()),
            serving: ServingGraph::new(store.clone()),
            actions: ActionQueue::new(store.clone(), retry),
            store,
        }
    }

    /// Open the store described by `config` and build the components on it.
    pub fn open(config: &TopoConfig) -> anyhow::Result<Self> {
        let store = match &config.store.path {
            Some(path) => {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                RedbNodeStore::open(path)?
            }
            None => RedbNodeStore::open_in_memory()?,
        };
        info!(path = ?config.store.path, "topology store ready");
        Ok(Self::new(Arc::new(store), config.retry_policy()?))
    }

    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }
}
