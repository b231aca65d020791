//! Tablet registry: per-tablet records and their action roots.

use std::sync::Arc;

use tracing::{debug, info};
use vtopo_store::{ANY_VERSION, CreateMode, NodeStore, StoreError};

use crate::error::{AtPath, TopoError, TopoResult};
use crate::naming::{TabletAlias, Versioned, parse_uid};
use crate::paths;

/// CRUD over tablet records stored at `/zk/<cell>/vt/tablets/<uid>`.
#[derive(Clone)]
pub struct TabletRegistry {
    store: Arc<dyn NodeStore>,
}

impl TabletRegistry {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    /// Register a tablet and create its `action` and `actionlog` roots.
    ///
    /// The three creates are separate store calls. If a child root fails,
    /// the tablet node stays behind without it; [`validate_tablet`] reports
    /// such a tablet as inconsistent.
    ///
    /// [`validate_tablet`]: TabletRegistry::validate_tablet
    pub fn create_tablet(&self, alias: &TabletAlias, payload: &[u8]) -> TopoResult<()> {
        let tablet_path = paths::tablet(alias)?;
        self.store
            .create_recursive(&tablet_path, payload, CreateMode::Persistent)
            .at(&tablet_path)?;

        for root in [paths::tablet_action_root(alias)?, paths::tablet_action_log_root(alias)?] {
            self.store
                .create(&root, &[], CreateMode::Persistent)
                .at(&root)?;
        }

        info!(%alias, "tablet created");
        Ok(())
    }

    /// Conditional write. Returns the new version.
    pub fn update_tablet(
        &self,
        alias: &TabletAlias,
        payload: &[u8],
        expected_version: i32,
    ) -> TopoResult<i32> {
        let path = paths::tablet(alias)?;
        let stat = self.store.set(&path, payload, expected_version).at(&path)?;
        debug!(%alias, version = stat.version, "tablet updated");
        Ok(stat.version)
    }

    /// Remove the tablet and everything under it, regardless of version.
    pub fn delete_tablet(&self, alias: &TabletAlias) -> TopoResult<()> {
        let path = paths::tablet(alias)?;
        self.store.delete_recursive(&path, ANY_VERSION).at(&path)?;
        info!(%alias, "tablet deleted");
        Ok(())
    }

    /// Check that the tablet exists and both action roots are present.
    pub fn validate_tablet(&self, alias: &TabletAlias) -> TopoResult<()> {
        let path = paths::tablet(alias)?;
        self.store.get(&path).at(&path)?;

        for root in [paths::tablet_action_root(alias)?, paths::tablet_action_log_root(alias)?] {
            match self.store.get(&root) {
                Ok(_) => {}
                Err(StoreError::NoNode(_)) => {
                    return Err(TopoError::InconsistentTablet {
                        alias: alias.to_string(),
                        missing: root,
                    });
                }
                Err(e) => return Err(TopoError::from_store(&root, e)),
            }
        }
        Ok(())
    }

    pub fn get_tablet(&self, alias: &TabletAlias) -> TopoResult<Versioned<Vec<u8>>> {
        let path = paths::tablet(alias)?;
        let (value, stat) = self.store.get(&path).at(&path)?;
        Ok(Versioned {
            value,
            version: stat.version,
        })
    }

    /// All tablets registered in `cell`, ordered by uid string.
    pub fn get_tablets_by_cell(&self, cell: &str) -> TopoResult<Vec<TabletAlias>> {
        let dir = paths::tablet_dir(cell)?;
        let (mut children, _) = self.store.children(&dir).at(&dir)?;
        children.sort();
        children
            .iter()
            .map(|child| Ok(TabletAlias::new(cell, parse_uid(child)?)))
            .collect()
    }
}
