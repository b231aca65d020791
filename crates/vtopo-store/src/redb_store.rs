//! RedbNodeStore: redb-backed `NodeStore`.
//!
//! Node payloads and node metadata live in two tables keyed by absolute
//! path. Every mutation runs in a single redb write transaction that checks
//! the parent, writes the node, and bumps the parent's child version, so a
//! node never exists without its parent. Watches are kept in memory and fire
//! after the transaction commits. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::NodeStore;
use crate::types::*;
use crate::watch::WatchRegistry;

/// Node payloads keyed by absolute path.
const NODE_DATA: TableDefinition<&str, &[u8]> = TableDefinition::new("node_data");

/// JSON-serialized [`Stat`] keyed by absolute path.
const NODE_STAT: TableDefinition<&str, &[u8]> = TableDefinition::new("node_stat");

const ROOT: &str = "/";

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Thread-safe node store backed by redb.
#[derive(Clone)]
pub struct RedbNodeStore {
    db: Arc<Database>,
    watches: Arc<WatchRegistry>,
}

impl RedbNodeStore {
    /// Open (or create) a persistent node store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self::with_database(db)?;
        debug!(?path, "node store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory node store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self::with_database(db)?;
        debug!("in-memory node store opened");
        Ok(store)
    }

    fn with_database(db: Database) -> StoreResult<Self> {
        let store = Self {
            db: Arc::new(db),
            watches: Arc::new(WatchRegistry::new()),
        };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Create both tables and the root node if they don't exist yet.
    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            txn.open_table(NODE_DATA).map_err(map_err!(Table))?;
            let mut stats = txn.open_table(NODE_STAT).map_err(map_err!(Table))?;
            if read_stat(&stats, ROOT)?.is_none() {
                write_stat(&mut stats, ROOT, &Stat::default())?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Deliver a session event to every pending watch, as a store would on
    /// disconnect or session loss.
    pub fn notify_session(&self, reason: &str) -> usize {
        self.watches.fire_all(WatchEvent::Session(reason.to_string()))
    }

    fn read_node(&self, path: &str) -> StoreResult<(Vec<u8>, Stat)> {
        validate_path(path)?;
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let stats = txn.open_table(NODE_STAT).map_err(map_err!(Table))?;
        let stat = read_stat(&stats, path)?.ok_or_else(|| StoreError::NoNode(path.to_string()))?;
        let data_table = txn.open_table(NODE_DATA).map_err(map_err!(Table))?;
        let data = data_table
            .get(path)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_vec())
            .unwrap_or_default();
        Ok((data, stat))
    }
}

/// Resolve the parent directory and the (possibly partial) node path for a
/// create call.
fn create_target(path: &str, mode: CreateMode) -> StoreResult<(String, String)> {
    match mode {
        CreateMode::Persistent => {
            validate_path(path)?;
            let parent = parent_path(path).ok_or_else(|| StoreError::NodeExists(path.to_string()))?;
            Ok((parent.to_string(), path.to_string()))
        }
        CreateMode::Sequential => {
            if let Some(dir) = path.strip_suffix('/') {
                validate_path(dir)?;
                Ok((dir.to_string(), path.to_string()))
            } else {
                validate_path(path)?;
                let parent = parent_path(path).ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
                Ok((parent.to_string(), path.to_string()))
            }
        }
    }
}

fn read_stat<T>(table: &T, path: &str) -> StoreResult<Option<Stat>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(path).map_err(map_err!(Read))? {
        Some(guard) => {
            let stat: Stat = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(stat))
        }
        None => Ok(None),
    }
}

fn write_stat(
    table: &mut redb::Table<'_, &'static str, &'static [u8]>,
    path: &str,
    stat: &Stat,
) -> StoreResult<()> {
    let value = serde_json::to_vec(stat).map_err(map_err!(Serialize))?;
    table
        .insert(path, value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

/// Half-open key range covering every descendant of `dir`.
fn descendant_range(dir: &str) -> (String, String) {
    let prefix = if dir == ROOT {
        ROOT.to_string()
    } else {
        format!("{dir}/")
    };
    // '0' is the byte right after '/'.
    let end = format!("{}0", &prefix[..prefix.len() - 1]);
    (prefix, end)
}

impl NodeStore for RedbNodeStore {
    fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> StoreResult<String> {
        let (parent, base) = create_target(path, mode)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let created;
        {
            let mut stats = txn.open_table(NODE_STAT).map_err(map_err!(Table))?;
            let mut parent_stat =
                read_stat(&stats, &parent)?.ok_or_else(|| StoreError::NoNode(path.to_string()))?;

            created = match mode {
                CreateMode::Persistent => base,
                CreateMode::Sequential => format!("{base}{}", sequence_suffix(parent_stat.cversion)),
            };
            if read_stat(&stats, &created)?.is_some() {
                return Err(StoreError::NodeExists(created));
            }

            parent_stat.cversion += 1;
            parent_stat.num_children += 1;
            write_stat(&mut stats, &parent, &parent_stat)?;
            write_stat(&mut stats, &created, &Stat::default())?;

            let mut data_table = txn.open_table(NODE_DATA).map_err(map_err!(Table))?;
            data_table
                .insert(created.as_str(), data)
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(path = %created, "node created");
        self.watches.fire(&created, WatchEvent::Created);
        self.watches.fire(&parent, WatchEvent::ChildrenChanged);
        Ok(created)
    }

    fn get(&self, path: &str) -> StoreResult<(Vec<u8>, Stat)> {
        self.read_node(path)
    }

    fn get_w(&self, path: &str) -> StoreResult<(Vec<u8>, Stat, Watch)> {
        // Register before reading so a change racing the read still fires.
        let watch = self.watches.register(path);
        let (data, stat) = self.read_node(path)?;
        Ok((data, stat, watch))
    }

    fn exists_w(&self, path: &str) -> StoreResult<(Option<Stat>, Watch)> {
        validate_path(path)?;
        let watch = self.watches.register(path);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let stats = txn.open_table(NODE_STAT).map_err(map_err!(Table))?;
        let stat = read_stat(&stats, path)?;
        Ok((stat, watch))
    }

    fn set(&self, path: &str, data: &[u8], expected_version: i32) -> StoreResult<Stat> {
        validate_path(path)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stat;
        {
            let mut stats = txn.open_table(NODE_STAT).map_err(map_err!(Table))?;
            let mut current =
                read_stat(&stats, path)?.ok_or_else(|| StoreError::NoNode(path.to_string()))?;
            if expected_version != ANY_VERSION && expected_version != current.version {
                return Err(StoreError::BadVersion {
                    path: path.to_string(),
                    expected: expected_version,
                    actual: current.version,
                });
            }
            current.version += 1;
            write_stat(&mut stats, path, &current)?;

            let mut data_table = txn.open_table(NODE_DATA).map_err(map_err!(Table))?;
            data_table.insert(path, data).map_err(map_err!(Write))?;
            stat = current;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%path, version = stat.version, "node updated");
        self.watches.fire(path, WatchEvent::DataChanged);
        Ok(stat)
    }

    fn children(&self, path: &str) -> StoreResult<(Vec<String>, Stat)> {
        validate_path(path)?;
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let stats = txn.open_table(NODE_STAT).map_err(map_err!(Table))?;
        let stat = read_stat(&stats, path)?.ok_or_else(|| StoreError::NoNode(path.to_string()))?;

        let (start, end) = descendant_range(path);
        let mut names = Vec::new();
        for entry in stats
            .range(start.as_str()..end.as_str())
            .map_err(map_err!(Read))?
        {
            let (key, _) = entry.map_err(map_err!(Read))?;
            let name = &key.value()[start.len()..];
            if !name.is_empty() && !name.contains('/') {
                names.push(name.to_string());
            }
        }
        Ok((names, stat))
    }

    fn delete(&self, path: &str, expected_version: i32) -> StoreResult<()> {
        validate_path(path)?;
        let parent = parent_path(path).ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut stats = txn.open_table(NODE_STAT).map_err(map_err!(Table))?;
            let current =
                read_stat(&stats, path)?.ok_or_else(|| StoreError::NoNode(path.to_string()))?;
            if expected_version != ANY_VERSION && expected_version != current.version {
                return Err(StoreError::BadVersion {
                    path: path.to_string(),
                    expected: expected_version,
                    actual: current.version,
                });
            }
            if current.num_children > 0 {
                return Err(StoreError::NotEmpty(path.to_string()));
            }
            stats.remove(path).map_err(map_err!(Write))?;

            if let Some(mut parent_stat) = read_stat(&stats, parent)? {
                parent_stat.cversion += 1;
                parent_stat.num_children = parent_stat.num_children.saturating_sub(1);
                write_stat(&mut stats, parent, &parent_stat)?;
            }

            let mut data_table = txn.open_table(NODE_DATA).map_err(map_err!(Table))?;
            data_table.remove(path).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%path, "node deleted");
        self.watches.fire(path, WatchEvent::Deleted);
        self.watches.fire(parent, WatchEvent::ChildrenChanged);
        Ok(())
    }
}
