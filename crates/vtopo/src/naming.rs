//! Domain identifiers and serving-graph records.
//!
//! Serving records are JSON with the field names the rest of the cluster
//! already reads (`Entries`, `Uid`, `NamedPortMap`, ...).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TopoError, TopoResult};

// ── Tablet alias ──────────────────────────────────────────────────

/// Identifies one tablet process within a cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabletAlias {
    pub cell: String,
    pub uid: u32,
}

impl TabletAlias {
    pub fn new(cell: impl Into<String>, uid: u32) -> Self {
        Self {
            cell: cell.into(),
            uid,
        }
    }

    /// The uid as it appears in store paths: 10 zero-padded digits.
    pub fn uid_str(&self) -> String {
        format_uid(self.uid)
    }
}

impl fmt::Display for TabletAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.cell, self.uid_str())
    }
}

impl FromStr for TabletAlias {
    type Err = TopoError;

    /// Parse `<cell>-<uid>`. The cell may itself contain dashes; the uid is
    /// everything after the last one.
    fn from_str(s: &str) -> TopoResult<Self> {
        let (cell, uid) = s
            .rsplit_once('-')
            .ok_or_else(|| TopoError::InvalidIdentifier(format!("tablet alias {s:?}")))?;
        if cell.is_empty() {
            return Err(TopoError::InvalidIdentifier(format!("tablet alias {s:?}")));
        }
        Ok(TabletAlias::new(cell, parse_uid(uid)?))
    }
}

pub fn format_uid(uid: u32) -> String {
    format!("{uid:010}")
}

/// Parse a decimal tablet uid as found in store child names.
pub fn parse_uid(s: &str) -> TopoResult<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TopoError::InvalidIdentifier(format!("tablet uid {s:?}")));
    }
    s.parse::<u32>()
        .map_err(|e| TopoError::InvalidIdentifier(format!("tablet uid {s:?}: {e}")))
}

// ── Tablet type ───────────────────────────────────────────────────

/// Serving role of a tablet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabletType {
    Idle,
    Master,
    Replica,
    Rdonly,
    Spare,
    Experimental,
    SchemaUpgrade,
    Backup,
    Restore,
    Lag,
    LagOrphan,
    Scrap,
}

impl TabletType {
    pub const ALL: [TabletType; 12] = [
        TabletType::Idle,
        TabletType::Master,
        TabletType::Replica,
        TabletType::Rdonly,
        TabletType::Spare,
        TabletType::Experimental,
        TabletType::SchemaUpgrade,
        TabletType::Backup,
        TabletType::Restore,
        TabletType::Lag,
        TabletType::LagOrphan,
        TabletType::Scrap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TabletType::Idle => "idle",
            TabletType::Master => "master",
            TabletType::Replica => "replica",
            TabletType::Rdonly => "rdonly",
            TabletType::Spare => "spare",
            TabletType::Experimental => "experimental",
            TabletType::SchemaUpgrade => "schema_upgrade",
            TabletType::Backup => "backup",
            TabletType::Restore => "restore",
            TabletType::Lag => "lag",
            TabletType::LagOrphan => "lag_orphan",
            TabletType::Scrap => "scrap",
        }
    }
}

impl fmt::Display for TabletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TabletType {
    type Err = TopoError;

    fn from_str(s: &str) -> TopoResult<Self> {
        TabletType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TopoError::InvalidIdentifier(format!("tablet type {s:?}")))
    }
}

// ── Serving graph records ─────────────────────────────────────────

/// One serving tablet's address. `uid` is the merge key within a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VtnsAddr {
    pub uid: u32,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub named_port_map: BTreeMap<String, u16>,
}

impl VtnsAddr {
    pub fn new(uid: u32, host: impl Into<String>, port: u16) -> Self {
        Self {
            uid,
            host: host.into(),
            port,
            named_port_map: BTreeMap::new(),
        }
    }

    pub fn with_named_port(mut self, name: impl Into<String>, port: u16) -> Self {
        self.named_port_map.insert(name.into(), port);
        self
    }
}

/// Endpoint list for one (cell, keyspace, shard, tablet type).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VtnsAddrs {
    #[serde(default)]
    pub entries: Vec<VtnsAddr>,
}

impl VtnsAddrs {
    pub fn new(entries: Vec<VtnsAddr>) -> Self {
        Self { entries }
    }

    /// Insert `addr`, replacing the entry with the same uid in place or
    /// appending if there is none. Returns whether the list changed.
    pub fn upsert(&mut self, addr: &VtnsAddr) -> bool {
        match self.entries.iter_mut().find(|e| e.uid == addr.uid) {
            Some(existing) if existing == addr => false,
            Some(existing) => {
                *existing = addr.clone();
                true
            }
            None => {
                self.entries.push(addr.clone());
                true
            }
        }
    }

    pub fn find(&self, uid: u32) -> Option<&VtnsAddr> {
        self.entries.iter().find(|e| e.uid == uid)
    }
}

/// Half-open key range served by a shard, hex-encoded. Empty bounds are
/// unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyRange {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

/// Per-shard serving metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SrvShard {
    #[serde(default)]
    pub key_range: KeyRange,
    #[serde(default)]
    pub served_types: Vec<TabletType>,
    #[serde(default)]
    pub tablet_types: Vec<TabletType>,
}

/// Per-keyspace serving metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SrvKeyspace {
    #[serde(default)]
    pub shards: Vec<SrvShard>,
    #[serde(default)]
    pub tablet_types: Vec<TabletType>,
}

/// A record together with the store version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i32,
}
