//! Store path layout for tablets, the serving graph, and tablet actions.
//!
//! ```text
//! /zk/<cell>/vt/tablets/<uid>               tablet record
//! /zk/<cell>/vt/tablets/<uid>/action/<seq>  queued action
//! /zk/<cell>/vt/tablets/<uid>/actionlog/<seq> completed action
//! /zk/<cell>/vt/ns/<keyspace>               SrvKeyspace
//! /zk/<cell>/vt/ns/<keyspace>/<shard>       SrvShard
//! /zk/<cell>/vt/ns/<keyspace>/<shard>/<type> VtnsAddrs
//! ```

use crate::error::{TopoError, TopoResult};
use crate::naming::{TabletAlias, TabletType};

pub const ACTION: &str = "action";
pub const ACTION_LOG: &str = "actionlog";

/// Reject names that would change the shape of a path.
fn component<'a>(kind: &str, name: &'a str) -> TopoResult<&'a str> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(TopoError::InvalidIdentifier(format!("{kind} {name:?}")));
    }
    Ok(name)
}

pub fn tablet_dir(cell: &str) -> TopoResult<String> {
    Ok(format!("/zk/{}/vt/tablets", component("cell", cell)?))
}

pub fn tablet(alias: &TabletAlias) -> TopoResult<String> {
    Ok(format!("{}/{}", tablet_dir(&alias.cell)?, alias.uid_str()))
}

pub fn tablet_action_root(alias: &TabletAlias) -> TopoResult<String> {
    Ok(format!("{}/{ACTION}", tablet(alias)?))
}

pub fn tablet_action_log_root(alias: &TabletAlias) -> TopoResult<String> {
    Ok(format!("{}/{ACTION_LOG}", tablet(alias)?))
}

pub fn vt_keyspace(cell: &str, keyspace: &str) -> TopoResult<String> {
    Ok(format!(
        "/zk/{}/vt/ns/{}",
        component("cell", cell)?,
        component("keyspace", keyspace)?
    ))
}

pub fn vt_shard(cell: &str, keyspace: &str, shard: &str) -> TopoResult<String> {
    Ok(format!(
        "{}/{}",
        vt_keyspace(cell, keyspace)?,
        component("shard", shard)?
    ))
}

pub fn vt_serving_type(
    cell: &str,
    keyspace: &str,
    shard: &str,
    tablet_type: TabletType,
) -> TopoResult<String> {
    Ok(format!("{}/{}", vt_shard(cell, keyspace, shard)?, tablet_type))
}

/// Completion record path for an action: the same sequence name under the
/// tablet's `actionlog` root.
pub fn action_log_path(action_path: &str) -> TopoResult<String> {
    let marker = format!("/{ACTION}/");
    let Some(idx) = action_path.find(&marker) else {
        return Err(TopoError::InvalidIdentifier(format!(
            "action path {action_path:?}"
        )));
    };
    let name = &action_path[idx + marker.len()..];
    if name.is_empty() || name.contains('/') {
        return Err(TopoError::InvalidIdentifier(format!(
            "action path {action_path:?}"
        )));
    }
    let log_path = format!("{}/{ACTION_LOG}/{name}", &action_path[..idx]);
    vtopo_store::validate_path(&log_path)
        .map_err(|_| TopoError::InvalidIdentifier(format!("action path {action_path:?}")))?;
    Ok(log_path)
}
