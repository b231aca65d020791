//! Tablet registry behavior against the embedded store, including the
//! partially-initialized tablet window.

mod common;

use common::{flaky_topology, memory_topology};
use vtopo::{TabletAlias, TopoError};

#[test]
fn created_tablet_round_trips_and_updates() {
    let (topo, _) = memory_topology();
    let alias = TabletAlias::new("nyc", 62344);
    let payload = br#"{"Keyspace":"user","Shard":"0","Type":"replica"}"#;

    topo.tablets.create_tablet(&alias, payload).unwrap();
    let read = topo.tablets.get_tablet(&alias).unwrap();
    assert_eq!(read.value, payload);

    let v1 = topo.tablets.update_tablet(&alias, b"updated", read.version).unwrap();
    let v2 = topo.tablets.update_tablet(&alias, b"updated again", v1).unwrap();
    assert!(v2 > v1);
    assert_eq!(topo.tablets.get_tablet(&alias).unwrap().value, b"updated again");
}

#[test]
fn stale_update_never_mutates() {
    let (topo, _) = memory_topology();
    let alias = TabletAlias::new("nyc", 1);
    topo.tablets.create_tablet(&alias, b"original").unwrap();
    let stale = topo.tablets.get_tablet(&alias).unwrap().version;
    topo.tablets.update_tablet(&alias, b"winner", stale).unwrap();

    for _ in 0..3 {
        assert!(matches!(
            topo.tablets.update_tablet(&alias, b"loser", stale),
            Err(TopoError::VersionConflict(_))
        ));
    }
    assert_eq!(topo.tablets.get_tablet(&alias).unwrap().value, b"winner");
}

#[test]
fn tablets_enumerate_in_uid_string_order() {
    let (topo, _) = memory_topology();
    let uids = [905u32, 3, 4_000_000_000, 42, 17, 0];
    for uid in uids {
        topo.tablets
            .create_tablet(&TabletAlias::new("sfo", uid), b"")
            .unwrap();
    }

    let listed = topo.tablets.get_tablets_by_cell("sfo").unwrap();
    let mut expected: Vec<TabletAlias> = uids.iter().map(|u| TabletAlias::new("sfo", *u)).collect();
    expected.sort_by_key(|a| a.uid_str());
    assert_eq!(listed, expected);
}

#[test]
fn partial_creation_is_left_in_place_and_detected() {
    let (topo, store) = flaky_topology();
    let alias = TabletAlias::new("nyc", 8);
    store.fail_create_of("/zk/nyc/vt/tablets/0000000008/actionlog");

    assert!(matches!(
        topo.tablets.create_tablet(&alias, b"half"),
        Err(TopoError::TransientStore { .. })
    ));

    // Not rolled back: the record and the action root are there.
    assert_eq!(topo.tablets.get_tablet(&alias).unwrap().value, b"half");
    match topo.tablets.validate_tablet(&alias) {
        Err(TopoError::InconsistentTablet { missing, .. }) => {
            assert!(missing.ends_with("/actionlog"))
        }
        other => panic!("expected InconsistentTablet, got {other:?}"),
    }

    // A retry reports the existing record rather than repairing it.
    assert!(matches!(
        topo.tablets.create_tablet(&alias, b"half"),
        Err(TopoError::AlreadyExists(_))
    ));
}

#[test]
fn delete_then_validate_is_not_found() {
    let (topo, _) = memory_topology();
    let alias = TabletAlias::new("nyc", 4);
    topo.tablets.create_tablet(&alias, b"").unwrap();
    topo.actions.write_tablet_action(&alias, b"Sleep").unwrap();

    topo.tablets.delete_tablet(&alias).unwrap();
    assert!(topo.tablets.validate_tablet(&alias).unwrap_err().is_not_found());
    assert!(topo.tablets.delete_tablet(&alias).unwrap_err().is_not_found());
}

#[test]
fn invalid_cell_is_rejected_before_touching_the_store() {
    let (topo, _) = memory_topology();
    assert!(matches!(
        topo.tablets.create_tablet(&TabletAlias::new("a/b", 1), b""),
        Err(TopoError::InvalidIdentifier(_))
    ));
    assert!(matches!(
        topo.tablets.get_tablets_by_cell(""),
        Err(TopoError::InvalidIdentifier(_))
    ));
}
