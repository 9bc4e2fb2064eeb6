//! Tests for the neighbor table.
//!
//! Connections are plain strings here; the table never looks inside them.

use corelib::network::Subnet;
use corelib::topology::StaticTopology;
use corelib::{Error, NeighborTable, NodeId};
use std::net::Ipv4Addr;

const TRIANGLE: &str = "n_1 n_2 5\nn_2 n_3 3\nn_1 n_3 8\n";

fn table_for(me: u32) -> NeighborTable<String> {
    let subnet = Subnet::new(Ipv4Addr::new(10, 0, 0, 0));
    let topo = StaticTopology::parse(TRIANGLE, NodeId(me), subnet).unwrap();
    NeighborTable::create(&topo).unwrap()
}

// ============================================================================
// Creation
// ============================================================================

#[test]
fn test_create_fills_addresses() {
    let table = table_for(2);
    assert_eq!(table.len(), 2);
    assert_eq!(table.my_node_id(), NodeId(2));

    let entry = table.lookup(NodeId(3)).unwrap();
    assert_eq!(entry.address, "10.0.0.3:3500".parse().unwrap());
    assert!(!entry.is_bound());
    assert!(!table.is_complete());
    assert_eq!(table.unbound().len(), 2);
}

#[test]
fn test_sides_follow_identity_order() {
    let table = table_for(2);
    assert_eq!(table.inbound_peers(), vec![NodeId(3)]);
    let dial: Vec<NodeId> = table.outbound_peers().into_iter().map(|(id, _)| id).collect();
    assert_eq!(dial, vec![NodeId(1)]);

    let lowest = table_for(1);
    assert_eq!(lowest.inbound_peers().len(), 2);
    assert!(lowest.outbound_peers().is_empty());

    let highest = table_for(3);
    assert!(highest.inbound_peers().is_empty());
    assert_eq!(highest.outbound_peers().len(), 2);
}

// ============================================================================
// Bind / lookup
// ============================================================================

#[test]
fn test_bind_once() {
    let mut table = table_for(1);
    table.bind(NodeId(2), "c1".to_string()).unwrap();

    let err = table.bind(NodeId(2), "c2".to_string()).unwrap_err();
    assert_eq!(err, Error::AlreadyBound(NodeId(2)));

    // The first connection is still the one on record.
    let entry = table.lookup(NodeId(2)).unwrap();
    assert_eq!(entry.connection().map(String::as_str), Some("c1"));
}

#[test]
fn test_bind_unknown_neighbor() {
    let mut table = table_for(1);
    let err = table.bind(NodeId(42), "c".to_string()).unwrap_err();
    assert_eq!(err, Error::UnknownNeighbor(NodeId(42)));
}

#[test]
fn test_lookup_not_found() {
    let mut table = table_for(1);
    assert_eq!(table.lookup(NodeId(42)).unwrap_err(), Error::NotFound(NodeId(42)));
    // Known but unbound entries have no connection to hand out.
    assert_eq!(table.connection_mut(NodeId(2)).unwrap_err(), Error::NotFound(NodeId(2)));
}

#[test]
fn test_complete_after_all_bound() {
    let mut table = table_for(3);
    table.bind(NodeId(1), "a".to_string()).unwrap();
    table.bind(NodeId(2), "b".to_string()).unwrap();
    assert!(table.is_complete());
    assert!(table.unbound().is_empty());
    assert_eq!(table.bound_mut().count(), 2);
}

// ============================================================================
// Split / destroy
// ============================================================================

#[test]
fn test_split_keeps_identities() {
    let mut table = table_for(2);
    table.bind(NodeId(1), "one".to_string()).unwrap();

    let (writers, readers) = table.split(|c| (format!("{}-w", c), format!("{}-r", c)));
    assert_eq!(readers, vec![(NodeId(1), "one-r".to_string())]);
    assert_eq!(
        writers.lookup(NodeId(1)).unwrap().connection().map(String::as_str),
        Some("one-w")
    );
    assert!(!writers.lookup(NodeId(3)).unwrap().is_bound());
}

#[test]
fn test_destroy_closes_bound_only() {
    let mut table = table_for(1);
    table.bind(NodeId(3), "x".to_string()).unwrap();
    assert_eq!(table.destroy(), 1);
}
