//! Neighbor table.
//!
//! One entry per neighbor reported by the topology service, each holding at
//! most one connection. The table is filled during link establishment and is
//! read-only afterwards.
//!
//! # Invariants
//!
//! - Entries are created once, at startup, with their address already filled.
//! - A bound entry is never rebound: a second `bind` for the same identity
//!   fails with [`Error::AlreadyBound`] and the original connection stays.
//!
//! The table is generic over the connection type so the same structure holds
//! full streams during establishment and per-direction halves afterwards.

use crate::error::{Error, Result};
use crate::node::NodeId;
use crate::topology::Topology;
use std::net::SocketAddr;
use tracing::debug;

/// A single neighbor and its (optional) connection.
#[derive(Debug)]
pub struct NeighborEntry<C> {
    pub node_id: NodeId,
    pub address: SocketAddr,
    conn: Option<C>,
}

impl<C> NeighborEntry<C> {
    fn new(node_id: NodeId, address: SocketAddr) -> Self {
        Self {
            node_id,
            address,
            conn: None,
        }
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.conn.is_some()
    }

    pub fn connection(&self) -> Option<&C> {
        self.conn.as_ref()
    }

    pub fn connection_mut(&mut self) -> Option<&mut C> {
        self.conn.as_mut()
    }
}

/// Registry mapping neighbor identity to connection.
#[derive(Debug)]
pub struct NeighborTable<C> {
    my_id: NodeId,
    entries: Vec<NeighborEntry<C>>,
}

impl<C> NeighborTable<C> {
    /// Allocate one unbound entry per neighbor of the local node.
    ///
    /// Fails if the topology cannot give an address for some neighbor, since
    /// dialing that neighbor later would be impossible.
    pub fn create(topology: &dyn Topology) -> Result<Self> {
        let my_id = topology.my_node_id();
        let mut entries = Vec::with_capacity(topology.neighbor_count());
        for id in topology.neighbor_ids() {
            if id == my_id {
                return Err(Error::Topology(format!("node {} lists itself as neighbor", id)));
            }
            let address = topology
                .neighbor_address(id)
                .ok_or_else(|| Error::Topology(format!("no address for neighbor {}", id)))?;
            entries.push(NeighborEntry::new(id, address));
        }
        Ok(Self { my_id, entries })
    }

    /// Close every bound connection and release the table.
    ///
    /// Returns how many connections were closed.
    pub fn destroy(self) -> usize {
        let mut closed = 0;
        for entry in self.entries {
            if let Some(conn) = entry.conn {
                drop(conn);
                closed += 1;
                debug!(neighbor = %entry.node_id, "closed neighbor connection");
            }
        }
        closed
    }

    /// Attach `conn` to the entry for `id`.
    ///
    /// On failure the connection is dropped.
    pub fn bind(&mut self, id: NodeId, conn: C) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.node_id == id)
            .ok_or(Error::UnknownNeighbor(id))?;
        if entry.conn.is_some() {
            return Err(Error::AlreadyBound(id));
        }
        entry.conn = Some(conn);
        Ok(())
    }

    pub fn lookup(&self, id: NodeId) -> Result<&NeighborEntry<C>> {
        self.entries
            .iter()
            .find(|e| e.node_id == id)
            .ok_or(Error::NotFound(id))
    }

    pub fn lookup_mut(&mut self, id: NodeId) -> Result<&mut NeighborEntry<C>> {
        self.entries
            .iter_mut()
            .find(|e| e.node_id == id)
            .ok_or(Error::NotFound(id))
    }

    /// Connection bound to `id`; an unbound entry counts as not found.
    pub fn connection_mut(&mut self, id: NodeId) -> Result<&mut C> {
        self.lookup_mut(id)?
            .connection_mut()
            .ok_or(Error::NotFound(id))
    }

    pub fn my_node_id(&self) -> NodeId {
        self.my_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NeighborEntry<C>> {
        self.entries.iter()
    }

    /// Bound connections, for fan-out.
    pub fn bound_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut C)> {
        self.entries
            .iter_mut()
            .filter_map(|e| e.conn.as_mut().map(|c| (e.node_id, c)))
    }

    /// Neighbors with a greater identity; they dial us.
    pub fn inbound_peers(&self) -> Vec<NodeId> {
        self.entries
            .iter()
            .filter(|e| e.node_id > self.my_id)
            .map(|e| e.node_id)
            .collect()
    }

    /// Neighbors with a lower identity, with their addresses; we dial them.
    pub fn outbound_peers(&self) -> Vec<(NodeId, SocketAddr)> {
        self.entries
            .iter()
            .filter(|e| e.node_id < self.my_id)
            .map(|e| (e.node_id, e.address))
            .collect()
    }

    /// Identities still waiting for a connection.
    pub fn unbound(&self) -> Vec<NodeId> {
        self.entries
            .iter()
            .filter(|e| !e.is_bound())
            .map(|e| e.node_id)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.is_bound())
    }

    /// Split every bound connection in two.
    ///
    /// The first halves stay in a table with the same entries; the second
    /// halves are returned with their identities. Unbound entries stay unbound.
    pub fn split<A, B>(
        self,
        mut f: impl FnMut(C) -> (A, B),
    ) -> (NeighborTable<A>, Vec<(NodeId, B)>) {
        let mut seconds = Vec::new();
        let entries = self
            .entries
            .into_iter()
            .map(|e| {
                let conn = e.conn.map(|c| {
                    let (a, b) = f(c);
                    seconds.push((e.node_id, b));
                    a
                });
                NeighborEntry {
                    node_id: e.node_id,
                    address: e.address,
                    conn,
                }
            })
            .collect();
        (
            NeighborTable {
                my_id: self.my_id,
                entries,
            },
            seconds,
        )
    }
}
