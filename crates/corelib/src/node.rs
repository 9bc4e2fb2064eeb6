//! Node identities for the overlay mesh.
//!
//! Nodes are identified by a small integer derived from their network
//! address. Identities are totally ordered; the ordering is what breaks
//! symmetry during link establishment.

use serde::Serialize;
use std::fmt;

/// Wire value of the next hop that means "every neighbor".
pub const BROADCAST_NODE_ID: u32 = 9999;

/// Compact identifier for a node in the mesh.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Raw integer value as carried on the wire.
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        NodeId(value)
    }
}

/// Forwarding directive attached to an outbound packet by the service process.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum NextHop {
    /// Send to exactly one neighbor.
    Node(NodeId),
    /// Send a copy to every bound neighbor.
    Broadcast,
}

impl NextHop {
    /// Decode the 4-byte next-hop field.
    pub fn from_wire(raw: u32) -> Self {
        if raw == BROADCAST_NODE_ID {
            NextHop::Broadcast
        } else {
            NextHop::Node(NodeId(raw))
        }
    }

    /// Encode into the 4-byte next-hop field.
    pub fn to_wire(self) -> u32 {
        match self {
            NextHop::Node(id) => id.0,
            NextHop::Broadcast => BROADCAST_NODE_ID,
        }
    }
}

impl From<NodeId> for NextHop {
    fn from(id: NodeId) -> Self {
        NextHop::Node(id)
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextHop::Node(id) => write!(f, "{}", id),
            NextHop::Broadcast => write!(f, "broadcast"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ordering() {
        assert!(NodeId(1) < NodeId(2));
        assert_eq!(NodeId(7).to_string(), "7");
    }

    #[test]
    fn test_next_hop_wire_values() {
        assert_eq!(NextHop::from_wire(BROADCAST_NODE_ID), NextHop::Broadcast);
        assert_eq!(NextHop::from_wire(3), NextHop::Node(NodeId(3)));
        assert_eq!(NextHop::Broadcast.to_wire(), 9999);
        assert_eq!(NextHop::Node(NodeId(12)).to_wire(), 12);
    }
}
