//! Topology service.
//!
//! The overlay core never decides who its neighbors are; it asks a
//! [`Topology`]. Answers are read-only and may be recomputed on every call.
//!
//! [`StaticTopology`] is the file-backed implementation used by the node
//! binary. The file lists one undirected link per line:
//!
//! ```text
//! # host_a     host_b     cost
//! csnetlab_1   csnetlab_2 5
//! csnetlab_2   csnetlab_3 3
//! csnetlab_1   csnetlab_3 8
//! ```
//!
//! A host name ends in `_<id>`; a bare integer is accepted as well. Node
//! addresses are derived from the identity through a shared [`Subnet`].

use crate::error::{Error, Result};
use crate::network::{Subnet, LINK_PORT};
use crate::node::NodeId;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

/// Collaborator interface consumed by the overlay core.
pub trait Topology: Send + Sync {
    /// Identity of the local node.
    fn my_node_id(&self) -> NodeId;

    /// Identities of every direct neighbor of the local node.
    fn neighbor_ids(&self) -> Vec<NodeId>;

    /// Number of direct neighbors.
    fn neighbor_count(&self) -> usize {
        self.neighbor_ids().len()
    }

    /// Link-establishment address of a neighbor.
    fn neighbor_address(&self, id: NodeId) -> Option<SocketAddr>;

    /// Link-establishment address of the local node.
    fn local_address(&self) -> Option<SocketAddr>;

    /// Identity of the node that owns `addr`. Only the IP part is considered.
    fn resolve_identity(&self, addr: &SocketAddr) -> Option<NodeId>;

    /// Direct link cost between two nodes; `None` means no direct link.
    fn link_cost(&self, a: NodeId, b: NodeId) -> Option<u32>;
}

/// One undirected link of the static topology.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Link {
    pub a: NodeId,
    pub b: NodeId,
    pub cost: u32,
}

impl Link {
    fn touches(&self, id: NodeId) -> bool {
        self.a == id || self.b == id
    }

    fn other(&self, id: NodeId) -> Option<NodeId> {
        if self.a == id {
            Some(self.b)
        } else if self.b == id {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Parse a host name of the form `name_<id>` (or a bare integer) into an identity.
pub fn node_id_from_hostname(hostname: &str) -> Option<NodeId> {
    let digits = match hostname.rsplit_once('_') {
        Some((_, suffix)) => suffix,
        None => hostname,
    };
    digits.parse::<u32>().ok().map(NodeId)
}

/// File-backed topology with addresses derived from a shared subnet.
#[derive(Clone, Debug)]
pub struct StaticTopology {
    my_id: NodeId,
    subnet: Subnet,
    port: u16,
    links: Vec<Link>,
}

impl StaticTopology {
    /// Build from an explicit link list.
    pub fn from_links(my_id: NodeId, subnet: Subnet, links: Vec<Link>) -> Result<Self> {
        for link in &links {
            if link.a == link.b {
                return Err(Error::Topology(format!("self-link on node {}", link.a)));
            }
            for id in [link.a, link.b] {
                if subnet.address_of(id).is_none() {
                    return Err(Error::Topology(format!(
                        "node {} cannot be addressed in {}",
                        id, subnet
                    )));
                }
            }
        }
        Ok(Self {
            my_id,
            subnet,
            port: LINK_PORT,
            links,
        })
    }

    /// Parse the textual link list.
    pub fn parse(text: &str, my_id: NodeId, subnet: Subnet) -> Result<Self> {
        let mut links = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let lineno = idx + 1;
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() != 3 {
                return Err(Error::Topology(format!(
                    "line {}: expected `<host> <host> <cost>`, got {:?}",
                    lineno, line
                )));
            }
            let a = node_id_from_hostname(parts[0]).ok_or_else(|| {
                Error::Topology(format!("line {}: bad host name {:?}", lineno, parts[0]))
            })?;
            let b = node_id_from_hostname(parts[1]).ok_or_else(|| {
                Error::Topology(format!("line {}: bad host name {:?}", lineno, parts[1]))
            })?;
            let cost = parts[2].parse::<u32>().map_err(|_| {
                Error::Topology(format!("line {}: bad cost {:?}", lineno, parts[2]))
            })?;
            links.push(Link { a, b, cost });
        }
        Self::from_links(my_id, subnet, links)
    }

    /// Read and parse a topology file.
    pub fn from_file(path: impl AsRef<Path>, my_id: NodeId, subnet: Subnet) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Topology(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&text, my_id, subnet)
    }

    /// Override the link-establishment port used in derived addresses.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn subnet(&self) -> Subnet {
        self.subnet
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Every node that appears in the topology, ascending.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.links.iter().flat_map(|l| [l.a, l.b]).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn node_count(&self) -> usize {
        self.node_ids().len()
    }

    fn address_of(&self, id: NodeId) -> Option<SocketAddr> {
        self.subnet
            .address_of(id)
            .map(|ip| SocketAddr::new(IpAddr::V4(ip), self.port))
    }
}

impl Topology for StaticTopology {
    fn my_node_id(&self) -> NodeId {
        self.my_id
    }

    fn neighbor_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        for link in &self.links {
            if let Some(other) = link.other(self.my_id) {
                if !ids.contains(&other) {
                    ids.push(other);
                }
            }
        }
        ids
    }

    fn neighbor_address(&self, id: NodeId) -> Option<SocketAddr> {
        if !self.links.iter().any(|l| l.touches(self.my_id) && l.touches(id)) {
            return None;
        }
        self.address_of(id)
    }

    fn local_address(&self) -> Option<SocketAddr> {
        self.address_of(self.my_id)
    }

    fn resolve_identity(&self, addr: &SocketAddr) -> Option<NodeId> {
        self.subnet.identity_of(addr.ip())
    }

    fn link_cost(&self, a: NodeId, b: NodeId) -> Option<u32> {
        if a == b {
            return Some(0);
        }
        self.links
            .iter()
            .find(|l| l.other(a) == Some(b))
            .map(|l| l.cost)
    }
}

/// Printable description of one neighbor.
#[derive(Clone, Debug, Serialize)]
pub struct NeighborSummary {
    pub id: NodeId,
    pub address: Option<SocketAddr>,
    pub cost: Option<u32>,
}

/// Describe every neighbor of the local node.
pub fn summarize(topology: &dyn Topology) -> Vec<NeighborSummary> {
    let me = topology.my_node_id();
    topology
        .neighbor_ids()
        .into_iter()
        .map(|id| NeighborSummary {
            id,
            address: topology.neighbor_address(id),
            cost: topology.link_cost(me, id),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_parsing() {
        assert_eq!(node_id_from_hostname("csnetlab_12"), Some(NodeId(12)));
        assert_eq!(node_id_from_hostname("a_b_3"), Some(NodeId(3)));
        assert_eq!(node_id_from_hostname("7"), Some(NodeId(7)));
        assert_eq!(node_id_from_hostname("host"), None);
    }

    #[test]
    fn test_self_link_rejected() {
        let subnet = Subnet::new(std::net::Ipv4Addr::new(10, 0, 0, 0));
        let links = vec![Link { a: NodeId(1), b: NodeId(1), cost: 1 }];
        assert!(StaticTopology::from_links(NodeId(1), subnet, links).is_err());
    }
}
