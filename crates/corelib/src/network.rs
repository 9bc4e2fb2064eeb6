//! Addressing shared across the workspace.
//!
//! Every node lives in one IPv4 /24 subnet and its identity is the last
//! octet of its address, so identity and address can be derived from each
//! other without a lookup table.

use crate::node::NodeId;
use std::net::{IpAddr, Ipv4Addr};

/// Well-known port for neighbor link establishment.
pub const LINK_PORT: u16 = 3500;

/// Loopback-only port for the service-process control channel.
pub const CONTROL_PORT: u16 = 3501;

/// The /24 subnet that all mesh nodes share.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Subnet {
    prefix: [u8; 3],
}

impl Subnet {
    /// Build from any address inside the subnet; the last octet is ignored.
    pub fn new(addr: Ipv4Addr) -> Self {
        let [a, b, c, _] = addr.octets();
        Self { prefix: [a, b, c] }
    }

    /// Address of the node with the given identity.
    ///
    /// Returns `None` when the identity does not fit into one octet.
    pub fn address_of(&self, id: NodeId) -> Option<Ipv4Addr> {
        let host = u8::try_from(id.get()).ok()?;
        let [a, b, c] = self.prefix;
        Some(Ipv4Addr::new(a, b, c, host))
    }

    /// Identity of the node owning `addr`, if the address belongs to the subnet.
    ///
    /// IPv4-mapped IPv6 addresses (as seen on dual-stack listeners) are
    /// unwrapped first.
    pub fn identity_of(&self, addr: IpAddr) -> Option<NodeId> {
        let v4 = match addr {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(v6) => v6.to_ipv4_mapped()?,
        };
        let [a, b, c, d] = v4.octets();
        if [a, b, c] == self.prefix {
            Some(NodeId(u32::from(d)))
        } else {
            None
        }
    }
}

impl std::fmt::Display for Subnet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c] = self.prefix;
        write!(f, "{}.{}.{}.0/24", a, b, c)
    }
}
