//! Core library for the overlay mesh data-plane.
//!
//! This crate provides the fundamental abstractions shared by every node:
//! - Node identities and forwarding directives
//! - Fixed-size packet and control records with explicit encode/decode
//! - The topology service interface and a file-backed implementation
//! - The neighbor table that holds one connection per neighbor

pub mod error;
pub mod neighbor;
pub mod network;
pub mod node;
pub mod packet;
pub mod topology;

pub use error::{Error, Result};
pub use neighbor::{NeighborEntry, NeighborTable};
pub use node::{NextHop, NodeId, BROADCAST_NODE_ID};
pub use packet::{ControlRecord, Packet, PacketHeader, PacketType, WireRecord};
pub use topology::{StaticTopology, Topology};
