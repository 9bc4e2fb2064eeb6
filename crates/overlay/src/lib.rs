//! Overlay mesh node.
//!
//! This crate turns a topology and a configuration into a running node:
//! - Link establishment: one connection per neighbor pair, no handshake
//! - Forwarding engine: inbound relays and the outbound dispatcher
//! - The node context that ties both to the local service process

pub mod config;
pub mod error;
pub mod establish;
pub mod forward;
pub mod node;

pub use config::OverlayConfig;
pub use error::{OverlayError, Result};
pub use establish::establish;
pub use forward::{DeadLinks, Dispatcher, ForwardingEngine};
pub use node::OverlayNode;
