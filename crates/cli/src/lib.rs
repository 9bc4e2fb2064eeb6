//! CLI for running an overlay mesh node.
//!
//! Provides commands for:
//! - Forming the mesh and forwarding for the local service process
//! - Inspecting the resolved topology of this node

pub mod commands;
pub mod config;

pub use commands::{Command, CommandResult};
pub use config::CliConfig;
