//! Subcommands.

use crate::config::CliConfig;
use clap::Subcommand;
use corelib::topology::{summarize, NeighborSummary};
use corelib::{NodeId, Topology};
use overlay::OverlayNode;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

/// Result of running a command.
pub type CommandResult = anyhow::Result<()>;

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Form the mesh and forward packets until interrupted (default).
    Run,
    /// Print this node's identity, neighbors, addresses and link costs.
    Show {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}

pub fn execute(config: &CliConfig, command: Command) -> CommandResult {
    match command {
        Command::Run => run(config),
        Command::Show { json } => show(config, json),
    }
}

fn run(config: &CliConfig) -> CommandResult {
    let topology: Arc<dyn Topology> = Arc::new(config.load_topology()?);
    let node = OverlayNode::new(topology, config.overlay_config());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(node.run(shutdown_signal()))?;
    info!("overlay node stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "cannot listen for Ctrl-C; stop the process externally");
        std::future::pending::<()>().await;
    }
}

#[derive(Debug, Serialize)]
struct NodeReport {
    node: NodeId,
    address: Option<SocketAddr>,
    nodes: Vec<NodeId>,
    neighbors: Vec<NeighborSummary>,
}

fn show(config: &CliConfig, json: bool) -> CommandResult {
    let topology = config.load_topology()?;
    let report = NodeReport {
        node: topology.my_node_id(),
        address: topology.local_address(),
        nodes: topology.node_ids(),
        neighbors: summarize(&topology),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let address = report
        .address
        .map(|a| a.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("node {} ({}) in {}", report.node, address, topology.subnet());
    println!("{} nodes in topology, {} neighbors", report.nodes.len(), report.neighbors.len());
    for (idx, neighbor) in report.neighbors.iter().enumerate() {
        let address = neighbor
            .address
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        let cost = neighbor
            .cost
            .map(|c| c.to_string())
            .unwrap_or_else(|| "inf".to_string());
        println!("  {}. node {:<4} {:<21} cost {}", idx + 1, neighbor.id, address, cost);
    }
    Ok(())
}
