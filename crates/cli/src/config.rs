//! Command-line configuration.

use crate::commands::{self, Command, CommandResult};
use anyhow::{bail, Context};
use clap::Parser;
use corelib::network::{Subnet, CONTROL_PORT, LINK_PORT};
use corelib::topology::StaticTopology;
use corelib::NodeId;
use overlay::OverlayConfig;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "overlay-node", version, about = "Overlay mesh data-plane node")]
pub struct CliConfig {
    /// Topology file, one `<host_a> <host_b> <cost>` link per line.
    #[arg(long, global = true, default_value = "topology/topology.dat")]
    pub topology: PathBuf,

    /// Any address of the /24 subnet shared by all nodes.
    #[arg(long, global = true, default_value = "192.168.56.0")]
    pub subnet: Ipv4Addr,

    /// Identity of this node.
    #[arg(long, global = true, conflicts_with = "local_ip")]
    pub node_id: Option<u32>,

    /// Address of this node in the mesh subnet; the identity is its last octet.
    #[arg(long, global = true)]
    pub local_ip: Option<Ipv4Addr>,

    /// Port for neighbor links.
    #[arg(long, global = true, default_value_t = LINK_PORT)]
    pub link_port: u16,

    /// Loopback port for the service process.
    #[arg(long, global = true, default_value_t = CONTROL_PORT)]
    pub control_port: u16,

    /// Seconds to wait before dialing neighbors with a lower identity.
    #[arg(long, global = true, default_value_t = 10)]
    pub startup_delay_secs: u64,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl CliConfig {
    /// Install logging and execute the selected command (`run` by default).
    pub fn run(self) -> CommandResult {
        init_tracing(self.verbose);
        let command = self.command.clone().unwrap_or(Command::Run);
        commands::execute(&self, command)
    }

    pub fn subnet(&self) -> Subnet {
        Subnet::new(self.subnet)
    }

    /// Local identity from `--node-id` or `--local-ip`.
    pub fn node_id(&self) -> anyhow::Result<NodeId> {
        if let Some(id) = self.node_id {
            return Ok(NodeId(id));
        }
        match self.local_ip {
            Some(ip) => self.subnet().identity_of(IpAddr::V4(ip)).with_context(|| {
                format!("local address {} is outside subnet {}", ip, self.subnet())
            }),
            None => bail!("pass --node-id or --local-ip to identify this node"),
        }
    }

    pub fn load_topology(&self) -> anyhow::Result<StaticTopology> {
        let me = self.node_id()?;
        let topology = StaticTopology::from_file(&self.topology, me, self.subnet())
            .with_context(|| format!("loading topology from {}", self.topology.display()))?;
        Ok(topology.with_port(self.link_port))
    }

    pub fn overlay_config(&self) -> OverlayConfig {
        let link_listen = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.link_port);
        let control_listen = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.control_port);
        OverlayConfig::default()
            .with_link_listen(link_listen)
            .with_control_listen(control_listen)
            .with_startup_delay(Duration::from_secs(self.startup_delay_secs))
            .with_dial_from(self.local_ip.map(IpAddr::V4))
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CliConfig::try_parse_from(["overlay-node", "--node-id", "3"]).unwrap();
        assert_eq!(config.node_id().unwrap(), NodeId(3));
        assert!(config.command.is_none());

        let overlay = config.overlay_config();
        assert_eq!(overlay.link_listen.port(), LINK_PORT);
        assert!(overlay.control_listen.ip().is_loopback());
        assert_eq!(overlay.startup_delay, Duration::from_secs(10));
        assert!(overlay.dial_from.is_none());
    }

    #[test]
    fn test_identity_from_local_ip() {
        let config = CliConfig::try_parse_from([
            "overlay-node",
            "--subnet",
            "10.0.0.0",
            "--local-ip",
            "10.0.0.7",
            "show",
        ])
        .unwrap();
        assert_eq!(config.node_id().unwrap(), NodeId(7));
        assert_eq!(config.overlay_config().dial_from, Some("10.0.0.7".parse().unwrap()));
        assert!(matches!(config.command, Some(Command::Show { json: false })));
    }

    #[test]
    fn test_identity_required() {
        let config = CliConfig::try_parse_from(["overlay-node"]).unwrap();
        assert!(config.node_id().is_err());

        let outside =
            CliConfig::try_parse_from(["overlay-node", "--local-ip", "10.9.9.9"]).unwrap();
        assert!(outside.node_id().is_err());
    }

    #[test]
    fn test_node_id_conflicts_with_local_ip() {
        let result = CliConfig::try_parse_from([
            "overlay-node",
            "--node-id",
            "1",
            "--local-ip",
            "192.168.56.1",
        ]);
        assert!(result.is_err());
    }
}
