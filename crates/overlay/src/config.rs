//! Node configuration.

use corelib::network::{CONTROL_PORT, LINK_PORT};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Grace period before dialing, so every node can reach its accept loop.
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(10);

/// Addresses and timing for one overlay node.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Where neighbors with a greater identity connect to us.
    pub link_listen: SocketAddr,
    /// Loopback address the service process connects to.
    pub control_listen: SocketAddr,
    /// Wait before dialing neighbors with a lower identity.
    pub startup_delay: Duration,
    /// Source address for outbound dials.
    ///
    /// Peers resolve our identity from the source address of the connection,
    /// so on multi-homed hosts this must be the address in the mesh subnet.
    pub dial_from: Option<IpAddr>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            link_listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), LINK_PORT),
            control_listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), CONTROL_PORT),
            startup_delay: DEFAULT_STARTUP_DELAY,
            dial_from: None,
        }
    }
}

impl OverlayConfig {
    pub fn with_link_listen(mut self, addr: SocketAddr) -> Self {
        self.link_listen = addr;
        self
    }

    pub fn with_control_listen(mut self, addr: SocketAddr) -> Self {
        self.control_listen = addr;
        self
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn with_dial_from(mut self, ip: impl Into<Option<IpAddr>>) -> Self {
        self.dial_from = ip.into();
        self
    }
}
