//! Errors of the overlay node.

use corelib::NodeId;
use std::io;
use std::net::SocketAddr;
use streaming::StreamingError;

/// Result type alias for the overlay crate.
pub type Result<T> = std::result::Result<T, OverlayError>;

/// Errors raised while establishing the mesh or forwarding packets.
///
/// Establishment errors and dispatcher errors are fatal to the node; link
/// errors only end the relay of that link.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// A listener could not be opened.
    #[error("failed to listen on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Accepting an inbound connection failed.
    #[error("failed to accept connection")]
    Accept(#[source] io::Error),

    /// Dialing a neighbor failed.
    #[error("failed to connect to neighbor {id} at {addr}")]
    Connect {
        id: NodeId,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// An inbound connection came from an address with no node identity.
    #[error("connection from {0} does not belong to any node")]
    UnknownPeer(SocketAddr),

    /// A neighbor with a lower identity dialed us; it should have waited for our dial.
    #[error("neighbor {id} dialed node {me} but only greater identities may")]
    UnexpectedInitiator { id: NodeId, me: NodeId },

    /// Neighbor table misuse or topology inconsistency.
    #[error(transparent)]
    Table(#[from] corelib::Error),

    /// Establishment finished with neighbors still unbound.
    #[error("mesh incomplete, unbound neighbors: {0:?}")]
    Incomplete(Vec<NodeId>),

    /// A neighbor link broke.
    #[error("link to neighbor {id} failed")]
    Link {
        id: NodeId,
        #[source]
        source: StreamingError,
    },

    /// The service process asked for a next hop that is not a neighbor.
    #[error("next hop {0} is not a neighbor")]
    UnresolvedNextHop(NodeId),

    /// The control channel to the service process broke.
    #[error("control channel failed")]
    ControlChannel(#[source] StreamingError),

    /// A forwarding worker panicked or was cancelled.
    #[error("worker failed")]
    Worker(#[from] tokio::task::JoinError),
}
