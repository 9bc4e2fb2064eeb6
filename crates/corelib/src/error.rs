//! Error types for the core library.

use crate::node::NodeId;
use thiserror::Error;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A connection is already bound to this neighbor.
    #[error("neighbor {0} is already bound to a connection")]
    AlreadyBound(NodeId),

    /// Bind was attempted for an identity that is not a configured neighbor.
    #[error("node {0} is not a configured neighbor")]
    UnknownNeighbor(NodeId),

    /// Lookup found no entry for this identity.
    #[error("no neighbor entry for node {0}")]
    NotFound(NodeId),

    /// The topology description is missing, malformed or inconsistent.
    #[error("topology error: {0}")]
    Topology(String),

    /// A record could not be built from the given bytes or fields.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}
