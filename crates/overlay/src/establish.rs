//! Link establishment.
//!
//! Builds exactly one connection per neighbor pair, on every node at once,
//! without a handshake. Symmetry is broken by identity alone:
//!
//! - a node accepts connections only from neighbors with a greater identity
//! - a node dials only neighbors with a lower identity
//!
//! For any pair `a < b`, `b` dials and `a` accepts, never both and never
//! neither.
//!
//! # Algorithm
//!
//! 1. Count the neighbors with a greater identity (expected inbound links)
//! 2. Accept that many connections, resolving each peer from its source
//!    address and binding it into the table
//! 3. Concurrently: wait the startup delay, then dial every neighbor with a
//!    lower identity in turn and bind it
//! 4. Finish once both sides are done and every entry is bound
//!
//! Any failure aborts establishment; a partial mesh is never returned.

use crate::config::OverlayConfig;
use crate::error::{OverlayError, Result};
use corelib::{NeighborTable, NodeId, Topology};
use parking_lot::Mutex;
use std::net::{IpAddr, SocketAddr};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, info, warn};

/// Form the mesh and return a table with every neighbor bound.
pub async fn establish(
    topology: &dyn Topology,
    config: &OverlayConfig,
) -> Result<NeighborTable<TcpStream>> {
    let table = NeighborTable::<TcpStream>::create(topology)?;
    let me = table.my_node_id();
    let expected = table.inbound_peers().len();
    let targets = table.outbound_peers();
    info!(
        node = %me,
        expected_inbound = expected,
        outbound = targets.len(),
        "establishing mesh"
    );

    // Bound before the delay starts, so peers that finish their delay first
    // find us listening.
    let listener = if expected > 0 {
        let listener = TcpListener::bind(config.link_listen)
            .await
            .map_err(|source| OverlayError::Bind {
                addr: config.link_listen,
                source,
            })?;
        info!(addr = %config.link_listen, expected, "waiting for neighbors");
        Some(listener)
    } else {
        None
    };

    let table = Mutex::new(table);
    let outcome = tokio::try_join!(
        accept_neighbors(listener, expected, me, topology, &table),
        dial_neighbors(&targets, config, &table),
    );
    let table = table.into_inner();

    if let Err(err) = outcome {
        let closed = table.destroy();
        warn!(error = %err, closed, "mesh establishment failed");
        return Err(err);
    }

    let unbound = table.unbound();
    if !unbound.is_empty() {
        table.destroy();
        return Err(OverlayError::Incomplete(unbound));
    }

    info!(node = %me, links = table.len(), "mesh established");
    Ok(table)
}

async fn accept_neighbors(
    listener: Option<TcpListener>,
    expected: usize,
    me: NodeId,
    topology: &dyn Topology,
    table: &Mutex<NeighborTable<TcpStream>>,
) -> Result<usize> {
    let Some(listener) = listener else {
        return Ok(0);
    };

    let mut accepted = 0;
    while accepted < expected {
        let (stream, peer) = listener.accept().await.map_err(OverlayError::Accept)?;
        let id = topology
            .resolve_identity(&peer)
            .ok_or(OverlayError::UnknownPeer(peer))?;
        if id <= me {
            return Err(OverlayError::UnexpectedInitiator { id, me });
        }
        if let Err(err) = stream.set_nodelay(true) {
            debug!(neighbor = %id, error = %err, "failed to set TCP_NODELAY");
        }
        table.lock().bind(id, stream)?;
        accepted += 1;
        info!(neighbor = %id, %peer, accepted, expected, "accepted neighbor link");
    }
    Ok(accepted)
}

async fn dial_neighbors(
    targets: &[(NodeId, SocketAddr)],
    config: &OverlayConfig,
    table: &Mutex<NeighborTable<TcpStream>>,
) -> Result<usize> {
    if targets.is_empty() {
        return Ok(0);
    }
    debug!(delay = ?config.startup_delay, "waiting before dialing neighbors");
    tokio::time::sleep(config.startup_delay).await;

    for &(id, addr) in targets {
        let stream = connect(addr, config.dial_from)
            .await
            .map_err(|source| OverlayError::Connect { id, addr, source })?;
        if let Err(err) = stream.set_nodelay(true) {
            debug!(neighbor = %id, error = %err, "failed to set TCP_NODELAY");
        }
        table.lock().bind(id, stream)?;
        info!(neighbor = %id, %addr, "connected to neighbor");
    }
    Ok(targets.len())
}

async fn connect(addr: SocketAddr, from: Option<IpAddr>) -> std::io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    if let Some(ip) = from {
        socket.bind(SocketAddr::new(ip, 0))?;
    }
    socket.connect(addr).await
}
