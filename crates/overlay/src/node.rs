//! Node context.
//!
//! [`OverlayNode`] owns everything a running node needs (topology, config)
//! and hands it to the establishment and forwarding workers explicitly.

use crate::config::OverlayConfig;
use crate::error::{OverlayError, Result};
use crate::establish::establish;
use crate::forward::ForwardingEngine;
use corelib::topology::summarize;
use corelib::Topology;
use std::future::Future;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::info;

/// One overlay node, from startup to shutdown.
pub struct OverlayNode {
    topology: Arc<dyn Topology>,
    config: OverlayConfig,
}

impl OverlayNode {
    pub fn new(topology: Arc<dyn Topology>, config: OverlayConfig) -> Self {
        Self { topology, config }
    }

    /// Log the local identity and every neighbor.
    pub fn log_neighbors(&self) {
        let me = self.topology.my_node_id();
        info!(node = %me, "overlay node initializing");
        for (idx, neighbor) in summarize(self.topology.as_ref()).iter().enumerate() {
            info!(
                index = idx + 1,
                neighbor = %neighbor.id,
                addr = ?neighbor.address,
                cost = ?neighbor.cost,
                "neighbor"
            );
        }
    }

    /// Wait for the local service process on the loopback control port.
    pub async fn accept_service(&self) -> Result<TcpStream> {
        let addr = self.config.control_listen;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| OverlayError::Bind { addr, source })?;
        info!(%addr, "waiting for service process");
        let (stream, peer) = listener.accept().await.map_err(OverlayError::Accept)?;
        info!(%peer, "service process connected");
        Ok(stream)
    }

    /// Form the mesh, connect the service process and start forwarding.
    pub async fn bring_up(&self) -> Result<ForwardingEngine> {
        let table = establish(self.topology.as_ref(), &self.config).await?;
        info!(node = %self.topology.my_node_id(), "node initialized");
        let control = self.accept_service().await?;
        Ok(ForwardingEngine::start(table, control))
    }

    /// Run until `shutdown` resolves or a fatal error occurs.
    ///
    /// Every connection is closed before this returns.
    pub async fn run<S>(self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.log_neighbors();

        let mut engine = tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested before the node was ready");
                return Ok(());
            }
            engine = self.bring_up() => engine?,
        };

        let outcome = tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                None
            }
            result = engine.serve() => Some(result),
        };
        engine.shutdown().await;
        outcome.unwrap_or(Ok(()))
    }
}
