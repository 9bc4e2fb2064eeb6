//! Forwarding engine.
//!
//! Two kinds of workers run once the mesh is up:
//!
//! - **Inbound relay**, one per neighbor: receive a framed packet from the
//!   neighbor and hand it to the service process, tagged with its origin.
//! - **Outbound dispatcher**, exactly one: receive a control record from the
//!   service process and send its packet to the next hop, or to every
//!   neighbor for a broadcast.
//!
//! Relays share the control channel behind an async lock, so frames from
//! different neighbors never interleave at byte level; their relative order
//! is unspecified. The neighbor table is owned by the dispatcher and is not
//! modified after establishment. A link that fails in either direction is
//! recorded in [`DeadLinks`] and is dead for both halves.

use crate::error::{OverlayError, Result};
use corelib::{ControlRecord, NeighborTable, NextHop, NodeId, Packet};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use streaming::codec::encode_frame;
use streaming::{FrameState, StreamReceiver, StreamSender, StreamingError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Control-channel sender shared by every inbound relay.
pub type SharedControl<W> = Arc<AsyncMutex<StreamSender<W>>>;

/// Neighbor links that can no longer be used, shared by relays and the
/// dispatcher.
///
/// Marking a link dead from the sending side aborts its relay. A relay that
/// stops on its own only records the link.
#[derive(Debug, Clone, Default)]
pub struct DeadLinks {
    inner: Arc<Mutex<DeadLinksInner>>,
}

#[derive(Debug, Default)]
struct DeadLinksInner {
    dead: HashSet<NodeId>,
    relays: HashMap<NodeId, AbortHandle>,
}

impl DeadLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dead(&self, id: NodeId) -> bool {
        self.inner.lock().dead.contains(&id)
    }

    /// Register the relay reading from `id`; it is aborted at once if the
    /// link already died.
    pub fn watch_relay(&self, id: NodeId, relay: AbortHandle) {
        let mut inner = self.inner.lock();
        if inner.dead.contains(&id) {
            relay.abort();
        } else {
            inner.relays.insert(id, relay);
        }
    }

    /// Mark `id` dead and stop its relay. Returns `false` if it already was.
    pub fn mark(&self, id: NodeId) -> bool {
        let mut inner = self.inner.lock();
        if let Some(relay) = inner.relays.remove(&id) {
            relay.abort();
        }
        inner.dead.insert(id)
    }

    /// Mark `id` dead from inside its own relay, which is already stopping.
    fn retire(&self, id: NodeId) {
        let mut inner = self.inner.lock();
        inner.relays.remove(&id);
        inner.dead.insert(id);
    }
}

/// Relay packets from one neighbor to the service process until the link fails.
///
/// Returns `Ok(())` when the neighbor closes the link between frames; any
/// other link failure is [`OverlayError::Link`]. Either way the link is
/// marked dead. A failed write to the service process is
/// [`OverlayError::ControlChannel`].
pub async fn relay_inbound<R, W>(
    neighbor: NodeId,
    mut link: StreamReceiver<R>,
    control: SharedControl<W>,
    dead: DeadLinks,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let packet: Packet = match link.recv().await {
            Ok(packet) => packet,
            Err(err) if link_closed_cleanly(&err) => {
                info!(neighbor = %neighbor, "neighbor closed link");
                dead.retire(neighbor);
                return Ok(());
            }
            Err(source) => {
                dead.retire(neighbor);
                return Err(OverlayError::Link {
                    id: neighbor,
                    source,
                });
            }
        };
        debug!(
            neighbor = %neighbor,
            src = %packet.header.src,
            dest = %packet.header.dest,
            "relaying packet to service"
        );
        let record = ControlRecord::inbound(packet, neighbor);
        control
            .lock()
            .await
            .send(&record)
            .await
            .map_err(OverlayError::ControlChannel)?;
    }
}

fn link_closed_cleanly(err: &StreamingError) -> bool {
    matches!(
        err,
        StreamingError::Closed {
            state: FrameState::Start1
        }
    )
}

/// Outbound half of the forwarding engine.
///
/// Owns the write side of every neighbor link. A link that fails a write is
/// marked dead and skipped afterwards; other links are unaffected.
pub struct Dispatcher<W> {
    links: NeighborTable<StreamSender<W>>,
    dead: DeadLinks,
}

impl<W: AsyncWrite + Unpin> Dispatcher<W> {
    pub fn new(links: NeighborTable<StreamSender<W>>, dead: DeadLinks) -> Self {
        Self { links, dead }
    }

    /// Forward one control record; returns how many neighbors were sent to.
    ///
    /// An unknown next hop is fatal: it means the service process has a
    /// different view of the neighbors than this node.
    pub async fn dispatch(&mut self, record: ControlRecord) -> Result<usize> {
        match record.next_hop() {
            NextHop::Broadcast => {
                // Encoded once so every neighbor gets identical bytes.
                let frame = encode_frame(&record.packet);
                let mut sent = 0;
                for (id, link) in self.links.bound_mut() {
                    if self.dead.is_dead(id) {
                        continue;
                    }
                    match link.send_encoded(&frame).await {
                        Ok(()) => sent += 1,
                        Err(err) => {
                            warn!(
                                neighbor = %id,
                                error = %err,
                                "broadcast send failed, link marked dead"
                            );
                            self.dead.mark(id);
                        }
                    }
                }
                debug!(sent, "broadcast packet");
                Ok(sent)
            }
            NextHop::Node(id) => {
                let link = self
                    .links
                    .connection_mut(id)
                    .map_err(|_| OverlayError::UnresolvedNextHop(id))?;
                if self.dead.is_dead(id) {
                    debug!(neighbor = %id, "dropping packet for dead link");
                    return Ok(0);
                }
                match link.send(&record.packet).await {
                    Ok(()) => Ok(1),
                    Err(err) => {
                        warn!(neighbor = %id, error = %err, "send failed, link marked dead");
                        self.dead.mark(id);
                        Ok(0)
                    }
                }
            }
        }
    }

    /// Dispatch records from the service process until the control channel
    /// fails or a next hop cannot be resolved.
    pub async fn run<R>(mut self, mut control: StreamReceiver<R>) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let record: ControlRecord = control
                .recv()
                .await
                .map_err(OverlayError::ControlChannel)?;
            self.dispatch(record).await?;
        }
    }

    pub fn links(&self) -> &NeighborTable<StreamSender<W>> {
        &self.links
    }

    pub fn into_links(self) -> NeighborTable<StreamSender<W>> {
        self.links
    }
}

/// Running forwarding workers of one node.
pub struct ForwardingEngine {
    relays: JoinSet<(NodeId, Result<()>)>,
    dispatcher: Option<JoinHandle<Result<()>>>,
    dead: DeadLinks,
}

impl ForwardingEngine {
    /// Split every neighbor connection and the control connection, then start
    /// one relay per neighbor and the dispatcher.
    pub fn start(table: NeighborTable<TcpStream>, control: TcpStream) -> Self {
        let (writers, readers) = table.split(|stream| {
            let (read, write): (OwnedReadHalf, OwnedWriteHalf) = stream.into_split();
            (StreamSender::new(write), StreamReceiver::new(read))
        });
        let (control_read, control_write) = control.into_split();
        let shared: SharedControl<OwnedWriteHalf> =
            Arc::new(AsyncMutex::new(StreamSender::new(control_write)));
        let dead = DeadLinks::new();

        let mut relays = JoinSet::new();
        for (id, link) in readers {
            let control = Arc::clone(&shared);
            let links = dead.clone();
            let handle =
                relays.spawn(async move { (id, relay_inbound(id, link, control, links).await) });
            dead.watch_relay(id, handle);
        }
        info!(relays = relays.len(), "forwarding engine started");

        let dispatcher = Dispatcher::new(writers, dead.clone());
        let dispatcher = tokio::spawn(dispatcher.run(StreamReceiver::new(control_read)));

        Self {
            relays,
            dispatcher: Some(dispatcher),
            dead,
        }
    }

    pub fn dead_links(&self) -> &DeadLinks {
        &self.dead
    }

    /// Serve until the dispatcher stops or a relay loses the control channel.
    ///
    /// Other relay exits are logged and otherwise ignored.
    pub async fn serve(&mut self) -> Result<()> {
        let Some(dispatcher) = self.dispatcher.as_mut() else {
            return Ok(());
        };
        let result = loop {
            tokio::select! {
                result = &mut *dispatcher => break result,
                Some(joined) = self.relays.join_next() => match joined {
                    Ok((id, Err(err @ OverlayError::ControlChannel(_)))) => {
                        warn!(neighbor = %id, error = %err, "relay lost the control channel");
                        dispatcher.abort();
                        break Ok(Err(err));
                    }
                    Ok((id, Ok(()))) => info!(neighbor = %id, "relay finished"),
                    Ok((id, Err(err))) => warn!(neighbor = %id, error = %err, "relay stopped"),
                    Err(err) if err.is_cancelled() => debug!("relay of a dead link cancelled"),
                    Err(err) => warn!(error = %err, "relay worker failed"),
                },
            }
        };
        self.dispatcher = None;
        result?
    }

    /// Stop every worker; dropping their halves closes each connection once.
    pub async fn shutdown(mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
            let _ = dispatcher.await;
        }
        let relays = self.relays.len();
        self.relays.shutdown().await;
        info!(relays, "forwarding engine stopped");
    }
}
