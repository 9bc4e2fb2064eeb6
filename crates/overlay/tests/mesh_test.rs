//! Multi-node tests over real TCP.
//!
//! Every node binds its own `127.0.0.<id>` address on a shared link port
//! (Linux routes all of `127/8` to loopback), so identities resolve from
//! source addresses exactly as they do on a real subnet.
//!
//! # Test Strategy
//!
//! 1. **Establishment**: complete mesh, one connection per pair, dial direction
//! 2. **Failures**: unreachable neighbor, wrong-side initiator
//! 3. **Scenario**: three nodes forwarding through their service processes

use corelib::network::Subnet;
use corelib::topology::StaticTopology;
use corelib::{ControlRecord, NeighborTable, NextHop, NodeId, Packet, PacketType};
use overlay::{establish, OverlayConfig, OverlayError, OverlayNode};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use streaming::{StreamReceiver, StreamSender};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::timeout;

const TRIANGLE: &str = "n_1 n_2 5\nn_2 n_3 3\nn_1 n_3 8\n";
const FULL_FOUR: &str = "n_1 n_2 1\nn_1 n_3 1\nn_1 n_4 1\nn_2 n_3 1\nn_2 n_4 1\nn_3 n_4 1\n";
const DEADLINE: Duration = Duration::from_secs(15);

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn loopback(id: u32) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, id as u8))
}

fn topology(text: &str, me: u32, port: u16) -> StaticTopology {
    StaticTopology::parse(text, NodeId(me), Subnet::new(Ipv4Addr::new(127, 0, 0, 0)))
        .unwrap()
        .with_port(port)
}

fn config(me: u32, port: u16) -> OverlayConfig {
    OverlayConfig::default()
        .with_link_listen(SocketAddr::new(loopback(me), port))
        .with_startup_delay(Duration::from_millis(300))
        .with_dial_from(loopback(me))
}

async fn establish_all(
    text: &'static str,
    nodes: &[u32],
    port: u16,
) -> Vec<NeighborTable<TcpStream>> {
    let handles: Vec<_> = nodes
        .iter()
        .map(|&me| {
            tokio::spawn(async move {
                let topo = topology(text, me, port);
                establish(&topo, &config(me, port)).await
            })
        })
        .collect();

    let mut tables = Vec::new();
    for handle in handles {
        let table = timeout(DEADLINE, handle).await.unwrap().unwrap().unwrap();
        tables.push(table);
    }
    tables
}

// ============================================================================
// Establishment
// ============================================================================

#[tokio::test]
async fn test_full_mesh_is_complete() {
    let port = free_port();
    let nodes = [1, 2, 3, 4];
    let tables = establish_all(FULL_FOUR, &nodes, port).await;

    for table in &tables {
        assert!(table.is_complete(), "node {} incomplete", table.my_node_id());
        assert_eq!(table.len(), 3);

        // Every connection is distinct.
        let mut ends: Vec<(SocketAddr, SocketAddr)> = table
            .iter()
            .map(|e| {
                let conn = e.connection().unwrap();
                (conn.local_addr().unwrap(), conn.peer_addr().unwrap())
            })
            .collect();
        ends.sort();
        ends.dedup();
        assert_eq!(ends.len(), 3);
    }
}

#[tokio::test]
async fn test_exactly_one_initiator_per_pair() {
    let port = free_port();
    let nodes = [1, 2, 3, 4];
    let tables = establish_all(FULL_FOUR, &nodes, port).await;
    let by_id = |id: u32| tables.iter().find(|t| t.my_node_id() == NodeId(id)).unwrap();

    for a in 1..=4u32 {
        for b in (a + 1)..=4u32 {
            let at_a = by_id(a).lookup(NodeId(b)).unwrap().connection().unwrap();
            let at_b = by_id(b).lookup(NodeId(a)).unwrap().connection().unwrap();

            // Both ends describe the same TCP connection.
            assert_eq!(at_a.local_addr().unwrap(), at_b.peer_addr().unwrap());
            assert_eq!(at_a.peer_addr().unwrap(), at_b.local_addr().unwrap());

            // The greater identity dialed, the lower one accepted.
            assert_eq!(at_a.local_addr().unwrap(), SocketAddr::new(loopback(a), port));
            assert_eq!(at_b.local_addr().unwrap().ip(), loopback(b));
        }
    }
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_unreachable_neighbor_is_connect_error() {
    let port = free_port();
    // Node 1 never starts, so node 2's dial is refused.
    let topo = topology("n_1 n_2 1\n", 2, port);
    let cfg = config(2, port).with_startup_delay(Duration::ZERO);

    let err = timeout(DEADLINE, establish(&topo, &cfg)).await.unwrap().unwrap_err();
    match err {
        OverlayError::Connect { id, addr, .. } => {
            assert_eq!(id, NodeId(1));
            assert_eq!(addr, SocketAddr::new(loopback(1), port));
        }
        other => panic!("expected connect error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_lower_identity_initiator_rejected() {
    let port = free_port();
    let topo = topology("n_1 n_2 1\n", 1, port);
    let cfg = config(1, port);

    let node = tokio::spawn(async move { establish(&topo, &cfg).await });

    // Dial node 1 from its own address: identity 1 is not greater than 1.
    let target = SocketAddr::new(loopback(1), port);
    let mut attempts = 0;
    let _stream = loop {
        match TcpStream::connect(target).await {
            Ok(stream) => break stream,
            Err(_) if attempts < 100 => {
                attempts += 1;
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Err(err) => panic!("node 1 never listened: {}", err),
        }
    };

    let err = timeout(DEADLINE, node).await.unwrap().unwrap().unwrap_err();
    assert!(matches!(
        err,
        OverlayError::UnexpectedInitiator { id: NodeId(1), me: NodeId(1) }
    ));
}

// ============================================================================
// Scenario: three nodes with service processes
// ============================================================================

struct Service {
    tx: StreamSender<tokio::net::tcp::OwnedWriteHalf>,
    rx: StreamReceiver<tokio::net::tcp::OwnedReadHalf>,
}

async fn connect_service(port: u16) -> Service {
    for _ in 0..300 {
        if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)).await {
            let (read, write) = stream.into_split();
            return Service {
                tx: StreamSender::new(write),
                rx: StreamReceiver::new(read),
            };
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("control port {} never opened", port);
}

#[tokio::test]
async fn test_triangle_forwarding() {
    let link_port = free_port();
    let mut nodes = Vec::new();
    let mut control_ports = Vec::new();

    for me in 1..=3u32 {
        let control_port = free_port();
        control_ports.push(control_port);
        let topo: Arc<dyn corelib::Topology> = Arc::new(topology(TRIANGLE, me, link_port));
        let cfg = config(me, link_port)
            .with_control_listen(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), control_port));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let node = OverlayNode::new(topo, cfg);
        let handle = tokio::spawn(node.run(async move {
            let _ = stop_rx.await;
        }));
        nodes.push((stop_tx, handle));
    }

    let mut services = Vec::new();
    for port in &control_ports {
        services.push(timeout(DEADLINE, connect_service(*port)).await.unwrap());
    }

    // Node 1 sends directly to node 3.
    let unicast = Packet::new(NodeId(1), NodeId(3), PacketType::Sip, b"one to three").unwrap();
    services[0]
        .tx
        .send(&ControlRecord::outbound(unicast.clone(), NextHop::Node(NodeId(3))))
        .await
        .unwrap();
    let delivered: ControlRecord = timeout(DEADLINE, services[2].rx.recv()).await.unwrap().unwrap();
    assert_eq!(delivered.origin(), NodeId(1));
    assert_eq!(delivered.packet, unicast);

    // Node 2 broadcasts a route update; both other nodes get exactly it.
    let update = Packet::new(NodeId(2), NodeId(9999), PacketType::RouteUpdate, &[5, 3]).unwrap();
    services[1]
        .tx
        .send(&ControlRecord::outbound(update.clone(), NextHop::Broadcast))
        .await
        .unwrap();
    for idx in [0, 2] {
        let got: ControlRecord = timeout(DEADLINE, services[idx].rx.recv()).await.unwrap().unwrap();
        assert_eq!(got.origin(), NodeId(2));
        assert_eq!(got.packet, update);
    }

    for (stop, handle) in nodes {
        stop.send(()).unwrap();
        timeout(DEADLINE, handle).await.unwrap().unwrap().unwrap();
    }
}
