//! Fixed-size records carried on every link.
//!
//! The framing layer moves records of a pre-agreed size, so every record type
//! implements [`WireRecord`] with a constant `SIZE` and explicit, field-by-field
//! encode/decode. Integers are little-endian.
//!
//! # Layout
//!
//! ```text
//! Packet (1500 bytes)
//!   src: u32 | dest: u32 | length: u16 | type: u16 | data: [u8; 1488]
//!
//! ControlRecord (1504 bytes)
//!   packet: Packet | node: u32
//! ```
//!
//! The packet contents belong to the service process; the overlay core only
//! moves them. `length` is whatever the sender put there and is never
//! validated against the data area.

use crate::error::{Error, Result};
use crate::node::{NextHop, NodeId};
use std::fmt;

/// Size of the packet header in bytes.
pub const HEADER_SIZE: usize = 12;

/// Capacity of the packet data area in bytes.
pub const MAX_PAYLOAD: usize = 1488;

/// Total size of an encoded packet.
pub const PACKET_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD;

/// Total size of an encoded control record.
pub const CONTROL_RECORD_SIZE: usize = PACKET_SIZE + 4;

/// A record with a fixed encoded size.
pub trait WireRecord: Sized + Send + 'static {
    /// Exact number of bytes produced by `encode` and consumed by `decode`.
    const SIZE: usize;

    /// Write the record into `buf`, which is exactly `SIZE` bytes long.
    fn encode(&self, buf: &mut [u8]);

    /// Rebuild a record from exactly `SIZE` bytes.
    fn decode(buf: &[u8]) -> Result<Self>;

    /// Convenience: encode into a fresh buffer.
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        self.encode(&mut buf);
        buf
    }
}

fn check_len(buf: &[u8], expected: usize) -> Result<()> {
    if buf.len() != expected {
        return Err(Error::InvalidRecord(format!(
            "expected {} bytes, got {}",
            expected,
            buf.len()
        )));
    }
    Ok(())
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(&buf[at..at + 2]);
    u16::from_le_bytes(raw)
}

/// Packet types used by the service process.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum PacketType {
    RouteUpdate,
    Sip,
    /// Any value the core does not know; carried verbatim.
    Other(u16),
}

impl From<u16> for PacketType {
    fn from(raw: u16) -> Self {
        match raw {
            1 => PacketType::RouteUpdate,
            2 => PacketType::Sip,
            other => PacketType::Other(other),
        }
    }
}

impl From<PacketType> for u16 {
    fn from(kind: PacketType) -> Self {
        match kind {
            PacketType::RouteUpdate => 1,
            PacketType::Sip => 2,
            PacketType::Other(raw) => raw,
        }
    }
}

/// Header fields of a packet.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PacketHeader {
    pub src: NodeId,
    pub dest: NodeId,
    /// Number of meaningful bytes in the data area.
    pub length: u16,
    pub kind: PacketType,
}

/// A packet exchanged between service processes across the mesh.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    data: Box<[u8; MAX_PAYLOAD]>,
}

impl Packet {
    /// Build a packet carrying `payload`.
    ///
    /// Fails if the payload does not fit into the data area.
    pub fn new(src: NodeId, dest: NodeId, kind: PacketType, payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD {
            return Err(Error::InvalidRecord(format!(
                "payload of {} bytes exceeds capacity of {}",
                payload.len(),
                MAX_PAYLOAD
            )));
        }
        let mut data = Box::new([0u8; MAX_PAYLOAD]);
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            header: PacketHeader {
                src,
                dest,
                // payload.len() <= MAX_PAYLOAD < u16::MAX
                length: payload.len() as u16,
                kind,
            },
            data,
        })
    }

    /// Meaningful payload bytes, as declared by the header length.
    pub fn payload(&self) -> &[u8] {
        let len = usize::from(self.header.length).min(MAX_PAYLOAD);
        &self.data[..len]
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("header", &self.header)
            .field("payload_len", &self.payload().len())
            .finish()
    }
}

impl WireRecord for Packet {
    const SIZE: usize = PACKET_SIZE;

    fn encode(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.header.src.get().to_le_bytes());
        buf[4..8].copy_from_slice(&self.header.dest.get().to_le_bytes());
        buf[8..10].copy_from_slice(&self.header.length.to_le_bytes());
        buf[10..12].copy_from_slice(&u16::from(self.header.kind).to_le_bytes());
        buf[HEADER_SIZE..PACKET_SIZE].copy_from_slice(&self.data[..]);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        check_len(buf, PACKET_SIZE)?;
        let header = PacketHeader {
            src: NodeId(read_u32(buf, 0)),
            dest: NodeId(read_u32(buf, 4)),
            length: read_u16(buf, 8),
            kind: PacketType::from(read_u16(buf, 10)),
        };
        let mut data = Box::new([0u8; MAX_PAYLOAD]);
        data.copy_from_slice(&buf[HEADER_SIZE..PACKET_SIZE]);
        Ok(Self { header, data })
    }
}

/// Record exchanged with the local service process.
///
/// Toward the core the trailing identity is the next hop; toward the service
/// process it is the neighbor the packet arrived from.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ControlRecord {
    pub packet: Packet,
    node: u32,
}

impl ControlRecord {
    /// Outbound request: forward `packet` to `next_hop`.
    pub fn outbound(packet: Packet, next_hop: NextHop) -> Self {
        Self {
            packet,
            node: next_hop.to_wire(),
        }
    }

    /// Inbound delivery: `packet` arrived from neighbor `origin`.
    pub fn inbound(packet: Packet, origin: NodeId) -> Self {
        Self {
            packet,
            node: origin.get(),
        }
    }

    pub fn next_hop(&self) -> NextHop {
        NextHop::from_wire(self.node)
    }

    pub fn origin(&self) -> NodeId {
        NodeId(self.node)
    }
}

impl WireRecord for ControlRecord {
    const SIZE: usize = CONTROL_RECORD_SIZE;

    fn encode(&self, buf: &mut [u8]) {
        self.packet.encode(&mut buf[..PACKET_SIZE]);
        buf[PACKET_SIZE..CONTROL_RECORD_SIZE].copy_from_slice(&self.node.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        check_len(buf, CONTROL_RECORD_SIZE)?;
        let packet = Packet::decode(&buf[..PACKET_SIZE])?;
        Ok(Self {
            packet,
            node: read_u32(buf, PACKET_SIZE),
        })
    }
}
