//! Wire constants and receive states of the framing protocol.

use std::fmt;

/// Two bytes that open every frame.
pub const START_MARKER: [u8; 2] = *b"!&";

/// Two bytes that close every frame.
pub const END_MARKER: [u8; 2] = *b"!#";

/// Bytes a frame adds around its record.
pub const FRAME_OVERHEAD: usize = START_MARKER.len() + END_MARKER.len();

/// Encoded length of a frame carrying a record of `record_size` bytes.
#[inline]
pub const fn frame_len(record_size: usize) -> usize {
    record_size + FRAME_OVERHEAD
}

/// Receive state machine.
///
/// ```text
/// Start1 --'!'--> Start2 --'&'--> Body --SIZE bytes--> End1 --'!'--> Accept --'#'--> record
///   ^  |
///   +--+ any other byte (noise)
/// ```
///
/// Only `Start1` tolerates unexpected bytes; a mismatch anywhere else aborts
/// the receive.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum FrameState {
    Start1,
    Start2,
    Body,
    End1,
    Accept,
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start1 => write!(f, "start1"),
            Self::Start2 => write!(f, "start2"),
            Self::Body => write!(f, "body"),
            Self::End1 => write!(f, "end1"),
            Self::Accept => write!(f, "accept"),
        }
    }
}
