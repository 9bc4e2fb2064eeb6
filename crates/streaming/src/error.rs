//! Errors of the framing protocol.

use crate::protocol::FrameState;
use std::io;

/// Errors that can occur while sending or receiving frames.
///
/// Any of them leaves the stream at an unknown position; callers treat the
/// link as broken.
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    /// A marker byte did not match.
    #[error("unexpected byte {found:#04x} in {state} state, expected {expected:#04x}")]
    UnexpectedByte {
        state: FrameState,
        expected: u8,
        found: u8,
    },

    /// The peer closed the stream before a complete frame arrived.
    #[error("stream closed in {state} state")]
    Closed { state: FrameState },

    /// Reading from the stream failed.
    #[error("read failed in {state} state")]
    Read {
        state: FrameState,
        #[source]
        source: io::Error,
    },

    /// Writing a frame failed or was cut short.
    #[error("failed to write frame")]
    Write(#[source] io::Error),

    /// The body bytes were not a valid record.
    #[error(transparent)]
    Record(#[from] corelib::Error),
}

impl StreamingError {
    pub(crate) fn read(state: FrameState, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::UnexpectedEof {
            StreamingError::Closed { state }
        } else {
            StreamingError::Read { state, source }
        }
    }

    /// True when the peer went away rather than sending garbage.
    pub fn is_closed(&self) -> bool {
        matches!(self, StreamingError::Closed { .. })
    }
}
