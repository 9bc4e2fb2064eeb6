//! Sending half of a framed link.

use crate::codec::{encode_frame, write_encoded};
use crate::error::StreamingError;
use bytes::Bytes;
use corelib::WireRecord;
use tokio::io::AsyncWrite;

/// Writes framed records to a byte stream.
///
/// Each call writes one whole frame before returning, so a sender shared
/// behind a lock never interleaves bytes of different frames.
#[derive(Debug)]
pub struct StreamSender<W> {
    inner: W,
    frames_sent: u64,
}

impl<W: AsyncWrite + Unpin> StreamSender<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            frames_sent: 0,
        }
    }

    /// Frame and send one record.
    pub async fn send<R: WireRecord>(&mut self, record: &R) -> Result<(), StreamingError> {
        let frame = encode_frame(record);
        self.send_encoded(&frame).await
    }

    /// Send a frame produced by [`encode_frame`].
    ///
    /// Lets a caller encode once and fan the same bytes out to many links.
    pub async fn send_encoded(&mut self, frame: &Bytes) -> Result<(), StreamingError> {
        write_encoded(&mut self.inner, frame).await?;
        self.frames_sent += 1;
        Ok(())
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }
}
