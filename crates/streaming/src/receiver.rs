//! Receiving half of a framed link.

use crate::codec::read_frame;
use crate::error::StreamingError;
use corelib::WireRecord;
use tokio::io::{AsyncRead, BufReader};

/// Reads framed records from a byte stream.
///
/// The stream is buffered so the byte-at-a-time marker states do not turn
/// into one syscall per byte. The receiver must own the stream for its whole
/// life, since buffered bytes belong to the next frame.
#[derive(Debug)]
pub struct StreamReceiver<R> {
    inner: BufReader<R>,
    frames_received: u64,
}

impl<R: AsyncRead + Unpin> StreamReceiver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            frames_received: 0,
        }
    }

    /// Block until one complete record has been received.
    pub async fn recv<T: WireRecord>(&mut self) -> Result<T, StreamingError> {
        let record = read_frame(&mut self.inner).await?;
        self.frames_received += 1;
        Ok(record)
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_frame;
    use crate::sender::StreamSender;
    use corelib::{NodeId, Packet, PacketType};
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_partial_reads_are_reassembled() {
        // A tiny pipe forces the body across many partial reads.
        let (mut tx, rx) = tokio::io::duplex(7);
        let original =
            Packet::new(NodeId(2), NodeId(1), PacketType::RouteUpdate, &[0x21; 300]).unwrap();
        let frame = encode_frame(&original);

        let writer = tokio::spawn(async move {
            for chunk in frame.chunks(5) {
                tx.write_all(chunk).await.unwrap();
            }
        });

        let mut receiver = StreamReceiver::new(rx);
        let decoded: Packet = receiver.recv().await.unwrap();
        writer.await.unwrap();

        assert_eq!(decoded, original);
        assert_eq!(receiver.frames_received(), 1);
    }

    #[tokio::test]
    async fn test_back_to_back_frames() {
        let (tx, rx) = tokio::io::duplex(64 * 1024);
        let mut sender = StreamSender::new(tx);
        let mut receiver = StreamReceiver::new(rx);

        let packets: Vec<Packet> = (0..5u8)
            .map(|i| Packet::new(NodeId(1), NodeId(2), PacketType::Sip, &[i; 10]).unwrap())
            .collect();
        for p in &packets {
            sender.send(p).await.unwrap();
        }
        assert_eq!(sender.frames_sent(), 5);

        for p in &packets {
            let got: Packet = receiver.recv().await.unwrap();
            assert_eq!(&got, p);
        }
    }

    #[tokio::test]
    async fn test_peer_close_reported() {
        let (tx, rx) = tokio::io::duplex(64);
        drop(tx);
        let mut receiver = StreamReceiver::new(rx);
        let err = receiver.recv::<Packet>().await.unwrap_err();
        assert!(err.is_closed());
    }
}
