//! Frame encoding and the receive state machine.
//!
//! # Algorithm
//!
//! Sending writes the start marker, the full record and the end marker as
//! one contiguous buffer. Receiving walks [`FrameState`]:
//!
//! 1. `Start1`: read one byte, skip it unless it is `!`
//! 2. `Start2`: the next byte must be `&`
//! 3. `Body`: read exactly `R::SIZE` bytes, across as many reads as it takes
//! 4. `End1` / `Accept`: the next two bytes must be `!` and `#`
//!
//! Only a fully accepted frame is decoded and returned.

use crate::error::StreamingError;
use crate::protocol::{frame_len, FrameState, END_MARKER, START_MARKER};
use bytes::{BufMut, Bytes, BytesMut};
use corelib::WireRecord;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// Encode `record` into a complete frame.
pub fn encode_frame<R: WireRecord>(record: &R) -> Bytes {
    let mut buf = BytesMut::with_capacity(frame_len(R::SIZE));
    buf.put_slice(&START_MARKER);
    let body = buf.len();
    buf.resize(body + R::SIZE, 0);
    record.encode(&mut buf[body..]);
    buf.put_slice(&END_MARKER);
    buf.freeze()
}

/// Write an already encoded frame.
pub async fn write_encoded<W>(writer: &mut W, frame: &[u8]) -> Result<(), StreamingError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await.map_err(StreamingError::Write)?;
    writer.flush().await.map_err(StreamingError::Write)
}

/// Frame and write one record.
pub async fn write_frame<W, R>(writer: &mut W, record: &R) -> Result<(), StreamingError>
where
    W: AsyncWrite + Unpin,
    R: WireRecord,
{
    let frame = encode_frame(record);
    write_encoded(writer, &frame).await
}

async fn read_byte<Rd>(reader: &mut Rd, state: FrameState) -> Result<u8, StreamingError>
where
    Rd: AsyncRead + Unpin,
{
    reader
        .read_u8()
        .await
        .map_err(|e| StreamingError::read(state, e))
}

async fn expect_byte<Rd>(
    reader: &mut Rd,
    state: FrameState,
    expected: u8,
) -> Result<(), StreamingError>
where
    Rd: AsyncRead + Unpin,
{
    let found = read_byte(reader, state).await?;
    if found != expected {
        debug!(
            %state,
            found = %char::from(found).escape_default(),
            expected = %char::from(expected).escape_default(),
            "framing violation"
        );
        return Err(StreamingError::UnexpectedByte {
            state,
            expected,
            found,
        });
    }
    Ok(())
}

/// Read one framed record.
///
/// Blocks until a whole frame has been accepted or the stream fails.
pub async fn read_frame<Rd, R>(reader: &mut Rd) -> Result<R, StreamingError>
where
    Rd: AsyncRead + Unpin,
    R: WireRecord,
{
    let mut state = FrameState::Start1;
    let mut body = vec![0u8; R::SIZE];
    let mut skipped = 0usize;

    loop {
        state = match state {
            FrameState::Start1 => {
                if read_byte(reader, state).await? == START_MARKER[0] {
                    FrameState::Start2
                } else {
                    skipped += 1;
                    FrameState::Start1
                }
            }
            FrameState::Start2 => {
                expect_byte(reader, state, START_MARKER[1]).await?;
                FrameState::Body
            }
            FrameState::Body => {
                reader
                    .read_exact(&mut body)
                    .await
                    .map_err(|e| StreamingError::read(state, e))?;
                FrameState::End1
            }
            FrameState::End1 => {
                expect_byte(reader, state, END_MARKER[0]).await?;
                FrameState::Accept
            }
            FrameState::Accept => {
                expect_byte(reader, state, END_MARKER[1]).await?;
                if skipped > 0 {
                    trace!(skipped, "skipped noise before frame");
                }
                return Ok(R::decode(&body)?);
            }
        };
    }
}
