//! Marker-delimited framing for fixed-size records.
//!
//! This crate provides the codec used on every link of the overlay:
//! - Neighbor-to-neighbor data channels carrying raw packets
//! - The local control channel to the service process
//!
//! On the wire every frame is `!&` + record + `!#`. The record size is agreed
//! in advance by both ends (see [`corelib::WireRecord`]), so the body is read
//! by exact byte count and marker-like bytes inside it are harmless.

pub mod codec;
pub mod error;
pub mod protocol;
pub mod receiver;
pub mod sender;

pub use error::StreamingError;
pub use protocol::{FrameState, END_MARKER, START_MARKER};
pub use receiver::StreamReceiver;
pub use sender::StreamSender;
