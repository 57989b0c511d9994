//! Event protocol: envelope, framing, and sinks.

pub mod encoder;
pub mod events;
pub mod sink;

pub use encoder::{decode_frame, encode_frame, sse_headers};
pub use events::*;
pub use sink::{frames, ChannelSink, EventEmitter, EventSink, SinkClosed};
