//! Decoder for the length-prefixed, CRC-checked binary event-stream framing
//! used by streaming Bedrock runtime responses.
//!
//! Frames come from a [`FrameSource`]: a fully buffered body is read through
//! the seekable [`FrameReader`], a live response body through the forward-only
//! [`FrameScanner`]. Both sit on the `aws-smithy-eventstream` frame decoder.
//! Payloads are left as opaque bytes.

pub mod error;
pub mod frame;
pub mod reader;
pub mod scanner;
pub mod source;

pub use aws_smithy_types::event_stream::HeaderValue;
pub use error::FrameError;
pub use frame::{decode_frame, encode_frame, event_frame, exception_frame, Frame};
pub use reader::FrameReader;
pub use scanner::FrameScanner;
pub use source::{ByteStream, FrameSource, FrameStream};
