use thiserror::Error;

/// Errors raised while decoding event-stream frames.
///
/// Every variant except [`FrameError::Io`] means the byte stream itself is
/// corrupt; decoding stops at the first error either way.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("prelude checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    PreludeChecksum { expected: u32, computed: u32 },

    #[error("invalid frame length: {0}")]
    Length(String),

    /// Message checksum, header block or payload rejected by the frame decoder.
    #[error("invalid frame: {0}")]
    Decode(#[from] aws_smithy_eventstream::error::Error),

    #[error("byte stream ended inside a frame ({remaining} bytes left over)")]
    Truncated { remaining: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True when the bytes themselves are bad, as opposed to the source failing.
    pub fn is_corruption(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}
