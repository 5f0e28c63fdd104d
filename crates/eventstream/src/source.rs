use std::io::Cursor;

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::FrameError;
use crate::frame::Frame;
use crate::reader::FrameReader;
use crate::scanner::FrameScanner;

pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;
pub type FrameStream = BoxStream<'static, Result<Frame, FrameError>>;

/// Where frame bytes come from.
pub enum FrameSource {
    /// The whole body is already in memory and can be seeked.
    Buffered(Bytes),
    /// A live body read chunk by chunk.
    Streaming(ByteStream),
}

impl FrameSource {
    pub fn is_seekable(&self) -> bool {
        matches!(self, Self::Buffered(_))
    }

    /// Lazily decode the source. The stream ends after the first error.
    pub fn into_frames(self) -> FrameStream {
        match self {
            Self::Buffered(bytes) => match FrameReader::new(Cursor::new(bytes)) {
                Ok(reader) => stream::iter(reader).boxed(),
                Err(e) => stream::once(async move { Err(e) }).boxed(),
            },
            Self::Streaming(body) => {
                stream::unfold(Some(FrameScanner::new(body)), |scanner| async move {
                    let mut scanner = scanner?;
                    match scanner.next_frame().await {
                        Ok(Some(frame)) => Some((Ok(frame), Some(scanner))),
                        Ok(None) => None,
                        Err(e) => Some((Err(e), None)),
                    }
                })
                .boxed()
            }
        }
    }
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Self::Streaming(_) => f.write_str("Streaming"),
        }
    }
}

impl From<Bytes> for FrameSource {
    fn from(bytes: Bytes) -> Self {
        Self::Buffered(bytes)
    }
}

impl From<ByteStream> for FrameSource {
    fn from(body: ByteStream) -> Self {
        Self::Streaming(body)
    }
}
