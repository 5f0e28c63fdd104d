use bytes::{Buf, Bytes, BytesMut};
use futures::{Stream, StreamExt};

use crate::error::FrameError;
use crate::frame::{decode_frame, Frame};

/// Forward-only frame decoder over a chunked byte stream.
///
/// Chunk boundaries are arbitrary: a frame may span many chunks and a chunk
/// may hold many frames. Bytes are buffered only until the frame they belong
/// to is complete.
pub struct FrameScanner<S> {
    inner: S,
    buffer: BytesMut,
    done: bool,
}

impl<S> FrameScanner<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Unpin,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
            done: false,
        }
    }

    /// Next complete frame, `Ok(None)` at a clean end of stream.
    ///
    /// After an error the scanner is finished and keeps returning `Ok(None)`.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        if self.done {
            return Ok(None);
        }
        let result = self.scan().await;
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }

    async fn scan(&mut self) -> Result<Option<Frame>, FrameError> {
        loop {
            if let Some((frame, used)) = decode_frame(&self.buffer)? {
                self.buffer.advance(used);
                return Ok(Some(frame));
            }

            match self.inner.next().await {
                Some(chunk) => self.buffer.extend_from_slice(&chunk?),
                None if self.buffer.is_empty() => return Ok(None),
                None => {
                    return Err(FrameError::Truncated {
                        remaining: self.buffer.len(),
                    })
                }
            }
        }
    }
}
