use std::io::{Read, Seek, SeekFrom};

use crate::error::FrameError;
use crate::frame::{decode_frame, peek_frame_len, Frame, PRELUDE_LEN};

/// Frame decoder over a seekable source.
///
/// The source length is known up front, so a frame whose announced length
/// runs past the end is reported as [`FrameError::Truncated`] without
/// attempting the read. [`FrameReader::rewind`] restarts decoding from the
/// first frame, which makes replaying a buffered response cheap.
pub struct FrameReader<R> {
    inner: R,
    start: u64,
    end: u64,
    pos: u64,
    failed: bool,
}

impl<R: Read + Seek> FrameReader<R> {
    pub fn new(mut inner: R) -> Result<Self, FrameError> {
        let start = inner.stream_position()?;
        let end = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(start))?;
        Ok(Self {
            inner,
            start,
            end,
            pos: start,
            failed: false,
        })
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.pos)
    }

    pub fn rewind(&mut self) -> Result<(), FrameError> {
        self.inner.seek(SeekFrom::Start(self.start))?;
        self.pos = self.start;
        self.failed = false;
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        let remaining = self.remaining() as usize;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < PRELUDE_LEN {
            return Err(FrameError::Truncated { remaining });
        }

        let mut buf = vec![0u8; PRELUDE_LEN];
        self.inner.read_exact(&mut buf)?;
        let total_len = peek_frame_len(&buf)?.unwrap_or(PRELUDE_LEN);
        if total_len > remaining {
            return Err(FrameError::Truncated { remaining });
        }

        buf.resize(total_len, 0);
        self.inner.read_exact(&mut buf[PRELUDE_LEN..])?;
        self.pos += total_len as u64;

        match decode_frame(&buf)? {
            Some((frame, _)) => Ok(Some(frame)),
            None => Err(FrameError::Truncated { remaining }),
        }
    }
}

impl<R: Read + Seek> Iterator for FrameReader<R> {
    type Item = Result<Frame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_frame() {
            Ok(frame) => frame.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
