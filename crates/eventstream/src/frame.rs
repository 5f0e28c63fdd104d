use std::collections::BTreeMap;

use aws_smithy_eventstream::frame::{write_message_to, DecodedFrame, MessageFrameDecoder};
use aws_smithy_types::event_stream::{Header, HeaderValue, Message};
use bytes::Bytes;

use crate::error::FrameError;

/// total_len (4) + headers_len (4) + prelude crc (4).
pub const PRELUDE_LEN: usize = 12;
/// Prelude plus the trailing message crc.
pub const MIN_FRAME_LEN: usize = PRELUDE_LEN + 4;
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

pub const EVENT_TYPE: &str = ":event-type";
pub const MESSAGE_TYPE: &str = ":message-type";
pub const EXCEPTION_TYPE: &str = ":exception-type";
pub const ERROR_CODE: &str = ":error-code";
pub const CONTENT_TYPE: &str = ":content-type";

/// One decoded event-stream message.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// `:exception-type` or `:error-code` for exception and error frames,
    /// falling back to `:event-type`, which is what plain events carry.
    pub event_type: String,
    pub headers: BTreeMap<String, HeaderValue>,
    pub payload: Bytes,
}

impl Frame {
    fn from_message(message: Message) -> Self {
        let headers: BTreeMap<String, HeaderValue> = message
            .headers()
            .iter()
            .map(|h| (h.name().as_str().to_string(), h.value().clone()))
            .collect();
        let event_type = resolve_event_type(&headers);
        Self {
            event_type,
            headers,
            payload: message.payload().clone(),
        }
    }

    /// String value of a header; non-string headers read as `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(header_str)
    }

    pub fn header_value(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// `event`, `exception` or `error`. Frames without the header are events.
    pub fn message_type(&self) -> &str {
        self.header(MESSAGE_TYPE).unwrap_or("event")
    }

    pub fn is_exception(&self) -> bool {
        matches!(self.message_type(), "exception" | "error")
    }

    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

fn header_str(value: &HeaderValue) -> Option<&str> {
    value.as_string().ok().map(|s| s.as_str())
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Total length announced by a prelude, validating its checksum and bounds.
///
/// The frame decoder only checks the prelude once the whole message is
/// buffered, so a corrupt length would otherwise stall a live stream.
/// Returns `Ok(None)` when fewer than [`PRELUDE_LEN`] bytes are available.
pub fn peek_frame_len(buf: &[u8]) -> Result<Option<usize>, FrameError> {
    if buf.len() < PRELUDE_LEN {
        return Ok(None);
    }

    let total_len = read_u32(buf, 0) as usize;
    let headers_len = read_u32(buf, 4) as usize;
    let expected = read_u32(buf, 8);
    let computed = crc32fast::hash(&buf[..8]);
    if expected != computed {
        return Err(FrameError::PreludeChecksum { expected, computed });
    }

    if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&total_len) {
        return Err(FrameError::Length(format!(
            "total length {total_len} outside {MIN_FRAME_LEN}..={MAX_FRAME_LEN}"
        )));
    }
    if headers_len > total_len - MIN_FRAME_LEN {
        return Err(FrameError::Length(format!(
            "headers length {headers_len} does not fit in a {total_len}-byte frame"
        )));
    }

    Ok(Some(total_len))
}

/// Decode one frame from the front of `buf`.
///
/// Returns the frame and the number of bytes it occupied, or `Ok(None)` when
/// `buf` does not yet hold a complete frame.
pub fn decode_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>, FrameError> {
    let Some(total_len) = peek_frame_len(buf)? else {
        return Ok(None);
    };
    if buf.len() < total_len {
        return Ok(None);
    }

    let mut message_bytes = &buf[..total_len];
    match MessageFrameDecoder::new().decode_frame(&mut message_bytes)? {
        DecodedFrame::Complete(message) => {
            let frame = Frame::from_message(message);
            tracing::trace!(event_type = %frame.event_type, len = total_len, "decoded frame");
            Ok(Some((frame, total_len)))
        }
        DecodedFrame::Incomplete => Err(FrameError::Truncated {
            remaining: buf.len(),
        }),
    }
}

fn resolve_event_type(headers: &BTreeMap<String, HeaderValue>) -> String {
    let get = |name: &str| headers.get(name).and_then(header_str);
    let specific = match get(MESSAGE_TYPE) {
        Some("exception") => get(EXCEPTION_TYPE),
        Some("error") => get(ERROR_CODE),
        _ => None,
    };
    specific
        .or_else(|| get(EVENT_TYPE))
        .unwrap_or_default()
        .to_string()
}

/// Encode headers and payload as a complete frame with both checksums.
pub fn encode_frame<'a, I>(headers: I, payload: &[u8]) -> Result<Bytes, FrameError>
where
    I: IntoIterator<Item = (&'a str, HeaderValue)>,
{
    let mut message = Message::new(Bytes::copy_from_slice(payload));
    for (name, value) in headers {
        message = message.add_header(Header::new(name.to_string(), value));
    }

    let mut buf = Vec::new();
    write_message_to(&message, &mut buf)?;
    Ok(Bytes::from(buf))
}

fn string_header(value: &str) -> HeaderValue {
    HeaderValue::String(value.to_string().into())
}

/// An `event` frame with a JSON payload.
pub fn event_frame(event_type: &str, payload: &[u8]) -> Result<Bytes, FrameError> {
    encode_frame(
        [
            (MESSAGE_TYPE, string_header("event")),
            (EVENT_TYPE, string_header(event_type)),
            (CONTENT_TYPE, string_header("application/json")),
        ],
        payload,
    )
}

/// An `exception` frame, as sent when the service fails mid-stream.
pub fn exception_frame(exception_type: &str, payload: &[u8]) -> Result<Bytes, FrameError> {
    encode_frame(
        [
            (MESSAGE_TYPE, string_header("exception")),
            (EXCEPTION_TYPE, string_header(exception_type)),
            (CONTENT_TYPE, string_header("application/json")),
        ],
        payload,
    )
}
