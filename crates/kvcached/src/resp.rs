//! RESP2 frame codec
//!
//! Parses request frames incrementally from a connection buffer and encodes
//! replies into the outgoing buffer.

use std::io::Cursor;

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// Maximum bulk string size (512MB), the Redis limit
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Maximum number of array elements accepted in one frame
const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Upper bound on elements reserved from an array header before parsing
const PREALLOC_ARRAY_LEN: usize = 64;

/// Malformed input; the connection buffer cannot be resynchronised
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// First byte of a frame is not a RESP type marker
    #[error("unknown frame type '{0}'")]
    UnknownType(char),
    /// Length or integer line is not a valid number
    #[error("invalid number in frame header")]
    InvalidNumber,
    /// Negative length other than the -1 null marker
    #[error("invalid length {0}")]
    InvalidLength(i64),
    /// Bulk string over [`MAX_BULK_LEN`]
    #[error("bulk string too large: {0} bytes")]
    BulkTooLarge(usize),
    /// Array over [`MAX_ARRAY_LEN`]
    #[error("array too large: {0} elements")]
    ArrayTooLarge(usize),
    /// Bulk payload not followed by CRLF
    #[error("missing CRLF after bulk string")]
    MissingCrlf,
    /// Simple string or error line is not UTF-8
    #[error("invalid UTF-8 in simple string")]
    InvalidUtf8,
}

/// One RESP2 value
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `+OK\r\n`
    Simple(String),
    /// `-ERR message\r\n`
    Error(String),
    /// `:1000\r\n`
    Integer(i64),
    /// `$6\r\nfoobar\r\n`, or `$-1\r\n` for nil
    Bulk(Option<Vec<u8>>),
    /// `*2\r\n...`, or `*-1\r\n` for nil
    Array(Option<Vec<Frame>>),
}

impl Frame {
    /// `+OK`
    pub fn ok() -> Self {
        Frame::Simple("OK".to_string())
    }

    /// `-ERR <message>`
    pub fn err(message: impl std::fmt::Display) -> Self {
        Frame::Error(format!("ERR {}", message))
    }

    /// Bulk string holding `data`
    pub fn bulk(data: impl Into<Vec<u8>>) -> Self {
        Frame::Bulk(Some(data.into()))
    }

    /// Nil bulk string
    pub fn null() -> Self {
        Frame::Bulk(None)
    }

    /// Append the wire form of this frame to `dst`
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => put_line(dst, b'+', s.as_bytes()),
            Frame::Error(e) => put_line(dst, b'-', e.as_bytes()),
            Frame::Integer(i) => put_line(dst, b':', i.to_string().as_bytes()),
            Frame::Bulk(None) => dst.put_slice(b"$-1\r\n"),
            Frame::Bulk(Some(data)) => {
                put_line(dst, b'$', data.len().to_string().as_bytes());
                dst.put_slice(data);
                dst.put_slice(b"\r\n");
            }
            Frame::Array(None) => dst.put_slice(b"*-1\r\n"),
            Frame::Array(Some(items)) => {
                put_line(dst, b'*', items.len().to_string().as_bytes());
                for item in items {
                    item.encode(dst);
                }
            }
        }
    }

    /// Take one complete frame off the front of `buf`
    ///
    /// Returns `Ok(None)` and leaves `buf` untouched when more data is needed.
    pub fn parse(buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        if buf.is_empty() {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&buf[..]);
        match parse_frame(&mut cursor)? {
            Some(frame) => {
                let consumed = cursor.position() as usize;
                buf.advance(consumed);
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }

    /// Arguments of a command frame: an array of bulk strings
    pub fn into_command(self) -> Option<Vec<Vec<u8>>> {
        match self {
            Frame::Array(Some(items)) if !items.is_empty() => items
                .into_iter()
                .map(|item| match item {
                    Frame::Bulk(Some(data)) => Some(data),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }
}

fn put_line(dst: &mut BytesMut, marker: u8, body: &[u8]) {
    dst.put_u8(marker);
    dst.put_slice(body);
    dst.put_slice(b"\r\n");
}

fn parse_frame(cursor: &mut Cursor<&[u8]>) -> Result<Option<Frame>, ProtocolError> {
    if !cursor.has_remaining() {
        return Ok(None);
    }

    match cursor.get_u8() {
        b'+' => Ok(read_text(cursor)?.map(Frame::Simple)),
        b'-' => Ok(read_text(cursor)?.map(Frame::Error)),
        b':' => Ok(read_number(cursor)?.map(Frame::Integer)),
        b'$' => parse_bulk(cursor),
        b'*' => parse_array(cursor),
        other => Err(ProtocolError::UnknownType(other as char)),
    }
}

fn parse_bulk(cursor: &mut Cursor<&[u8]>) -> Result<Option<Frame>, ProtocolError> {
    let len = match read_length(cursor)? {
        Some(Some(len)) => len,
        Some(None) => return Ok(Some(Frame::Bulk(None))),
        None => return Ok(None),
    };

    if len > MAX_BULK_LEN {
        return Err(ProtocolError::BulkTooLarge(len));
    }
    if cursor.remaining() < len + 2 {
        return Ok(None);
    }

    let mut data = vec![0u8; len];
    cursor.copy_to_slice(&mut data);

    if cursor.get_u8() != b'\r' || cursor.get_u8() != b'\n' {
        return Err(ProtocolError::MissingCrlf);
    }

    Ok(Some(Frame::Bulk(Some(data))))
}

fn parse_array(cursor: &mut Cursor<&[u8]>) -> Result<Option<Frame>, ProtocolError> {
    let len = match read_length(cursor)? {
        Some(Some(len)) => len,
        Some(None) => return Ok(Some(Frame::Array(None))),
        None => return Ok(None),
    };

    if len > MAX_ARRAY_LEN {
        return Err(ProtocolError::ArrayTooLarge(len));
    }

    // the header alone is untrusted; grow as elements actually arrive
    let mut items = Vec::with_capacity(len.min(PREALLOC_ARRAY_LEN));
    for _ in 0..len {
        match parse_frame(cursor)? {
            Some(item) => items.push(item),
            None => return Ok(None),
        }
    }

    Ok(Some(Frame::Array(Some(items))))
}

/// Length header: `Some(None)` for the -1 nil marker
fn read_length(cursor: &mut Cursor<&[u8]>) -> Result<Option<Option<usize>>, ProtocolError> {
    match read_number(cursor)? {
        None => Ok(None),
        Some(-1) => Ok(Some(None)),
        Some(n) if n < 0 => Err(ProtocolError::InvalidLength(n)),
        Some(n) => Ok(Some(Some(n as usize))),
    }
}

fn read_number(cursor: &mut Cursor<&[u8]>) -> Result<Option<i64>, ProtocolError> {
    match read_line(cursor) {
        Some(line) => std::str::from_utf8(line)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Some)
            .ok_or(ProtocolError::InvalidNumber),
        None => Ok(None),
    }
}

fn read_text(cursor: &mut Cursor<&[u8]>) -> Result<Option<String>, ProtocolError> {
    match read_line(cursor) {
        Some(line) => std::str::from_utf8(line)
            .map(|s| Some(s.to_string()))
            .map_err(|_| ProtocolError::InvalidUtf8),
        None => Ok(None),
    }
}

/// Next CRLF-terminated line, without the terminator
fn read_line<'a>(cursor: &mut Cursor<&'a [u8]>) -> Option<&'a [u8]> {
    let start = cursor.position() as usize;
    let buf: &'a [u8] = *cursor.get_ref();
    let end = start + buf[start..].windows(2).position(|w| w == b"\r\n")?;
    cursor.set_position((end + 2) as u64);
    Some(&buf[start..end])
}
