use bytes::{Buf, BytesMut};
use std::io::{self, Read};

/// Largest bulk payload accepted from a peer.
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;
/// Largest element count accepted for an array header.
const MAX_ARRAY_LEN: i64 = 1024 * 1024;
/// Deepest array nesting accepted from a peer.
const MAX_DEPTH: usize = 128;

/// A RESP value.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// +OK\r\n
    SimpleString(String),
    /// -ERR message\r\n
    Error(String),
    /// :1000\r\n
    Integer(i64),
    /// $6\r\nfoobar\r\n  or  $-1\r\n (null)
    BulkString(Option<Vec<u8>>),
    /// *2\r\n...
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    pub fn bulk_string(data: impl Into<Vec<u8>>) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    pub fn null_bulk_string() -> Self {
        RespValue::BulkString(None)
    }

    pub fn array(items: Vec<RespValue>) -> Self {
        RespValue::Array(items)
    }

    /// Serialize this value to RESP bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to(&mut buf);
        buf
    }

    /// Write RESP bytes into the given buffer.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(b'+');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Error(s) => {
                buf.push(b'-');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Integer(n) => {
                buf.push(b':');
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::BulkString(None) => {
                buf.extend_from_slice(b"$-1\r\n");
            }
            RespValue::BulkString(Some(data)) => {
                buf.push(b'$');
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Array(items) => {
                buf.push(b'*');
                buf.extend_from_slice(items.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                for item in items {
                    item.write_to(buf);
                }
            }
        }
    }

    /// Raw payload of a non-null bulk string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RespValue::BulkString(Some(data)) => Some(data),
            _ => None,
        }
    }

    /// Bulk payload as UTF-8, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> Option<String> {
        self.as_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

/// Incremental RESP request decoder.
///
/// Only arrays and bulk strings are accepted: requests are always arrays of
/// bulk strings, the other types are reply shapes that are only ever encoded.
/// Call `parse()` repeatedly as data arrives.
pub struct RespParser;

impl RespParser {
    /// Try to decode one complete value from the front of `buf`.
    ///
    /// On success the value's bytes are consumed. Returns `Ok(None)` and leaves
    /// `buf` untouched when it doesn't hold a complete value yet.
    pub fn parse(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        match Self::measure(buf, 0, 0)? {
            Some(_) => Self::take_value(buf, 0).map(Some),
            None => Ok(None),
        }
    }

    /// Scan the value starting at `pos` without consuming it.
    /// Returns the offset one past its last byte.
    fn measure(buf: &[u8], pos: usize, depth: usize) -> Result<Option<usize>, RespError> {
        if depth > MAX_DEPTH {
            return Err(RespError::InvalidData("too deep".into()));
        }
        let Some(&tag) = buf.get(pos) else {
            return Ok(None);
        };

        match tag {
            b'$' => {
                let Some((len, body)) = read_length(buf, pos + 1)? else {
                    return Ok(None);
                };
                if len == -1 {
                    return Ok(Some(body));
                }
                if len < -1 || len > MAX_BULK_LEN {
                    return Err(RespError::InvalidData("invalid bulk length".into()));
                }
                let end = body + len as usize;
                if buf.len() < end + 2 {
                    return Ok(None);
                }
                if &buf[end..end + 2] != b"\r\n" {
                    return Err(RespError::InvalidData(
                        "Missing trailing CRLF after bulk string".into(),
                    ));
                }
                Ok(Some(end + 2))
            }
            b'*' => {
                let Some((len, mut next)) = read_length(buf, pos + 1)? else {
                    return Ok(None);
                };
                if !(0..=MAX_ARRAY_LEN).contains(&len) {
                    return Err(RespError::InvalidData("invalid multibulk length".into()));
                }
                for _ in 0..len {
                    match Self::measure(buf, next, depth + 1)? {
                        Some(end) => next = end,
                        None => return Ok(None),
                    }
                }
                Ok(Some(next))
            }
            other => Err(RespError::UnsupportedType(other)),
        }
    }

    /// Consume one value already known to be complete.
    fn take_value(buf: &mut BytesMut, depth: usize) -> Result<RespValue, RespError> {
        if depth > MAX_DEPTH {
            return Err(RespError::InvalidData("too deep".into()));
        }
        let tag = buf[0];
        let (len, body) = read_length(buf, 1)?
            .ok_or_else(|| RespError::InvalidData("incomplete header".into()))?;
        buf.advance(body);

        match tag {
            b'$' if len == -1 => Ok(RespValue::BulkString(None)),
            b'$' => {
                let data = buf.split_to(len as usize).to_vec();
                buf.advance(2);
                Ok(RespValue::BulkString(Some(data)))
            }
            b'*' => {
                let mut items = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    items.push(Self::take_value(buf, depth + 1)?);
                }
                Ok(RespValue::Array(items))
            }
            other => Err(RespError::UnsupportedType(other)),
        }
    }
}

/// Parse the CRLF-terminated decimal header starting at `start`.
/// Returns the number and the offset just past the CRLF.
fn read_length(buf: &[u8], start: usize) -> Result<Option<(i64, usize)>, RespError> {
    let Some(crlf) = find_crlf_from(buf, start) else {
        return Ok(None);
    };
    let text = std::str::from_utf8(&buf[start..crlf])
        .map_err(|_| RespError::InvalidData("invalid length encoding".into()))?;
    let len: i64 = text
        .parse()
        .map_err(|_| RespError::InvalidData(format!("invalid length: {text:?}")))?;
    Ok(Some((len, crlf + 2)))
}

/// Find \r\n starting from the given position.
fn find_crlf_from(buf: &[u8], start: usize) -> Option<usize> {
    if buf.len() < start + 2 {
        return None;
    }
    (start..buf.len() - 1).find(|&i| buf[i] == b'\r' && buf[i + 1] == b'\n')
}

/// Blocking decoder over any byte source.
pub struct RespReader<R> {
    inner: R,
    buf: BytesMut,
    read_total: u64,
}

impl<R: Read> RespReader<R> {
    pub fn new(inner: R) -> Self {
        RespReader {
            inner,
            buf: BytesMut::with_capacity(4096),
            read_total: 0,
        }
    }

    /// Offset in the source just past the last value returned.
    pub fn position(&self) -> u64 {
        self.read_total - self.buf.len() as u64
    }

    /// Read the next value.
    ///
    /// `Ok(None)` means the source ended cleanly between values; ending in
    /// the middle of one is an error.
    pub fn read_value(&mut self) -> Result<Option<RespValue>, RespError> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(value) = RespParser::parse(&mut self.buf)? {
                return Ok(Some(value));
            }
            let n = self.inner.read(&mut chunk)?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(RespError::UnexpectedEof);
            }
            self.buf.extend_from_slice(&chunk[..n]);
            self.read_total += n as u64;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RespError {
    #[error("unsupported type '{}'", *.0 as char)]
    UnsupportedType(u8),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
