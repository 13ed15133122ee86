use crate::resp::{RespError, RespParser, RespValue};
use bytes::BytesMut;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// One client's byte stream plus its read buffer.
pub struct Connection<S> {
    pub id: u64,
    stream: S,
    buf: BytesMut,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(stream: S) -> Self {
        Connection {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            stream,
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Read the next request.
    ///
    /// Returns `Ok(None)` when the peer closes between requests; closing in
    /// the middle of one is a protocol error.
    pub async fn read_request(&mut self) -> Result<Option<RespValue>, RespError> {
        loop {
            // Try to parse any complete request in the buffer first
            if let Some(value) = RespParser::parse(&mut self.buf)? {
                return Ok(Some(value));
            }

            if self.stream.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(RespError::UnexpectedEof);
            }
        }
    }

    pub async fn write_value(&mut self, value: &RespValue) -> std::io::Result<()> {
        self.stream.write_all(&value.serialize()).await?;
        self.stream.flush().await
    }
}
