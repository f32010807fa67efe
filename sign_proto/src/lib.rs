//! Wire framing shared by the sign client and the prediction server.
//!
//! A request is a 4-byte big-endian length followed by that many bytes of an
//! encoded image. A response is a single `\n`-terminated UTF-8 line.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const LENGTH_PREFIX_LEN: usize = 4;

/// Longest response line accepted from a server, terminator included.
pub const MAX_RESPONSE_BYTES: usize = 4096;

#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("Payload of {len} bytes exceeds the limit of {max} bytes")]
    PayloadTooLarge { len: u64, max: u64 },
    #[error("Connection closed after {read} of {expected} bytes")]
    Truncated { read: usize, expected: usize },
    #[error("Label must not contain a line break: {0:?}")]
    InvalidLabel(String),
    #[error("Response line exceeds {0} bytes")]
    ResponseTooLong(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds the full request frame: length prefix then payload.
pub fn encode_request(payload: &[u8]) -> Result<Bytes, ProtoError> {
    let len = prefix_for(payload.len())?;
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

fn prefix_for(len: usize) -> Result<u32, ProtoError> {
    u32::try_from(len).map_err(|_| ProtoError::PayloadTooLarge {
        len: len as u64,
        max: u32::MAX as u64,
    })
}

pub async fn write_request<W>(writer: &mut W, payload: &[u8]) -> Result<(), ProtoError>
where
    W: AsyncWrite + Unpin,
{
    let len = prefix_for(payload.len())?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one request frame.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly before
/// sending any byte of a new frame.
pub async fn read_request<R>(reader: &mut R, max_len: usize) -> Result<Option<Bytes>, ProtoError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_LEN {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ProtoError::Truncated {
                read: filled,
                expected: LENGTH_PREFIX_LEN,
            });
        }
        filled += n;
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > max_len {
        return Err(ProtoError::PayloadTooLarge {
            len: len as u64,
            max: max_len as u64,
        });
    }

    let mut payload = BytesMut::zeroed(len);
    let mut read = 0;
    while read < len {
        let n = reader.read(&mut payload[read..]).await?;
        if n == 0 {
            return Err(ProtoError::Truncated {
                read,
                expected: len,
            });
        }
        read += n;
    }

    Ok(Some(payload.freeze()))
}

pub async fn write_response<W>(writer: &mut W, label: &str) -> Result<(), ProtoError>
where
    W: AsyncWrite + Unpin,
{
    if label.contains(&['\n', '\r'][..]) {
        return Err(ProtoError::InvalidLabel(label.to_string()));
    }
    let mut line = String::with_capacity(label.len() + 1);
    line.push_str(label);
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the single response line, without its terminator. Bytes that are not
/// valid UTF-8 are replaced rather than rejected.
///
/// `Ok(None)` means the server closed the connection without sending data.
pub async fn read_response<R>(reader: &mut R) -> Result<Option<String>, ProtoError>
where
    R: AsyncBufRead + Unpin,
{
    let mut limited = reader.take(MAX_RESPONSE_BYTES as u64);
    let mut line = Vec::new();
    let n = limited.read_until(b'\n', &mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    if line.last() != Some(&b'\n') && n >= MAX_RESPONSE_BYTES {
        return Err(ProtoError::ResponseTooLong(MAX_RESPONSE_BYTES));
    }

    let line = String::from_utf8_lossy(&line);
    Ok(Some(line.trim_end_matches(&['\n', '\r'][..]).to_string()))
}
