//! Wire protocol between the server and a plugin process.
//!
//! Frames are `[u32 id][u32 len][payload]`, little-endian. Frame id 0
//! is reserved for the manifest the plugin announces at startup; ids
//! from 1 up are request frames, and the plugin echoes the id on the
//! matching response frame. Payload fields are length-prefixed byte
//! strings so header values may contain anything.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frame id carrying the plugin's export manifest.
pub const MANIFEST_FRAME_ID: u32 = 0;

/// Upper bound on a single frame payload.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// One HTTP request as forwarded to a plugin.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// One HTTP response as produced by a plugin.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame too large ({0} bytes)")]
    FrameTooLarge(usize),
    #[error("truncated frame payload")]
    Truncated,
    #[error("invalid status code {0}")]
    InvalidStatus(u32),
    #[error("non-utf8 text field in frame")]
    InvalidUtf8,
    #[error("plugin i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write one frame and flush it.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    id: u32,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }
    let len = u32::try_from(payload.len()).map_err(|_| ProtocolError::FrameTooLarge(payload.len()))?;
    writer.write_all(&id.to_le_bytes()).await?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. Returns `None` on a clean EOF at a frame boundary.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<(u32, Vec<u8>)>, ProtocolError> {
    let mut header = [0u8; 8];
    if !read_exact_or_eof(reader, &mut header).await? {
        return Ok(None);
    }
    let id = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len];
    if len != 0 {
        reader.read_exact(&mut payload).await?;
    }
    Ok(Some((id, payload)))
}

/// Fill `buf` completely, or report a clean EOF if the stream ended
/// before the first byte. EOF mid-buffer is an error.
async fn read_exact_or_eof<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<bool, ProtocolError> {
    let mut off = 0usize;
    while off < buf.len() {
        let n = reader.read(&mut buf[off..]).await?;
        if n == 0 {
            if off == 0 {
                return Ok(false);
            }
            return Err(ProtocolError::Truncated);
        }
        off += n;
    }
    Ok(true)
}

/// Encode a request payload: method, path, headers, body.
pub fn encode_request(req: &WireRequest) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + req.body.len());
    put_bytes(&mut out, req.method.as_bytes());
    put_bytes(&mut out, req.path.as_bytes());
    put_u32(&mut out, req.headers.len() as u32);
    for (name, value) in &req.headers {
        put_bytes(&mut out, name.as_bytes());
        put_bytes(&mut out, value.as_bytes());
    }
    put_bytes(&mut out, &req.body);
    out
}

/// Decode a response payload: status, headers, body.
pub fn decode_response(payload: &[u8]) -> Result<WireResponse, ProtocolError> {
    let mut cursor = Cursor::new(payload);
    let status_raw = cursor.take_u32()?;
    let status =
        u16::try_from(status_raw).map_err(|_| ProtocolError::InvalidStatus(status_raw))?;
    let header_count = cursor.take_u32()? as usize;
    // Cheap sanity bound: every header needs at least two length words.
    if header_count > payload.len() / 8 + 1 {
        return Err(ProtocolError::Truncated);
    }
    let mut headers = Vec::with_capacity(header_count);
    for _ in 0..header_count {
        let name = cursor.take_string()?;
        let value = cursor.take_string()?;
        headers.push((name, value));
    }
    let body = cursor.take_bytes_field()?.to_vec();
    Ok(WireResponse {
        status,
        headers,
        body,
    })
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take_u32(&mut self) -> Result<u32, ProtocolError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos.checked_add(len).ok_or(ProtocolError::Truncated)?;
        if end > self.buf.len() {
            return Err(ProtocolError::Truncated);
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_bytes_field(&mut self) -> Result<&'a [u8], ProtocolError> {
        let len = self.take_u32()? as usize;
        self.take(len)
    }

    fn take_string(&mut self) -> Result<String, ProtocolError> {
        let bytes = self.take_bytes_field()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> WireRequest {
        WireRequest {
            method: "GET".to_string(),
            path: "/plugins?x=1".to_string(),
            headers: vec![("accept".to_string(), "*/*".to_string())],
            body: Vec::new(),
        }
    }

    #[test]
    fn request_layout_is_length_prefixed() {
        let encoded = encode_request(&sample_request());
        assert_eq!(&encoded[0..4], &3u32.to_le_bytes());
        assert_eq!(&encoded[4..7], b"GET");
    }

    #[test]
    fn response_roundtrip_through_payload() {
        let mut payload = Vec::new();
        put_u32(&mut payload, 201);
        put_u32(&mut payload, 1);
        put_bytes(&mut payload, b"content-type");
        put_bytes(&mut payload, b"text/plain");
        put_bytes(&mut payload, b"created");

        let resp = decode_response(&payload).unwrap();
        assert_eq!(resp.status, 201);
        assert_eq!(resp.headers.len(), 1);
        assert_eq!(resp.body, b"created");
    }

    #[test]
    fn truncated_response_is_rejected() {
        let mut payload = Vec::new();
        put_u32(&mut payload, 200);
        put_u32(&mut payload, 2);
        put_bytes(&mut payload, b"x");
        // Second header pair missing entirely.
        assert!(matches!(
            decode_response(&payload),
            Err(ProtocolError::Truncated)
        ));
    }

    #[test]
    fn oversized_status_is_rejected() {
        let mut payload = Vec::new();
        put_u32(&mut payload, 70_000);
        put_u32(&mut payload, 0);
        put_bytes(&mut payload, b"");
        assert!(matches!(
            decode_response(&payload),
            Err(ProtocolError::InvalidStatus(70_000))
        ));
    }

    #[tokio::test]
    async fn frames_roundtrip_over_a_duplex_pipe() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_frame(&mut a, 7, b"hello").await.unwrap();
        drop(a);
        let (id, payload) = read_frame(&mut b).await.unwrap().unwrap();
        assert_eq!(id, 7);
        assert_eq!(payload, b"hello");
        assert!(read_frame(&mut b).await.unwrap().is_none());
    }
}
