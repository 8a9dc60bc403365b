//! `Content-Length`-prefixed framing over arbitrary byte streams (§4.1).
//!
//! Wire shape: `Content-Length: <N>\r\n\r\n<N bytes of payload>`. Header
//! names are matched case-insensitively; headers other than
//! `Content-Length` are tolerated and ignored, per spec.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use mcp_core::{Error, Result};

/// Default maximum frame size: 64 MiB, per §4.1.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Tunable limits for the framer.
#[derive(Debug, Clone, Copy)]
pub struct FramerConfig {
    /// Frames whose declared `Content-Length` exceeds this are rejected with
    /// [`Error::FrameTooLarge`] before any payload bytes are read.
    pub max_frame_bytes: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Encodes `payload` as one `Content-Length`-framed message.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let header = format!("Content-Length: {}\r\n\r\n", payload.len());
    let mut out = Vec::with_capacity(header.len() + payload.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Writes one framed message to `writer` and flushes it.
///
/// Callers are responsible for serializing writes across concurrent
/// producers (§4.2's "writer never interleaves bytes" invariant) — this
/// function performs one write per call but does not itself lock anything.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(payload);
    writer
        .write_all(&frame)
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;
    writer.flush().await.map_err(|e| Error::Transport(e.to_string()))?;
    Ok(())
}

/// Reads one framed message from `reader`.
///
/// Returns `Ok(None)` on a clean EOF encountered before any header bytes
/// (normal stream close between frames). Any malformed header, missing
/// `Content-Length`, oversized frame, or EOF in the middle of a frame is an
/// `Err` and the caller must close the stream (§4.1).
pub async fn read_frame<R>(reader: &mut R, config: &FramerConfig) -> Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut saw_any_header_line = false;

    loop {
        let mut line = String::new();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| Error::Framing(e.to_string()))?;

        if bytes_read == 0 {
            if saw_any_header_line {
                return Err(Error::Framing(
                    "stream ended while reading frame headers".to_string(),
                ));
            }
            return Ok(None);
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            // Blank line: end of headers.
            break;
        }
        saw_any_header_line = true;

        let (name, value) = trimmed
            .split_once(':')
            .ok_or_else(|| Error::Framing(format!("malformed header line: {trimmed:?}")))?;

        if name.trim().eq_ignore_ascii_case("content-length") {
            let value = value.trim();
            let parsed: i64 = value
                .parse()
                .map_err(|_| Error::Framing(format!("invalid Content-Length value: {value:?}")))?;
            if parsed < 0 {
                return Err(Error::Framing("Content-Length must not be negative".to_string()));
            }
            content_length = Some(parsed as usize);
        }
        // Any other header is tolerated and ignored.
    }

    let Some(len) = content_length else {
        return Err(Error::Framing("frame is missing Content-Length".to_string()));
    };

    if len > config.max_frame_bytes {
        return Err(Error::FrameTooLarge {
            size: len,
            max: config.max_frame_bytes,
        });
    }

    let mut payload = vec![0u8; len];
    tokio::io::AsyncReadExt::read_exact(reader, &mut payload)
        .await
        .map_err(|e| Error::Framing(format!("premature EOF reading frame body: {e}")))?;

    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn decodes_basic_frame() {
        let input = b"Content-Length: 17\r\n\r\n{\"jsonrpc\":\"2.0\"}".to_vec();
        let mut reader = Cursor::new(input);
        let frame = read_frame(&mut reader, &FramerConfig::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame, b"{\"jsonrpc\":\"2.0\"}");
    }

    #[tokio::test]
    async fn round_trip_encode_decode() {
        let payload = br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
        let encoded = encode_frame(payload);
        let mut reader = Cursor::new(encoded);
        let decoded = read_frame(&mut reader, &FramerConfig::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decoded, payload);
    }

    #[tokio::test]
    async fn ignores_extra_headers() {
        let input = b"X-Custom: foo\r\nContent-Length: 2\r\n\r\n{}".to_vec();
        let mut reader = Cursor::new(input);
        let frame = read_frame(&mut reader, &FramerConfig::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame, b"{}");
    }

    #[tokio::test]
    async fn header_name_is_case_insensitive() {
        let input = b"content-LENGTH: 2\r\n\r\n{}".to_vec();
        let mut reader = Cursor::new(input);
        let frame = read_frame(&mut reader, &FramerConfig::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame, b"{}");
    }

    #[tokio::test]
    async fn missing_content_length_is_an_error() {
        let input = b"X-Custom: foo\r\n\r\n{}".to_vec();
        let mut reader = Cursor::new(input);
        assert!(read_frame(&mut reader, &FramerConfig::default()).await.is_err());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_before_reading_body() {
        let input = b"Content-Length: 100\r\n\r\n".to_vec();
        let mut reader = Cursor::new(input);
        let config = FramerConfig { max_frame_bytes: 10 };
        let err = read_frame(&mut reader, &config).await.unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { size: 100, max: 10 }));
    }

    #[tokio::test]
    async fn clean_eof_between_frames_returns_none() {
        let input: Vec<u8> = Vec::new();
        let mut reader = Cursor::new(input);
        let result = read_frame(&mut reader, &FramerConfig::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn premature_eof_mid_frame_is_an_error() {
        let input = b"Content-Length: 10\r\n\r\nabc".to_vec();
        let mut reader = Cursor::new(input);
        assert!(read_frame(&mut reader, &FramerConfig::default()).await.is_err());
    }

    #[tokio::test]
    async fn trailing_garbage_is_ignored_until_next_frame() {
        let input = b"Content-Length: 2\r\n\r\n{}trailing-garbage-until-eof".to_vec();
        let mut reader = Cursor::new(input);
        let frame = read_frame(&mut reader, &FramerConfig::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame, b"{}");
    }
}
