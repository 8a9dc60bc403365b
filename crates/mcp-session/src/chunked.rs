//! Chunked `resources/read` (§4.5): gated on the negotiated
//! `experimental.chunkedRead` capability, a read may carry `offset`/`length`
//! and a response reports `{offset, total?}` alongside `nextOffset` when more
//! data remains.

use serde::{Deserialize, Serialize};

use mcp_core::Error;

/// `resources/read` request params. `offset`/`length` are only meaningful
/// when chunked reads were negotiated; a peer that didn't negotiate the
/// extension should omit them and always receive the whole resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadParams {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
}

/// Where a chunk sits within the full resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub offset: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// One chunk of a resource read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadChunk {
    pub uri: String,
    #[serde(flatten)]
    pub content: ChunkContent,
    pub chunk: ChunkInfo,
    #[serde(rename = "nextOffset", skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<u64>,
}

/// A resource chunk's payload, either text or base64-encoded binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkContent {
    Text { text: String },
    Blob { blob: String },
}

/// Slices `bytes` into one chunk starting at `offset`, of at most
/// `max_chunk_len` bytes (or the full remainder if `length` requests more or
/// is unset). `uri`/`total` are attached for the reply; `is_text` selects
/// whether the chunk is emitted as UTF-8 text or base64 `blob`.
pub fn read_chunk(
    uri: &str,
    bytes: &[u8],
    offset: u64,
    length: Option<u64>,
    max_chunk_len: u64,
    is_text: bool,
) -> Result<ReadChunk, Error> {
    let total = bytes.len() as u64;
    if offset > total {
        return Err(Error::InvalidParams(format!(
            "offset {offset} is past the end of a {total}-byte resource"
        )));
    }
    let requested = length.unwrap_or(max_chunk_len).min(max_chunk_len);
    let end = (offset + requested).min(total);
    let slice = &bytes[offset as usize..end as usize];

    let content = if is_text {
        ChunkContent::Text {
            text: String::from_utf8(slice.to_vec())
                .map_err(|_| Error::Internal("resource chunk is not valid UTF-8 text".into()))?,
        }
    } else {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        ChunkContent::Blob {
            blob: STANDARD.encode(slice),
        }
    };

    let next_offset = if end < total { Some(end) } else { None };

    Ok(ReadChunk {
        uri: uri.to_string(),
        content,
        chunk: ChunkInfo {
            offset,
            total: Some(total),
        },
        next_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_a_chunk_and_reports_the_next_offset() {
        let data = b"0123456789";
        let chunk = read_chunk("file:///a", data, 0, None, 4, true).unwrap();
        assert!(matches!(chunk.content, ChunkContent::Text { ref text } if text == "0123"));
        assert_eq!(chunk.next_offset, Some(4));
        assert_eq!(chunk.chunk.total, Some(10));
    }

    #[test]
    fn final_chunk_has_no_next_offset() {
        let data = b"0123456789";
        let chunk = read_chunk("file:///a", data, 8, None, 4, true).unwrap();
        assert!(matches!(chunk.content, ChunkContent::Text { ref text } if text == "89"));
        assert_eq!(chunk.next_offset, None);
    }

    #[test]
    fn binary_resources_are_base64_encoded() {
        let data = &[0xff, 0x00, 0x10];
        let chunk = read_chunk("file:///a", data, 0, None, 16, false).unwrap();
        assert!(matches!(chunk.content, ChunkContent::Blob { .. }));
    }

    #[test]
    fn offset_past_the_end_is_rejected() {
        let data = b"short";
        let err = read_chunk("file:///a", data, 100, None, 16, true).unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }

    #[test]
    fn requested_length_is_capped_at_the_configured_maximum() {
        let data = b"0123456789";
        let chunk = read_chunk("file:///a", data, 0, Some(100), 3, true).unwrap();
        assert!(matches!(chunk.content, ChunkContent::Text { ref text } if text == "012"));
    }
}
