//! Opaque-cursor paging for `*/list` operations (§4.5): a request carries an
//! optional `cursor`, a response carries `items` plus an optional
//! `nextCursor`; absence of `nextCursor` means the listing is complete.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use mcp_core::Error;

/// `*/list` request params: an opaque cursor from a prior page, or none for
/// the first page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// One page of a `*/list` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }

    pub fn more(items: Vec<T>, next_cursor: impl Into<String>) -> Self {
        Self {
            items,
            next_cursor: Some(next_cursor.into()),
        }
    }
}

/// Encodes an absolute offset into an opaque cursor string. Offsets are the
/// only cursor shape this runtime produces; the format is not part of the
/// protocol and a peer must treat cursors as opaque.
pub fn encode_cursor(offset: usize) -> String {
    URL_SAFE_NO_PAD.encode(offset.to_string())
}

/// Decodes a cursor produced by [`encode_cursor`]. Returns
/// [`Error::InvalidParams`] for a cursor this runtime didn't mint, rather
/// than panicking on attacker- or peer-supplied garbage.
pub fn decode_cursor(cursor: &str) -> Result<usize, Error> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| Error::InvalidParams("malformed pagination cursor".into()))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| Error::InvalidParams("malformed pagination cursor".into()))?;
    text.parse()
        .map_err(|_| Error::InvalidParams("malformed pagination cursor".into()))
}

/// Slices `items` into a page of at most `page_size` entries starting at the
/// offset named by `cursor` (or the start, if `cursor` is `None`).
pub fn paginate<T: Clone>(items: &[T], cursor: Option<&str>, page_size: usize) -> Result<Page<T>, Error> {
    let offset = match cursor {
        Some(c) => decode_cursor(c)?,
        None => 0,
    };
    if offset > items.len() {
        return Err(Error::InvalidParams("pagination cursor is out of range".into()));
    }
    let end = (offset + page_size).min(items.len());
    let page_items = items[offset..end].to_vec();
    if end < items.len() {
        Ok(Page::more(page_items, encode_cursor(end)))
    } else {
        Ok(Page::last(page_items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_splits_items_and_emits_a_cursor_for_remaining_pages() {
        let items: Vec<i32> = (0..25).collect();
        let first = paginate(&items, None, 10).unwrap();
        assert_eq!(first.items.len(), 10);
        assert!(first.next_cursor.is_some());

        let second = paginate(&items, first.next_cursor.as_deref(), 10).unwrap();
        assert_eq!(second.items, (10..20).collect::<Vec<_>>());
        assert!(second.next_cursor.is_some());

        let third = paginate(&items, second.next_cursor.as_deref(), 10).unwrap();
        assert_eq!(third.items, (20..25).collect::<Vec<_>>());
        assert!(third.next_cursor.is_none());
    }

    #[test]
    fn paginate_with_no_items_returns_an_empty_final_page() {
        let items: Vec<i32> = vec![];
        let page = paginate(&items, None, 10).unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn malformed_cursor_is_rejected_not_panicked_on() {
        let items = vec![1, 2, 3];
        let err = paginate(&items, Some("not-a-real-cursor!!"), 10).unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }

    #[test]
    fn out_of_range_cursor_is_rejected() {
        let items = vec![1, 2, 3];
        let cursor = encode_cursor(100);
        let err = paginate(&items, Some(&cursor), 10).unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }
}
