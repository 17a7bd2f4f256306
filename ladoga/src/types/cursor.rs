//! Opaque cursor pagination for list results

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// An opaque token representing a pagination position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(String);

/// One page of a listing.
#[derive(Debug)]
pub struct Page<T> {
    /// Items of the current page
    pub items: Vec<T>,

    /// Token for the next page, absent on the last one
    pub next_cursor: Option<Cursor>,
}

impl Cursor {
    fn encode(index: usize) -> Self {
        Self(BASE64.encode(index.to_string()))
    }

    fn decode(&self) -> Option<usize> {
        let bytes = BASE64.decode(&self.0).ok()?;
        String::from_utf8(bytes).ok()?.parse().ok()
    }
}

impl From<&str> for Cursor {
    #[inline]
    fn from(cursor: &str) -> Self {
        Self(cursor.into())
    }
}

/// Slices an already-filtered listing into one page.
/// An unparseable cursor reads as the first page.
pub(crate) fn paginate<T>(items: Vec<T>, cursor: Option<&Cursor>, page_size: usize) -> Page<T> {
    let start = cursor
        .and_then(Cursor::decode)
        .unwrap_or(0)
        .min(items.len());
    let end = start
        .saturating_add(page_size)
        .min(items.len());
    let next_cursor = (end < items.len()).then(|| Cursor::encode(end));
    Page {
        items: items
            .into_iter()
            .skip(start)
            .take(end - start)
            .collect(),
        next_cursor,
    }
}
