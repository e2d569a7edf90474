//! Cursor-based pagination over materialised collections
//!
//! A cursor is an opaque JSON object string carrying `offset` and
//! `page_size` plus any passthrough fields. Pages are sliced in memory after
//! the full collection has been fetched from the hub; there is no
//! server-side or streaming pagination.

use crate::error::{HomeyError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Decoded pagination position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorParams {
    pub offset: usize,
    pub page_size: usize,
    /// Unknown cursor fields, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CursorParams {
    pub fn new(offset: usize, page_size: usize) -> Self {
        Self {
            offset,
            page_size,
            extra: Map::new(),
        }
    }
}

/// One page of a collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub page_size: usize,
    pub offset: usize,
    pub has_next: bool,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// The `pagination` object returned alongside tool results
    pub fn pagination_info(&self) -> Value {
        json!({
            "total_count": self.total_count,
            "page_size": self.page_size,
            "offset": self.offset,
            "has_next": self.has_next,
            "next_cursor": self.next_cursor,
        })
    }
}

/// Cursor encoder/decoder bound to configured page size limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorCodec {
    default_page_size: usize,
    max_page_size: usize,
}

impl CursorCodec {
    pub fn new(default_page_size: usize, max_page_size: usize) -> Self {
        Self {
            default_page_size,
            max_page_size,
        }
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    /// Decode a cursor. `None` and the literal `"null"` start at the
    /// beginning with the default page size.
    pub fn parse(&self, cursor: Option<&str>) -> Result<CursorParams> {
        let raw = match cursor {
            None => return Ok(CursorParams::new(0, self.default_page_size)),
            Some(raw) if raw.is_empty() || raw == "null" => {
                return Ok(CursorParams::new(0, self.default_page_size))
            }
            Some(raw) => raw,
        };

        let value: Value =
            serde_json::from_str(raw).map_err(|e| HomeyError::pagination(e.to_string()))?;
        let Value::Object(mut data) = value else {
            return Err(HomeyError::pagination("Cursor must be a JSON object"));
        };

        let offset = match data.remove("offset") {
            None => 0,
            Some(v) => v
                .as_u64()
                .ok_or_else(|| HomeyError::pagination("Offset must be a non-negative integer"))?
                as usize,
        };

        let page_size = match data.remove("page_size") {
            None => self.default_page_size,
            Some(v) => v
                .as_u64()
                .map(|n| n as usize)
                .filter(|n| (1..=self.max_page_size).contains(n))
                .ok_or_else(|| {
                    HomeyError::pagination(format!(
                        "Page size must be between 1 and {}",
                        self.max_page_size
                    ))
                })?,
        };

        Ok(CursorParams {
            offset,
            page_size,
            extra: data,
        })
    }

    /// Encode a cursor; exact inverse of [`parse`](Self::parse) for the
    /// fields it defines
    pub fn create(&self, offset: usize, page_size: usize, extra: &Map<String, Value>) -> String {
        let mut data = extra.clone();
        data.insert("offset".to_string(), json!(offset));
        data.insert("page_size".to_string(), json!(page_size));
        Value::Object(data).to_string()
    }

    /// Slice one page out of `items`. An offset past the end yields an empty
    /// page rather than an error.
    pub fn paginate<T>(&self, items: Vec<T>, params: &CursorParams) -> Page<T> {
        let total_count = items.len();
        // Offsets come from client cursors and may be arbitrarily large
        let end = params.offset.saturating_add(params.page_size);
        let has_next = end < total_count;
        let next_cursor = has_next.then(|| self.create(end, params.page_size, &Map::new()));

        let items = items
            .into_iter()
            .skip(params.offset)
            .take(params.page_size)
            .collect();

        Page {
            items,
            total_count,
            page_size: params.page_size,
            offset: params.offset,
            has_next,
            next_cursor,
        }
    }
}
