//! Cursor pagination
//!
//! Pages are ordered by `_id` only. The cursor names the last item of the
//! previous page; the next query asks for items strictly after it and fetches
//! one extra to learn whether another page follows.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bson::{oid::ObjectId, DateTime};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Result, TaxonomyError};

/// Resume point of a paginated listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub id: ObjectId,
    /// Carried in the payload but not used for ordering or filtering
    pub created_at: DateTime,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorPayload {
    id: String,
    created_at: String,
}

impl Cursor {
    pub fn new(id: ObjectId, created_at: DateTime) -> Self {
        Self { id, created_at }
    }

    /// `base64(JSON({id, createdAt}))`
    pub fn encode(&self) -> String {
        let payload = CursorPayload {
            id: self.id.to_hex(),
            created_at: self
                .created_at
                .to_chrono()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        // Serializing two strings cannot fail
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        STANDARD.encode(json)
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| TaxonomyError::InvalidCursor(format!("not base64: {}", e)))?;

        let payload: CursorPayload = serde_json::from_slice(&bytes)
            .map_err(|e| TaxonomyError::InvalidCursor(format!("not a cursor payload: {}", e)))?;

        let id = ObjectId::parse_str(&payload.id)
            .map_err(|e| TaxonomyError::InvalidCursor(format!("bad id: {}", e)))?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&payload.created_at)
            .map_err(|e| TaxonomyError::InvalidCursor(format!("bad createdAt: {}", e)))?
            .with_timezone(&Utc);

        Ok(Self {
            id,
            created_at: DateTime::from_chrono(created_at),
        })
    }
}

/// One page of results
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    /// Split an over-fetched result (up to `limit + 1` items) into a page.
    /// A next cursor is produced only when more than `limit` items came back.
    pub fn from_overfetch(mut items: Vec<T>, limit: usize, cursor_of: impl Fn(&T) -> Cursor) -> Self {
        if items.len() > limit {
            items.truncate(limit);
            let next_cursor = items.last().map(&cursor_of);
            Self { items, next_cursor }
        } else {
            Self {
                items,
                next_cursor: None,
            }
        }
    }
}
