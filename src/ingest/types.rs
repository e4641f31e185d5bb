//! Type definitions for the ingestion pipeline

use crate::chunker::Window;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An ingested document
///
/// Created once per ingest call, never mutated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Opaque 128-bit identifier, lowercase hex
    pub doc_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Create a document with a fresh id; a blank title becomes "Untitled"
    pub fn new(title: &str) -> Self {
        let title = title.trim();
        Self {
            doc_id: Uuid::new_v4().simple().to_string(),
            title: if title.is_empty() {
                "Untitled".to_string()
            } else {
                title.to_string()
            },
            created_at: Utc::now(),
        }
    }
}

/// A chunk of a document's text, the unit of indexing
///
/// `chunk_id` is `{doc_id}-{ord}` and therefore globally unique by
/// construction; `ord` values of a document form the contiguous prefix `[0, n)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub ord: usize,
    pub text: String,
    pub tokens: usize,
}

impl Chunk {
    pub fn from_window(doc_id: &str, window: Window) -> Self {
        Self {
            chunk_id: format!("{doc_id}-{}", window.ord),
            doc_id: doc_id.to_string(),
            ord: window.ord,
            text: window.text,
            tokens: window.tokens,
        }
    }
}

/// Result of one ingest call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    /// Number of chunks produced
    pub chunks: usize,
    /// Number of distinct entities extracted
    pub entities: usize,
    /// Number of vector records upserted
    pub vector_count: usize,
    /// Wall-clock latency in milliseconds
    pub ms: u64,
    /// Page count for pdf/url ingests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
}

impl IngestResult {
    /// Zero-count result for empty input; latency is still recorded
    pub fn empty(ms: u64) -> Self {
        Self {
            chunks: 0,
            entities: 0,
            vector_count: 0,
            ms,
            pages: None,
        }
    }
}
