//! Vector and graph store contracts with persistent and in-memory backends

pub mod graph;
pub mod vector;

pub use graph::{GraphStore, InMemoryGraphStore, Neo4jGraphStore};
pub use vector::{InMemoryVectorStore, SqliteVectorStore, VectorStore};

use serde::{Deserialize, Serialize};

/// Metadata carried alongside each indexed chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub doc_id: String,
    pub ord: usize,
    pub title: String,
}

/// A record upserted into the vector store, keyed by chunk id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub chunk_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// A chunk returned from retrieval
///
/// Lower score means closer (distance semantics). Scores are not normalized;
/// consumers must not assume a particular range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}
