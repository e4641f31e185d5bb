//! Graph store: document/chunk/entity nodes with typed edges
//!
//! `Document —HAS_CHUNK→ Chunk` and `Chunk —ABOUT→ Entity`. Upserts are
//! commutative merges so concurrent ingests touching the same entity converge
//! to one node. The Neo4j backend leans on MERGE for that; the in-memory twin
//! uses adjacency sets behind a coarse lock.

use crate::error::{Result, StoreError};
use crate::ingest::types::Chunk;
use crate::store::{ChunkMetadata, RetrievedChunk};
use async_trait::async_trait;
use neo4rs::{query, Graph};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Graph store contract
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn upsert_document(&self, doc_id: &str, title: &str) -> Result<()>;

    async fn upsert_chunk(&self, chunk: &Chunk) -> Result<()>;

    async fn link_doc_chunk(&self, doc_id: &str, chunk_id: &str) -> Result<()>;

    async fn upsert_entity(&self, entity_key: &str, display_name: &str) -> Result<()>;

    /// Link a chunk to an entity. `rel` is sanitized to `[A-Z_]+`; only
    /// `ABOUT` is used in practice.
    async fn link_chunk_entity(&self, chunk_id: &str, entity_key: &str, rel: &str) -> Result<()>;

    /// Number of ABOUT edges per entity key; missing keys report 0
    async fn degrees(&self, entity_keys: &[String]) -> Result<HashMap<String, usize>>;

    /// Chunks linked to any of the given entities, each at most once.
    /// Score is `1 / (1 + match_count)` so more-matched chunks rank closer;
    /// ties break on `(doc_id, ord)`.
    async fn chunks_for_entities(
        &self,
        entity_keys: &[String],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>>;

    async fn ping(&self) -> bool;

    /// Active backend name, surfaced by the health probe
    fn backend(&self) -> &'static str;
}

/// Restrict a relationship name to `[A-Z_]+`
///
/// Relationship types cannot be bound as query parameters, so the name is
/// sanitized before interpolation.
pub fn sanitize_rel(rel: &str) -> Result<String> {
    let cleaned: String = rel
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || *c == '_')
        .collect();
    if cleaned.is_empty() {
        return Err(StoreError::UpsertFailed(format!("invalid relation name {rel:?}")).into());
    }
    Ok(cleaned)
}

fn entity_score(matches: usize) -> f32 {
    1.0 / (1.0 + matches as f32)
}

/// Neo4j-backed graph store
pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    /// Connect over bolt and bootstrap uniqueness constraints for
    /// `doc_id`, `chunk_id`, and entity `key`.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(StoreError::from)?;

        for statement in [
            "CREATE CONSTRAINT doc_id_unique IF NOT EXISTS FOR (d:Document) REQUIRE d.doc_id IS UNIQUE",
            "CREATE CONSTRAINT chunk_id_unique IF NOT EXISTS FOR (c:Chunk) REQUIRE c.chunk_id IS UNIQUE",
            "CREATE CONSTRAINT entity_key_unique IF NOT EXISTS FOR (e:Entity) REQUIRE e.key IS UNIQUE",
        ] {
            graph.run(query(statement)).await.map_err(StoreError::from)?;
        }

        info!(uri, "neo4j graph store ready");
        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn upsert_document(&self, doc_id: &str, title: &str) -> Result<()> {
        self.graph
            .run(
                query(
                    "MERGE (d:Document {doc_id: $doc_id}) \
                     SET d.title = $title \
                     SET d.created_at = coalesce(d.created_at, datetime())",
                )
                .param("doc_id", doc_id)
                .param("title", title),
            )
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    async fn upsert_chunk(&self, chunk: &Chunk) -> Result<()> {
        self.graph
            .run(
                query(
                    "MERGE (c:Chunk {chunk_id: $chunk_id}) \
                     SET c.doc_id = $doc_id, c.ord = $ord, c.text = $text, c.tokens = $tokens",
                )
                .param("chunk_id", chunk.chunk_id.as_str())
                .param("doc_id", chunk.doc_id.as_str())
                .param("ord", chunk.ord as i64)
                .param("text", chunk.text.as_str())
                .param("tokens", chunk.tokens as i64),
            )
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    async fn link_doc_chunk(&self, doc_id: &str, chunk_id: &str) -> Result<()> {
        self.graph
            .run(
                query(
                    "MATCH (d:Document {doc_id: $doc_id}), (c:Chunk {chunk_id: $chunk_id}) \
                     MERGE (d)-[:HAS_CHUNK]->(c)",
                )
                .param("doc_id", doc_id)
                .param("chunk_id", chunk_id),
            )
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    async fn upsert_entity(&self, entity_key: &str, display_name: &str) -> Result<()> {
        self.graph
            .run(
                query(
                    "MERGE (e:Entity {key: $key}) \
                     ON CREATE SET e.display_name = $display_name",
                )
                .param("key", entity_key)
                .param("display_name", display_name),
            )
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    async fn link_chunk_entity(&self, chunk_id: &str, entity_key: &str, rel: &str) -> Result<()> {
        let rel = sanitize_rel(rel)?;
        let statement = format!(
            "MATCH (c:Chunk {{chunk_id: $chunk_id}}), (e:Entity {{key: $key}}) \
             MERGE (c)-[:{rel}]->(e)"
        );
        self.graph
            .run(
                query(&statement)
                    .param("chunk_id", chunk_id)
                    .param("key", entity_key),
            )
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    async fn degrees(&self, entity_keys: &[String]) -> Result<HashMap<String, usize>> {
        let mut out: HashMap<String, usize> =
            entity_keys.iter().map(|k| (k.clone(), 0)).collect();
        if entity_keys.is_empty() {
            return Ok(out);
        }

        let mut stream = self
            .graph
            .execute(
                query(
                    "UNWIND $keys AS k \
                     OPTIONAL MATCH (c:Chunk)-[:ABOUT]->(e:Entity {key: k}) \
                     RETURN k AS key, count(c) AS degree",
                )
                .param("keys", entity_keys.to_vec()),
            )
            .await
            .map_err(StoreError::from)?;

        while let Some(row) = stream.next().await.map_err(StoreError::from)? {
            let key: String = row
                .get("key")
                .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
            let degree: i64 = row
                .get("degree")
                .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
            out.insert(key, degree.max(0) as usize);
        }
        Ok(out)
    }

    async fn chunks_for_entities(
        &self,
        entity_keys: &[String],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if entity_keys.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut stream = self
            .graph
            .execute(
                query(
                    "MATCH (c:Chunk)-[:ABOUT]->(e:Entity) \
                     WHERE e.key IN $keys \
                     WITH c, count(DISTINCT e) AS matches \
                     OPTIONAL MATCH (d:Document)-[:HAS_CHUNK]->(c) \
                     RETURN c.chunk_id AS chunk_id, c.doc_id AS doc_id, c.ord AS ord, \
                            c.text AS text, coalesce(d.title, c.doc_id) AS title, matches \
                     ORDER BY matches DESC, c.doc_id ASC, c.ord ASC \
                     LIMIT $limit",
                )
                .param("keys", entity_keys.to_vec())
                .param("limit", limit as i64),
            )
            .await
            .map_err(StoreError::from)?;

        let mut chunks = Vec::new();
        while let Some(row) = stream.next().await.map_err(StoreError::from)? {
            let get_err = |e: neo4rs::DeError| StoreError::QueryFailed(e.to_string());
            let ord: i64 = row.get("ord").map_err(get_err)?;
            let matches: i64 = row.get("matches").map_err(get_err)?;
            chunks.push(RetrievedChunk {
                id: row.get("chunk_id").map_err(get_err)?,
                text: row.get("text").map_err(get_err)?,
                metadata: ChunkMetadata {
                    doc_id: row.get("doc_id").map_err(get_err)?,
                    ord: ord.max(0) as usize,
                    title: row.get("title").map_err(get_err)?,
                },
                score: entity_score(matches.max(0) as usize),
            });
        }
        debug!(hits = chunks.len(), "graph retrieval complete");
        Ok(chunks)
    }

    async fn ping(&self) -> bool {
        self.graph.run(query("RETURN 1")).await.is_ok()
    }

    fn backend(&self) -> &'static str {
        "neo4j"
    }
}

#[derive(Default)]
struct GraphInner {
    /// doc_id -> title
    documents: HashMap<String, String>,
    /// chunk_id -> (doc_id, ord, text)
    chunks: HashMap<String, (String, usize, String)>,
    /// doc_id -> chunk ids, insertion-ordered by ord
    doc_chunks: HashMap<String, BTreeSet<(usize, String)>>,
    /// entity key -> display name
    entities: HashMap<String, String>,
    /// entity key -> chunk ids with an ABOUT edge
    entity_chunks: HashMap<String, BTreeSet<String>>,
}

/// In-memory graph store used as the startup fallback and in tests
#[derive(Default)]
pub struct InMemoryGraphStore {
    inner: RwLock<GraphInner>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node and ABOUT-edge counts, for tests and diagnostics
    pub async fn counts(&self) -> (usize, usize, usize) {
        let inner = self.inner.read().await;
        let edges: usize = inner.entity_chunks.values().map(|s| s.len()).sum();
        (inner.documents.len(), inner.chunks.len(), edges)
    }

    /// Total HAS_CHUNK edges, for tests and diagnostics
    pub async fn has_chunk_edges(&self) -> usize {
        let inner = self.inner.read().await;
        inner.doc_chunks.values().map(|s| s.len()).sum()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert_document(&self, doc_id: &str, title: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.documents.insert(doc_id.to_string(), title.to_string());
        Ok(())
    }

    async fn upsert_chunk(&self, chunk: &Chunk) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.chunks.insert(
            chunk.chunk_id.clone(),
            (chunk.doc_id.clone(), chunk.ord, chunk.text.clone()),
        );
        Ok(())
    }

    async fn link_doc_chunk(&self, doc_id: &str, chunk_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let ord = inner
            .chunks
            .get(chunk_id)
            .map(|(_, ord, _)| *ord)
            .ok_or_else(|| StoreError::UpsertFailed(format!("unknown chunk {chunk_id}")))?;
        inner
            .doc_chunks
            .entry(doc_id.to_string())
            .or_default()
            .insert((ord, chunk_id.to_string()));
        Ok(())
    }

    async fn upsert_entity(&self, entity_key: &str, display_name: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .entities
            .entry(entity_key.to_string())
            .or_insert_with(|| display_name.to_string());
        Ok(())
    }

    async fn link_chunk_entity(&self, chunk_id: &str, entity_key: &str, rel: &str) -> Result<()> {
        sanitize_rel(rel)?;
        let mut inner = self.inner.write().await;
        if !inner.chunks.contains_key(chunk_id) {
            return Err(StoreError::UpsertFailed(format!("unknown chunk {chunk_id}")).into());
        }
        inner
            .entity_chunks
            .entry(entity_key.to_string())
            .or_default()
            .insert(chunk_id.to_string());
        Ok(())
    }

    async fn degrees(&self, entity_keys: &[String]) -> Result<HashMap<String, usize>> {
        let inner = self.inner.read().await;
        Ok(entity_keys
            .iter()
            .map(|k| {
                let degree = inner.entity_chunks.get(k).map_or(0, |s| s.len());
                (k.clone(), degree)
            })
            .collect())
    }

    async fn chunks_for_entities(
        &self,
        entity_keys: &[String],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let inner = self.inner.read().await;

        let mut matches: BTreeMap<String, usize> = BTreeMap::new();
        for key in entity_keys {
            if let Some(chunk_ids) = inner.entity_chunks.get(key) {
                for chunk_id in chunk_ids {
                    *matches.entry(chunk_id.clone()).or_insert(0) += 1;
                }
            }
        }

        let mut scored: Vec<RetrievedChunk> = matches
            .into_iter()
            .filter_map(|(chunk_id, count)| {
                inner.chunks.get(&chunk_id).map(|(doc_id, ord, text)| {
                    let title = inner
                        .documents
                        .get(doc_id)
                        .cloned()
                        .unwrap_or_else(|| doc_id.clone());
                    RetrievedChunk {
                        id: chunk_id,
                        text: text.clone(),
                        metadata: ChunkMetadata {
                            doc_id: doc_id.clone(),
                            ord: *ord,
                            title,
                        },
                        score: entity_score(count),
                    }
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    (&a.metadata.doc_id, a.metadata.ord)
                        .cmp(&(&b.metadata.doc_id, b.metadata.ord))
                })
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn ping(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
