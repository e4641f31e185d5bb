//! Vector store: k-NN retrieval over embedded chunks
//!
//! Two backends share one contract: a sqlite-backed store persisted under the
//! configured vector directory, and an in-memory store used as the startup
//! fallback and in tests. Both scan linearly; the corpus sizes this service
//! targets stay well inside brute-force territory.

use crate::error::{Result, StoreError};
use crate::store::{RetrievedChunk, VectorRecord};
use async_trait::async_trait;
use sqlx::{sqlite::SqlitePool, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Vector store contract
///
/// Upsert is idempotent by `chunk_id` and overwrites metadata and embedding on
/// conflict. Search returns up to `k` chunks ordered by ascending distance.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>>;

    async fn ping(&self) -> bool;

    /// Active backend name, surfaced by the health probe
    fn backend(&self) -> &'static str;
}

/// Cosine distance between two vectors: `1 - cos(a, b)`, in `[0, 2]`
///
/// Mismatched lengths and zero-magnitude inputs rank as maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 2.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }

    1.0 - dot / (norm_a * norm_b)
}

fn is_zero_vector(v: &[f32]) -> bool {
    v.is_empty() || v.iter().all(|x| *x == 0.0)
}

fn rank(records: Vec<(VectorRecord, f32)>, k: usize) -> Vec<RetrievedChunk> {
    let mut scored = records;
    scored.sort_by(|a, b| {
        a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| {
            (&a.0.metadata.doc_id, a.0.metadata.ord).cmp(&(&b.0.metadata.doc_id, b.0.metadata.ord))
        })
    });
    scored.truncate(k);
    scored
        .into_iter()
        .map(|(r, score)| RetrievedChunk {
            id: r.chunk_id,
            text: r.text,
            metadata: r.metadata,
            score,
        })
        .collect()
}

/// Zero-magnitude queries cannot rank anything; return the first `k` records
/// in `(doc_id, ord)` order so the result stays deterministic.
fn first_k(mut records: Vec<VectorRecord>, k: usize) -> Vec<RetrievedChunk> {
    records.sort_by(|a, b| {
        (&a.metadata.doc_id, a.metadata.ord).cmp(&(&b.metadata.doc_id, b.metadata.ord))
    });
    records.truncate(k);
    records
        .into_iter()
        .map(|r| RetrievedChunk {
            id: r.chunk_id,
            text: r.text,
            metadata: r.metadata,
            score: 1.0,
        })
        .collect()
}

/// Sqlite-backed vector store persisted under the vector directory
pub struct SqliteVectorStore {
    pool: SqlitePool,
    dimension: usize,
    path: PathBuf,
}

impl SqliteVectorStore {
    /// Open (or create) the store at `{dir}/vectors.db`
    pub async fn open(dir: &Path, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            StoreError::Backend(format!("failed to create vector directory: {e}"))
        })?;

        let path = dir.join("vectors.db");
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&url)
            .await
            .map_err(StoreError::from)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vectors (
                chunk_id TEXT PRIMARY KEY,
                doc_id TEXT NOT NULL,
                ord INTEGER NOT NULL,
                title TEXT NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(StoreError::from)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_doc ON vectors(doc_id, ord)")
            .execute(&pool)
            .await
            .map_err(StoreError::from)?;

        info!(path = %path.display(), "sqlite vector store ready");
        Ok(Self {
            pool,
            dimension,
            path,
        })
    }

    /// Location of the backing database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Serialize an embedding to little-endian bytes for BLOB storage
    pub fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding
            .iter()
            .flat_map(|f| f.to_le_bytes())
            .collect()
    }

    /// Deserialize an embedding from BLOB storage
    pub fn deserialize_embedding(data: &[u8]) -> Vec<f32> {
        data.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(StoreError::InvalidDimension {
                expected: self.dimension,
                actual: embedding.len(),
            }
            .into());
        }
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<VectorRecord>> {
        let rows = sqlx::query("SELECT chunk_id, doc_id, ord, title, text, embedding FROM vectors")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let ord: i64 = row.get("ord");
            records.push(VectorRecord {
                chunk_id: row.get("chunk_id"),
                text: row.get("text"),
                metadata: crate::store::ChunkMetadata {
                    doc_id: row.get("doc_id"),
                    ord: ord as usize,
                    title: row.get("title"),
                },
                embedding: Self::deserialize_embedding(&row.get::<Vec<u8>, _>("embedding")),
            });
        }
        Ok(records)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        for record in &records {
            self.check_dimension(&record.embedding)?;
        }

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO vectors (chunk_id, doc_id, ord, title, text, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(chunk_id) DO UPDATE SET
                    doc_id = excluded.doc_id,
                    ord = excluded.ord,
                    title = excluded.title,
                    text = excluded.text,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&record.chunk_id)
            .bind(&record.metadata.doc_id)
            .bind(record.metadata.ord as i64)
            .bind(&record.metadata.title)
            .bind(&record.text)
            .bind(Self::serialize_embedding(&record.embedding))
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        }
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let records = self.load_all().await?;
        if is_zero_vector(query) {
            return Ok(first_k(records, k));
        }
        self.check_dimension(query)?;

        let scored = records
            .into_iter()
            .map(|r| {
                let d = cosine_distance(query, &r.embedding);
                (r, d)
            })
            .collect();
        let results = rank(scored, k);
        debug!(hits = results.len(), "vector search complete");
        Ok(results)
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

/// In-memory vector store used as the startup fallback and in tests
///
/// Satisfies the full contract; only persistence and scalability differ.
#[derive(Default)]
pub struct InMemoryVectorStore {
    dimension: usize,
    inner: RwLock<HashMap<String, VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records held, for tests and diagnostics
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Drop every record. Supports operational resets; the graph side is
    /// intentionally left untouched.
    pub async fn purge(&self) {
        self.inner.write().await.clear();
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(StoreError::InvalidDimension {
                expected: self.dimension,
                actual: embedding.len(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        for record in &records {
            self.check_dimension(&record.embedding)?;
        }
        let mut inner = self.inner.write().await;
        for record in records {
            inner.insert(record.chunk_id.clone(), record);
        }
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let records: Vec<VectorRecord> = self.inner.read().await.values().cloned().collect();
        if is_zero_vector(query) {
            return Ok(first_k(records, k));
        }
        self.check_dimension(query)?;

        let scored = records
            .into_iter()
            .map(|r| {
                let d = cosine_distance(query, &r.embedding);
                (r, d)
            })
            .collect();
        Ok(rank(scored, k))
    }

    async fn ping(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
