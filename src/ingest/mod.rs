//! Ingestion pipeline: chunk, embed, and upsert into both indexes
//!
//! All mutation of the vector and graph stores flows through the coordinator.
//! The stores are not jointly transactional; vector upserts always precede
//! graph upserts so hybrid retrieval never surfaces a chunk id without a
//! vector representation.

pub mod sources;
pub mod types;

pub use sources::{DisabledCrawler, PageCrawler, PdfExtractBackend, PdfTextExtractor};
pub use types::{Chunk, Document, IngestResult};

use crate::chunker;
use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::entities::extract_entities;
use crate::error::{ProviderError, Result};
use crate::store::{ChunkMetadata, GraphStore, VectorRecord, VectorStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Orchestrates the ingest pipeline under the idempotency and ordering rules
pub struct IngestionCoordinator {
    retrieval: RetrievalConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    vector: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
}

impl IngestionCoordinator {
    pub fn new(
        retrieval: RetrievalConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        vector: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
    ) -> Self {
        Self {
            retrieval,
            embedder,
            vector,
            graph,
        }
    }

    /// Ingest a block of text as one new document
    ///
    /// Every call creates a fresh document; two identical ingests create two
    /// documents. Callers wanting deduplication compute a content hash and
    /// skip before calling.
    pub async fn ingest_text(&self, title: &str, text: &str) -> Result<IngestResult> {
        let started = Instant::now();
        let text = text.trim();
        if text.is_empty() {
            return Ok(IngestResult::empty(elapsed_ms(started)));
        }

        let document = Document::new(title);
        let windows = chunker::split(
            text,
            self.retrieval.chunk_tokens,
            self.retrieval.chunk_overlap,
        );
        let chunks: Vec<Chunk> = windows
            .into_iter()
            .map(|w| Chunk::from_window(&document.doc_id, w))
            .collect();

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "embedded {} of {} chunks",
                embeddings.len(),
                chunks.len()
            ))
            .into());
        }

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorRecord {
                chunk_id: chunk.chunk_id.clone(),
                text: chunk.text.clone(),
                metadata: ChunkMetadata {
                    doc_id: document.doc_id.clone(),
                    ord: chunk.ord,
                    title: document.title.clone(),
                },
                embedding,
            })
            .collect();
        let vector_count = records.len();

        // Vector first; a graph failure past this point leaves a partial
        // ingest in place rather than rolling back.
        self.vector.upsert(records).await?;

        let graph_result = self.upsert_graph(&document, &chunks).await;
        let entities = match graph_result {
            Ok(entities) => entities,
            Err(e) => {
                warn!(
                    doc_id = %document.doc_id,
                    error = %e,
                    "graph upsert failed after vector success; partial ingest left in place"
                );
                return Err(e);
            }
        };

        let result = IngestResult {
            chunks: chunks.len(),
            entities,
            vector_count,
            ms: elapsed_ms(started),
            pages: None,
        };
        info!(
            doc_id = %document.doc_id,
            chunks = result.chunks,
            entities = result.entities,
            ms = result.ms,
            "ingested document"
        );
        Ok(result)
    }

    async fn upsert_graph(&self, document: &Document, chunks: &[Chunk]) -> Result<usize> {
        self.graph
            .upsert_document(&document.doc_id, &document.title)
            .await?;
        for chunk in chunks {
            self.graph.upsert_chunk(chunk).await?;
            self.graph
                .link_doc_chunk(&document.doc_id, &chunk.chunk_id)
                .await?;
        }

        let entities = extract_entities(chunks.iter().map(|c| c.text.as_str()));
        let lowered: Vec<(String, String)> = chunks
            .iter()
            .map(|c| (c.chunk_id.clone(), c.text.to_lowercase()))
            .collect();

        for entity in &entities {
            self.graph.upsert_entity(entity, entity).await?;
            for (chunk_id, lowered_text) in &lowered {
                if lowered_text.contains(entity.as_str()) {
                    self.graph
                        .link_chunk_entity(chunk_id, entity, "ABOUT")
                        .await?;
                }
            }
        }
        debug!(entities = entities.len(), "graph upsert complete");
        Ok(entities.len())
    }

    /// Ingest a PDF via the byte-to-text collaborator
    pub async fn ingest_pdf(
        &self,
        title: &str,
        bytes: &[u8],
        extractor: &dyn PdfTextExtractor,
    ) -> Result<IngestResult> {
        let text = extractor.extract(bytes)?;
        let pages = sources::form_feed_pages(&text);
        let mut result = self.ingest_text(title, &text).await?;
        result.pages = Some(pages);
        Ok(result)
    }

    /// Crawl from a root URL and ingest one document per page
    pub async fn ingest_url(
        &self,
        url: &str,
        max_depth: usize,
        max_pages: usize,
        crawler: &dyn PageCrawler,
    ) -> Result<IngestResult> {
        let started = Instant::now();
        let pages = crawler.crawl(url, max_depth, max_pages).await?;

        let mut total = IngestResult::empty(0);
        for (page_url, page_text) in &pages {
            let page_result = self.ingest_text(page_url, page_text).await?;
            total.chunks += page_result.chunks;
            total.entities += page_result.entities;
            total.vector_count += page_result.vector_count;
        }
        total.pages = Some(pages.len());
        total.ms = elapsed_ms(started);
        Ok(total)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
