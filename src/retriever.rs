//! Retrieval execution with the graph/vector fallback lattice
//!
//! Read-only: executes the planner's decision against the stores. A store or
//! provider failure during a question is downgraded to an empty result for
//! that mode so the defined fallbacks apply; the request itself never fails.

use crate::embedding::EmbeddingProvider;
use crate::error::{ProviderError, Result};
use crate::planner::{PlannerDecision, RetrievalMode};
use crate::store::{GraphStore, RetrievedChunk, VectorStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Retrieval output: ranked chunks plus observability notes
///
/// Results are returned in the order the primary source produced them; hybrid
/// preserves vector order after filtering. Notes record which fallbacks fired.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub chunks: Vec<RetrievedChunk>,
    pub notes: Vec<String>,
}

/// Executes a planner decision against the vector and graph stores
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    vector: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vector: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
    ) -> Self {
        Self {
            embedder,
            vector,
            graph,
        }
    }

    pub async fn retrieve(&self, question: &str, decision: &PlannerDecision) -> Retrieval {
        let mut retrieval = Retrieval::default();
        let k = decision.top_k;

        match decision.mode {
            RetrievalMode::Vector => {
                retrieval.chunks = self.vector_results(question, k, &mut retrieval.notes).await;
            }
            RetrievalMode::Graph => {
                let graph_chunks = self.graph_results(&decision.entities, k, &mut retrieval.notes).await;
                if graph_chunks.is_empty() {
                    retrieval
                        .notes
                        .push("graph returned no chunks; falling back to vector".to_string());
                    retrieval.chunks = self.vector_results(question, k, &mut retrieval.notes).await;
                } else {
                    retrieval.chunks = graph_chunks;
                }
            }
            RetrievalMode::Hybrid => {
                let graph_chunks = self.graph_results(&decision.entities, k, &mut retrieval.notes).await;
                if graph_chunks.is_empty() {
                    retrieval
                        .notes
                        .push("graph returned no chunks; falling back to vector".to_string());
                    retrieval.chunks = self.vector_results(question, k, &mut retrieval.notes).await;
                } else {
                    let vector_chunks =
                        self.vector_results(question, k, &mut retrieval.notes).await;
                    retrieval.chunks =
                        intersect_hybrid(graph_chunks, vector_chunks, &mut retrieval.notes);
                }
            }
        }

        debug!(
            mode = %decision.mode,
            hits = retrieval.chunks.len(),
            notes = retrieval.notes.len(),
            "retrieval complete"
        );
        retrieval
    }

    async fn vector_results(
        &self,
        question: &str,
        k: usize,
        notes: &mut Vec<String>,
    ) -> Vec<RetrievedChunk> {
        match self.try_vector(question, k).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "vector retrieval failed; treating as empty");
                notes.push(format!("vector retrieval failed: {e}"));
                Vec::new()
            }
        }
    }

    async fn try_vector(&self, question: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let mut embeddings = self.embedder.embed(&[question.to_string()]).await?;
        let query = embeddings
            .pop()
            .ok_or_else(|| ProviderError::InvalidResponse("no query embedding".to_string()))?;
        self.vector.search(&query, k).await
    }

    async fn graph_results(
        &self,
        entities: &[String],
        k: usize,
        notes: &mut Vec<String>,
    ) -> Vec<RetrievedChunk> {
        if entities.is_empty() {
            return Vec::new();
        }
        match self.graph.chunks_for_entities(entities, k).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "graph retrieval failed; treating as empty");
                notes.push(format!("graph retrieval failed: {e}"));
                Vec::new()
            }
        }
    }
}

/// Hybrid intersection: keep vector hits that the graph also reached.
///
/// When the vector side is empty there is nothing to filter and the graph
/// results win; when only the intersection is empty the graph provided no
/// usable signal and the vector results win unfiltered.
fn intersect_hybrid(
    graph_chunks: Vec<RetrievedChunk>,
    vector_chunks: Vec<RetrievedChunk>,
    notes: &mut Vec<String>,
) -> Vec<RetrievedChunk> {
    if vector_chunks.is_empty() {
        notes.push("vector results empty; returning graph results".to_string());
        return graph_chunks;
    }

    let graph_ids: HashSet<&str> = graph_chunks.iter().map(|c| c.id.as_str()).collect();
    let filtered: Vec<RetrievedChunk> = vector_chunks
        .iter()
        .filter(|c| graph_ids.contains(c.id.as_str()))
        .cloned()
        .collect();

    if filtered.is_empty() {
        notes.push("no graph/vector intersection; returning vector results".to_string());
        vector_chunks
    } else {
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChunkMetadata;

    fn chunk(id: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            id: id.to_string(),
            text: format!("text {id}"),
            metadata: ChunkMetadata {
                doc_id: id.split('-').next().unwrap_or(id).to_string(),
                ord: 0,
                title: "T".to_string(),
            },
            score,
        }
    }

    #[test]
    fn test_hybrid_intersection_preserves_vector_order() {
        let graph = vec![chunk("b-0", 0.5), chunk("a-0", 0.33)];
        let vector = vec![chunk("a-0", 0.1), chunk("b-0", 0.2), chunk("c-0", 0.3)];
        let mut notes = Vec::new();

        let result = intersect_hybrid(graph, vector, &mut notes);
        let ids: Vec<&str> = result.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a-0", "b-0"]);
        assert!(notes.is_empty());
    }

    #[test]
    fn test_hybrid_empty_intersection_vectors_win() {
        let graph = vec![chunk("x-0", 0.5)];
        let vector = vec![chunk("a-0", 0.1), chunk("b-0", 0.2)];
        let mut notes = Vec::new();

        let result = intersect_hybrid(graph, vector, &mut notes);
        assert_eq!(result.len(), 2);
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("no graph/vector intersection"));
    }

    #[test]
    fn test_hybrid_empty_vector_graph_wins() {
        let graph = vec![chunk("x-0", 0.5)];
        let mut notes = Vec::new();

        let result = intersect_hybrid(graph, Vec::new(), &mut notes);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "x-0");
        assert!(notes[0].contains("vector results empty"));
    }
}
