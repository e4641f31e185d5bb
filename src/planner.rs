//! Query planning: route a question to a retrieval mode
//!
//! The decision rides on entity presence and graph degree. Small service-desk
//! graphs are sparse, so pure graph retrieval only wins once an entity is
//! well-connected.

use crate::entities::extract_entities;
use crate::error::Result;
use crate::store::GraphStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Minimum maximum-degree at which the planner selects pure graph retrieval
pub const GRAPH_THRESHOLD: usize = 3;

/// Retrieval mode chosen for a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetrievalMode {
    Vector,
    Graph,
    Hybrid,
}

impl std::fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrievalMode::Vector => write!(f, "VECTOR"),
            RetrievalMode::Graph => write!(f, "GRAPH"),
            RetrievalMode::Hybrid => write!(f, "HYBRID"),
        }
    }
}

/// Planner output: mode, the reasons behind it, and the usable entities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerDecision {
    pub mode: RetrievalMode,
    pub reasons: Vec<String>,
    pub top_k: usize,
    /// Question entities with positive graph degree
    pub entities: Vec<String>,
}

/// Entity-aware query planner
pub struct Planner {
    graph: Arc<dyn GraphStore>,
    top_k: usize,
}

impl Planner {
    pub fn new(graph: Arc<dyn GraphStore>, top_k: usize) -> Self {
        Self { graph, top_k }
    }

    pub async fn plan(&self, question: &str) -> Result<PlannerDecision> {
        let qents = extract_entities([question]);

        let degrees = if qents.is_empty() {
            Default::default()
        } else {
            match self.graph.degrees(&qents).await {
                Ok(degrees) => degrees,
                Err(e) => {
                    warn!(error = %e, "degree lookup failed; planning without graph");
                    Default::default()
                }
            }
        };

        let max_degree = degrees.values().copied().max().unwrap_or(0);
        let (mode, reason) = if qents.is_empty() || max_degree == 0 {
            (RetrievalMode::Vector, "no graph entities")
        } else if max_degree >= GRAPH_THRESHOLD {
            (RetrievalMode::Graph, "graph coverage >= 3")
        } else {
            (RetrievalMode::Hybrid, "graph is sparse")
        };

        let entities: Vec<String> = qents
            .into_iter()
            .filter(|e| degrees.get(e).copied().unwrap_or(0) > 0)
            .collect();

        debug!(%mode, max_degree, entities = entities.len(), "planned retrieval");
        Ok(PlannerDecision {
            mode,
            reasons: vec![reason.to_string()],
            top_k: self.top_k,
            entities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Chunk;
    use crate::store::InMemoryGraphStore;

    async fn graph_with_degree(key: &str, degree: usize) -> Arc<InMemoryGraphStore> {
        let store = Arc::new(InMemoryGraphStore::new());
        store.upsert_document("d", "Doc").await.unwrap();
        store.upsert_entity(key, key).await.unwrap();
        for ord in 0..degree {
            let chunk = Chunk {
                chunk_id: format!("d-{ord}"),
                doc_id: "d".to_string(),
                ord,
                text: format!("{key} text"),
                tokens: 2,
            };
            store.upsert_chunk(&chunk).await.unwrap();
            store.link_doc_chunk("d", &chunk.chunk_id).await.unwrap();
            store
                .link_chunk_entity(&chunk.chunk_id, key, "ABOUT")
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_no_entities_selects_vector() {
        let planner = Planner::new(Arc::new(InMemoryGraphStore::new()), 6);
        let decision = planner.plan("???").await.unwrap();
        assert_eq!(decision.mode, RetrievalMode::Vector);
        assert_eq!(decision.reasons, vec!["no graph entities"]);
        assert!(decision.entities.is_empty());
    }

    #[tokio::test]
    async fn test_zero_degree_selects_vector() {
        let planner = Planner::new(Arc::new(InMemoryGraphStore::new()), 6);
        let decision = planner.plan("How do Widget parts work?").await.unwrap();
        assert_eq!(decision.mode, RetrievalMode::Vector);
        assert!(decision.entities.is_empty());
    }

    #[tokio::test]
    async fn test_sparse_degree_selects_hybrid() {
        let graph = graph_with_degree("widget", 2).await;
        let planner = Planner::new(graph, 6);
        let decision = planner.plan("Tell me about the widget").await.unwrap();
        assert_eq!(decision.mode, RetrievalMode::Hybrid);
        assert_eq!(decision.reasons, vec!["graph is sparse"]);
        assert_eq!(decision.entities, vec!["widget".to_string()]);
    }

    #[tokio::test]
    async fn test_dense_degree_selects_graph() {
        let graph = graph_with_degree("widget", GRAPH_THRESHOLD).await;
        let planner = Planner::new(graph, 6);
        let decision = planner.plan("Tell me about the widget").await.unwrap();
        assert_eq!(decision.mode, RetrievalMode::Graph);
        assert_eq!(decision.reasons, vec!["graph coverage >= 3"]);
    }

    #[tokio::test]
    async fn test_top_k_carried_through() {
        let planner = Planner::new(Arc::new(InMemoryGraphStore::new()), 4);
        let decision = planner.plan("anything").await.unwrap();
        assert_eq!(decision.top_k, 4);
    }

    #[test]
    fn test_mode_serializes_uppercase() {
        let json = serde_json::to_string(&RetrievalMode::Hybrid).unwrap();
        assert_eq!(json, "\"HYBRID\"");
    }
}
