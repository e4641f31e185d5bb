//! Desk Copilot Library
//!
//! A local-first retrieval-augmented question-answering service for
//! service-desk knowledge bases:
//! - Ingestion into coupled vector and entity/document graph indexes
//! - Entity-aware query planning across vector, graph, and hybrid retrieval
//! - Pluggable embedding and language-model providers with stub fallbacks
//!
//! # Example
//!
//! ```rust,no_run
//! use desk_copilot::{AppContext, Settings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env()?;
//!     let context = AppContext::initialize(settings).await?;
//!
//!     context.ingest_text("Widgets 101", "A widget has parts A and B.").await?;
//!     let response = context.ask("How do the parts relate?", None, None).await?;
//!
//!     println!("{}", response.answer);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod chunker;
pub mod config;
pub mod embedding;
pub mod entities;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod planner;
pub mod responder;
pub mod retriever;
pub mod state;
pub mod store;

// Re-export main types
pub use config::Settings;
pub use embedding::{EmbeddingProvider, OllamaEmbedder, StubEmbedder, DEFAULT_DIMENSION};
pub use error::{CopilotError, ProviderError, Result, StoreError};
pub use ingest::{Chunk, Document, IngestResult, IngestionCoordinator};
pub use llm::{LmProvider, ProviderKind, StubProvider, DEFAULT_STUB_ANSWER};
pub use planner::{Planner, PlannerDecision, RetrievalMode, GRAPH_THRESHOLD};
pub use responder::{AskResponse, Citation, Responder};
pub use retriever::{Retrieval, Retriever};
pub use state::{AppContext, HealthReport};
pub use store::{
    ChunkMetadata, GraphStore, InMemoryGraphStore, InMemoryVectorStore, Neo4jGraphStore,
    RetrievedChunk, SqliteVectorStore, VectorRecord, VectorStore,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
