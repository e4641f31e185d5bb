//! Process state: dependency construction, fallback activation, health
//!
//! Each external dependency is constructed once at startup; a failure swaps in
//! the in-memory or stub fallback before the service accepts traffic.
//! Hot-swapping after startup is out of scope.

use crate::config::Settings;
use crate::embedding::{EmbeddingProvider, OllamaEmbedder, StubEmbedder};
use crate::error::{CopilotError, Result};
use crate::ingest::{
    sources::PageCrawler, DisabledCrawler, IngestResult, IngestionCoordinator, PdfExtractBackend,
    PdfTextExtractor,
};
use crate::llm::{select_provider, LmProvider, OllamaProvider, OpenAiProvider, StubProvider};
use crate::planner::Planner;
use crate::responder::{AskResponse, Responder};
use crate::retriever::Retriever;
use crate::store::{
    GraphStore, InMemoryGraphStore, InMemoryVectorStore, Neo4jGraphStore, SqliteVectorStore,
    VectorStore,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Health probe output for one dependency
#[derive(Debug, Clone, Serialize)]
pub struct DependencyHealth {
    pub reachable: bool,
    pub active: String,
}

/// Full health report
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub provider: String,
    pub model_name: String,
    pub llm_reachable: bool,
    pub embedder_reachable: bool,
    pub vector_reachable: bool,
    pub graph_reachable: bool,
    pub llm: DependencyHealth,
    pub embedder: DependencyHealth,
    pub vector: DependencyHealth,
    pub graph: DependencyHealth,
    pub graph_backend: String,
    pub vector_store_path: String,
    pub vector_store_path_exists: bool,
}

/// Process-wide application context threaded through request handlers
pub struct AppContext {
    pub settings: Settings,
    embedder: Arc<dyn EmbeddingProvider>,
    vector: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
    lm: Arc<dyn LmProvider>,
    configured_provider: String,
    coordinator: IngestionCoordinator,
    planner: Planner,
    retriever: Retriever,
    pdf: Arc<dyn PdfTextExtractor>,
    crawler: Arc<dyn PageCrawler>,
    sqlite: Option<Arc<SqliteVectorStore>>,
    vector_store_path: PathBuf,
}

impl AppContext {
    /// Construct every dependency, activating fallbacks where needed
    pub async fn initialize(settings: Settings) -> Result<Self> {
        settings.validate()?;

        let (vector, sqlite) = build_vector_store(&settings).await;
        let graph = build_graph_store(&settings).await;
        let embedder = build_embedder(&settings).await;
        let selection = select_provider(&settings.model).await;

        let vector_store_path = settings.vector.dir.join("vectors.db");
        Ok(Self::assemble(
            settings,
            embedder,
            vector,
            graph,
            selection.provider,
            selection.configured,
            sqlite,
            vector_store_path,
        ))
    }

    /// Assemble a context from pre-built components; tests use this to wire
    /// in-memory stores and failing providers directly.
    #[allow(clippy::too_many_arguments)]
    pub fn with_parts(
        settings: Settings,
        embedder: Arc<dyn EmbeddingProvider>,
        vector: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        lm: Arc<dyn LmProvider>,
        configured_provider: String,
    ) -> Self {
        let path = settings.vector.dir.join("vectors.db");
        Self::assemble(settings, embedder, vector, graph, lm, configured_provider, None, path)
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        settings: Settings,
        embedder: Arc<dyn EmbeddingProvider>,
        vector: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        lm: Arc<dyn LmProvider>,
        configured_provider: String,
        sqlite: Option<Arc<SqliteVectorStore>>,
        vector_store_path: PathBuf,
    ) -> Self {
        let coordinator = IngestionCoordinator::new(
            settings.retrieval.clone(),
            embedder.clone(),
            vector.clone(),
            graph.clone(),
        );
        let planner = Planner::new(graph.clone(), settings.retrieval.top_k);
        let retriever = Retriever::new(embedder.clone(), vector.clone(), graph.clone());

        Self {
            settings,
            embedder,
            vector,
            graph,
            lm,
            configured_provider,
            coordinator,
            planner,
            retriever,
            pdf: Arc::new(PdfExtractBackend),
            crawler: Arc::new(DisabledCrawler),
            sqlite,
            vector_store_path,
        }
    }

    /// Install a crawler implementation for url ingestion
    pub fn with_crawler(mut self, crawler: Arc<dyn PageCrawler>) -> Self {
        self.crawler = crawler;
        self
    }

    pub async fn ingest_text(&self, title: &str, text: &str) -> Result<IngestResult> {
        self.coordinator.ingest_text(title, text).await
    }

    pub async fn ingest_pdf(&self, title: &str, bytes: &[u8]) -> Result<IngestResult> {
        self.coordinator.ingest_pdf(title, bytes, self.pdf.as_ref()).await
    }

    pub async fn ingest_url(
        &self,
        url: &str,
        max_depth: usize,
        max_pages: usize,
    ) -> Result<IngestResult> {
        self.coordinator
            .ingest_url(url, max_depth, max_pages, self.crawler.as_ref())
            .await
    }

    /// Answer a question: plan, retrieve, respond
    pub async fn ask(
        &self,
        question: &str,
        top_k: Option<usize>,
        provider_override: Option<&str>,
    ) -> Result<AskResponse> {
        let started = Instant::now();
        let question = question.trim();
        if question.is_empty() {
            return Err(CopilotError::BadInput("question cannot be empty".to_string()));
        }
        if let Some(k) = top_k {
            if k == 0 {
                return Err(CopilotError::BadInput("top_k must be positive".to_string()));
            }
        }

        let mut decision = self.planner.plan(question).await?;
        if let Some(k) = top_k {
            decision.top_k = k;
        }

        let retrieval = self.retriever.retrieve(question, &decision).await;
        let responder = self.responder_for(provider_override)?;
        Ok(responder.answer(question, &decision, &retrieval, started).await)
    }

    fn responder_for(&self, provider_override: Option<&str>) -> Result<Responder> {
        match provider_override.map(|p| p.trim().to_lowercase()) {
            None => Ok(Responder::new(
                self.lm.clone(),
                self.configured_provider.clone(),
            )),
            Some(name) if name == self.configured_provider => Ok(Responder::new(
                self.lm.clone(),
                self.configured_provider.clone(),
            )),
            Some(name) => match name.as_str() {
                "stub" => Ok(Responder::new(Arc::new(StubProvider), "stub".to_string())),
                "ollama" => Ok(Responder::new(
                    Arc::new(OllamaProvider::new(&self.settings.model)),
                    "ollama".to_string(),
                )),
                "openai" => Ok(Responder::new(
                    Arc::new(OpenAiProvider::new(&self.settings.model)),
                    "openai".to_string(),
                )),
                other => Err(CopilotError::BadInput(format!(
                    "unknown provider override {other:?}"
                ))),
            },
        }
    }

    /// Probe every dependency
    pub async fn health(&self) -> HealthReport {
        let llm_reachable = self.lm.ping().await;
        let embedder_reachable = self.embedder.ping().await;
        let vector_reachable = self.vector.ping().await;
        let graph_reachable = self.graph.ping().await;

        HealthReport {
            status: "ok".to_string(),
            provider: self.configured_provider.clone(),
            model_name: self.settings.model.model_name.clone(),
            llm_reachable,
            embedder_reachable,
            vector_reachable,
            graph_reachable,
            llm: DependencyHealth {
                reachable: llm_reachable,
                active: self.lm.name().to_string(),
            },
            embedder: DependencyHealth {
                reachable: embedder_reachable,
                active: self.embedder.name().to_string(),
            },
            vector: DependencyHealth {
                reachable: vector_reachable,
                active: self.vector.backend().to_string(),
            },
            graph: DependencyHealth {
                reachable: graph_reachable,
                active: self.graph.backend().to_string(),
            },
            graph_backend: self.graph.backend().to_string(),
            vector_store_path: self.vector_store_path.display().to_string(),
            vector_store_path_exists: self.vector_store_path.exists(),
        }
    }

    /// Release external handles
    pub async fn shutdown(&self) {
        if let Some(sqlite) = &self.sqlite {
            sqlite.close().await;
        }
        info!("application context shut down");
    }
}

async fn build_vector_store(
    settings: &Settings,
) -> (Arc<dyn VectorStore>, Option<Arc<SqliteVectorStore>>) {
    match SqliteVectorStore::open(&settings.vector.dir, settings.embedding.dimension).await {
        Ok(store) => {
            let store = Arc::new(store);
            if store.ping().await {
                return (store.clone() as Arc<dyn VectorStore>, Some(store));
            }
            warn!("sqlite vector store unreachable after open; using in-memory fallback");
            (
                Arc::new(InMemoryVectorStore::new(settings.embedding.dimension)),
                None,
            )
        }
        Err(e) => {
            warn!(error = %e, "sqlite vector store unavailable; using in-memory fallback");
            (
                Arc::new(InMemoryVectorStore::new(settings.embedding.dimension)),
                None,
            )
        }
    }
}

async fn build_graph_store(settings: &Settings) -> Arc<dyn GraphStore> {
    let Some(uri) = &settings.graph.uri else {
        info!("no graph database configured; using in-memory graph store");
        return Arc::new(InMemoryGraphStore::new());
    };

    let user = settings.graph.user.as_deref().unwrap_or("neo4j");
    let password = settings.graph.password.as_deref().unwrap_or("");
    match Neo4jGraphStore::connect(uri, user, password).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "graph database unavailable; using in-memory fallback");
            Arc::new(InMemoryGraphStore::new())
        }
    }
}

async fn build_embedder(settings: &Settings) -> Arc<dyn EmbeddingProvider> {
    match settings.embedding.provider.as_str() {
        "stub" => Arc::new(StubEmbedder::new(settings.embedding.dimension)),
        "remote" => {
            let remote = OllamaEmbedder::new(&settings.model, &settings.embedding);
            if remote.ping().await {
                Arc::new(remote)
            } else {
                warn!("remote embedder unreachable; using stub embedder");
                Arc::new(StubEmbedder::new(settings.embedding.dimension))
            }
        }
        "inproc" => build_inproc_embedder(settings),
        _ => {
            // auto: prefer the remote embedder when it answers
            let remote = OllamaEmbedder::new(&settings.model, &settings.embedding);
            if remote.ping().await {
                info!("auto-selected remote embedder");
                Arc::new(remote)
            } else {
                info!("auto-selected stub embedder");
                Arc::new(StubEmbedder::new(settings.embedding.dimension))
            }
        }
    }
}

#[cfg(feature = "fastembed-embeddings")]
fn build_inproc_embedder(settings: &Settings) -> Arc<dyn EmbeddingProvider> {
    match crate::embedding::FastEmbedEmbedder::new() {
        Ok(embedder) => Arc::new(embedder),
        Err(e) => {
            warn!(error = %e, "in-process embedder failed to load; using stub embedder");
            Arc::new(StubEmbedder::new(settings.embedding.dimension))
        }
    }
}

#[cfg(not(feature = "fastembed-embeddings"))]
fn build_inproc_embedder(settings: &Settings) -> Arc<dyn EmbeddingProvider> {
    warn!("in-process embedder not compiled in; using stub embedder");
    Arc::new(StubEmbedder::new(settings.embedding.dimension))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_context() -> AppContext {
        let mut settings = Settings::default();
        settings.model.provider = "stub".to_string();
        settings.embedding.provider = "stub".to_string();

        AppContext::with_parts(
            settings.clone(),
            Arc::new(StubEmbedder::new(settings.embedding.dimension)),
            Arc::new(InMemoryVectorStore::new(settings.embedding.dimension)),
            Arc::new(InMemoryGraphStore::new()),
            Arc::new(StubProvider),
            "stub".to_string(),
        )
    }

    #[tokio::test]
    async fn test_ask_rejects_empty_question() {
        let context = stub_context();
        assert!(matches!(
            context.ask("   ", None, None).await,
            Err(CopilotError::BadInput(_))
        ));
    }

    #[tokio::test]
    async fn test_ask_rejects_zero_top_k() {
        let context = stub_context();
        assert!(context.ask("q", Some(0), None).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_provider_override_rejected() {
        let context = stub_context();
        assert!(context.ask("q", None, Some("frontier")).await.is_err());
    }

    #[tokio::test]
    async fn test_health_reports_memory_backends() {
        let context = stub_context();
        let health = context.health().await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.graph_backend, "memory");
        assert_eq!(health.vector.active, "memory");
        assert!(health.embedder_reachable);
        assert!(!health.vector_store_path.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_and_ask_roundtrip() {
        let context = stub_context();
        context
            .ingest_text("Widgets 101", "A widget has parts A, B, and C.")
            .await
            .unwrap();
        let response = context.ask("Widgets 101", None, None).await.unwrap();
        assert!(!response.answer.is_empty());
        assert_eq!(response.provider, "stub");
    }
}
