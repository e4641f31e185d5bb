//! Configuration management for the copilot service
//!
//! Settings are read from the environment (the deployment surface) and can
//! also be loaded from a json/toml file for tests and local development.

use crate::error::{CopilotError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the copilot service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Language-model provider configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking and retrieval knobs
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Graph store connection
    #[serde(default)]
    pub graph: GraphConfig,

    /// Vector store location
    #[serde(default)]
    pub vector: VectorConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Language-model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider selection: "auto", "ollama", "openai", or "stub"
    pub provider: String,

    /// Model name for answer generation
    pub model_name: String,

    /// Per-call timeout in seconds for outbound model requests
    pub timeout_sec: u64,

    /// Ollama server URL
    pub ollama_url: String,

    /// API key for the hosted provider
    pub openai_api_key: Option<String>,

    /// Base URL override for the hosted provider
    pub openai_base_url: Option<String>,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider selection: "auto", "remote", "inproc", or "stub"
    pub provider: String,

    /// Model name for embeddings
    pub model_name: String,

    /// Embedding dimension, fixed per deployment
    pub dimension: usize,
}

/// Chunking and retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question
    pub top_k: usize,

    /// Window size in approximate tokens
    pub chunk_tokens: usize,

    /// Overlap between consecutive windows, in tokens
    pub chunk_overlap: usize,
}

/// Graph store connection configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Bolt URI of the graph database; unset means in-memory only
    pub uri: Option<String>,

    /// Database user
    pub user: Option<String>,

    /// Database password
    pub password: Option<String>,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Directory holding the vector index files
    pub dir: PathBuf,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener
    pub bind_addr: String,

    /// Allowed CORS origins; empty means same-origin only
    pub allowed_origins: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "auto".to_string(),
            model_name: "llama3.2".to_string(),
            timeout_sec: 8,
            ollama_url: "http://localhost:11434".to_string(),
            openai_api_key: None,
            openai_base_url: None,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "auto".to_string(),
            model_name: "nomic-embed-text".to_string(),
            dimension: 384,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            chunk_tokens: 512,
            chunk_overlap: 64,
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/vectors"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            graph: GraphConfig::default(),
            vector: VectorConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_positive(key: &str) -> Result<Option<usize>> {
    match env_string(key) {
        None => Ok(None),
        Some(raw) => {
            let n: i64 = raw
                .trim()
                .parse()
                .map_err(|_| CopilotError::Config(format!("{key} must be an integer, got {raw:?}")))?;
            if n <= 0 {
                return Err(CopilotError::Config(format!("{key} must be positive, got {n}")));
            }
            Ok(Some(n as usize))
        }
    }
}

fn env_non_negative(key: &str) -> Result<Option<usize>> {
    match env_string(key) {
        None => Ok(None),
        Some(raw) => {
            let n: i64 = raw
                .trim()
                .parse()
                .map_err(|_| CopilotError::Config(format!("{key} must be an integer, got {raw:?}")))?;
            if n < 0 {
                return Err(CopilotError::Config(format!("{key} must be non-negative, got {n}")));
            }
            Ok(Some(n as usize))
        }
    }
}

impl Settings {
    /// Load settings from the process environment
    ///
    /// Unset keys fall back to defaults; set keys are validated and a bad
    /// value is a hard configuration error rather than a silent fallback.
    pub fn from_env() -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(provider) = env_string("MODEL_PROVIDER") {
            settings.model.provider = provider.trim().to_lowercase();
        }
        if let Some(name) = env_string("MODEL_NAME") {
            settings.model.model_name = name;
        }
        if let Some(timeout) = env_positive("MODEL_TIMEOUT_SEC")? {
            settings.model.timeout_sec = timeout as u64;
        }
        if let Some(url) = env_string("OLLAMA_URL") {
            settings.model.ollama_url = url;
        }
        settings.model.openai_api_key = env_string("OPENAI_API_KEY");
        settings.model.openai_base_url = env_string("OPENAI_BASE_URL");

        if let Some(provider) = env_string("EMBED_PROVIDER") {
            settings.embedding.provider = provider.trim().to_lowercase();
        }
        if let Some(name) = env_string("EMBED_MODEL") {
            settings.embedding.model_name = name;
        }

        if let Some(top_k) = env_positive("TOP_K")? {
            settings.retrieval.top_k = top_k;
        }
        if let Some(chunk_tokens) = env_positive("CHUNK_TOKENS")? {
            settings.retrieval.chunk_tokens = chunk_tokens;
        }
        if let Some(overlap) = env_non_negative("CHUNK_OVERLAP")? {
            settings.retrieval.chunk_overlap = overlap;
        }

        settings.graph.uri = env_string("GRAPH_URI");
        settings.graph.user = env_string("GRAPH_USER");
        settings.graph.password = env_string("GRAPH_PASSWORD");

        if let Some(dir) = env_string("VECTOR_DIR") {
            settings.vector.dir = PathBuf::from(dir);
        }

        if let Some(addr) = env_string("BIND_ADDR") {
            settings.server.bind_addr = addr;
        }
        if let Some(origins) = env_string("ALLOWED_ORIGINS") {
            settings.server.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a json or toml file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let settings: Settings = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| CopilotError::Config(e.to_string()))?,
            _ => {
                return Err(CopilotError::Config(
                    "unsupported config file format".to_string(),
                ))
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        const MODEL_PROVIDERS: [&str; 4] = ["auto", "ollama", "openai", "stub"];
        const EMBED_PROVIDERS: [&str; 4] = ["auto", "remote", "inproc", "stub"];

        if !MODEL_PROVIDERS.contains(&self.model.provider.as_str()) {
            return Err(CopilotError::Config(format!(
                "MODEL_PROVIDER must be one of {MODEL_PROVIDERS:?}, got {:?}",
                self.model.provider
            )));
        }
        if !EMBED_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(CopilotError::Config(format!(
                "EMBED_PROVIDER must be one of {EMBED_PROVIDERS:?}, got {:?}",
                self.embedding.provider
            )));
        }
        if self.model.model_name.trim().is_empty() {
            return Err(CopilotError::Config("model name cannot be empty".to_string()));
        }
        if self.model.timeout_sec == 0 {
            return Err(CopilotError::Config("MODEL_TIMEOUT_SEC must be positive".to_string()));
        }
        if self.embedding.dimension == 0 {
            return Err(CopilotError::Config("embedding dimension must be positive".to_string()));
        }
        if self.retrieval.top_k == 0 {
            return Err(CopilotError::Config("TOP_K must be positive".to_string()));
        }
        if self.retrieval.chunk_tokens == 0 {
            return Err(CopilotError::Config("CHUNK_TOKENS must be positive".to_string()));
        }
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_tokens {
            return Err(CopilotError::Config(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_TOKENS ({})",
                self.retrieval.chunk_overlap, self.retrieval.chunk_tokens
            )));
        }
        Ok(())
    }
}
