//! Embedding providers: batch text to fixed-dimension vectors
//!
//! Three variants share one contract: a remote HTTP embedder (Ollama API
//! shape), an optional in-process model behind the `fastembed-embeddings`
//! feature, and a deterministic hash-seeded stub that doubles as the startup
//! fallback.

use crate::config::{EmbeddingConfig, ModelConfig};
use crate::error::{ProviderError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Default embedding dimension, shared with the vector store
pub const DEFAULT_DIMENSION: usize = 384;

/// Embedding provider contract
///
/// `embed` returns one vector per input text, all of `dimension()` length;
/// empty input yields an empty output.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;

    fn name(&self) -> &str;

    async fn ping(&self) -> bool;
}

/// Ollama embeddings API request
#[derive(Debug, Serialize)]
struct OllamaEmbedRequest {
    model: String,
    prompt: String,
}

/// Ollama embeddings API response
#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embedding: Vec<f32>,
}

/// Remote HTTP embedder speaking the Ollama embeddings API
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
    timeout_sec: u64,
}

impl OllamaEmbedder {
    pub fn new(model_config: &ModelConfig, embedding_config: &EmbeddingConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(model_config.timeout_sec))
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            base_url: model_config.ollama_url.trim_end_matches('/').to_string(),
            model: embedding_config.model_name.clone(),
            dimension: embedding_config.dimension,
            timeout_sec: model_config.timeout_sec,
        }
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.base_url, endpoint)
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbedRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = timeout(
            Duration::from_secs(self.timeout_sec),
            self.client.post(self.api_url("embeddings")).json(&request).send(),
        )
        .await
        .map_err(|_| ProviderError::Timeout)?
        .map_err(|e| ProviderError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::Embedding(error_text).into());
        }

        let payload: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if payload.embedding.len() != self.dimension {
            return Err(ProviderError::InvalidResponse(format!(
                "expected dimension {}, got {}",
                self.dimension,
                payload.embedding.len()
            ))
            .into());
        }

        Ok(payload.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors =
            futures::future::try_join_all(texts.iter().map(|text| self.embed_one(text))).await?;
        debug!(count = vectors.len(), "embedded batch via remote provider");
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "remote"
    }

    async fn ping(&self) -> bool {
        let probe = timeout(
            Duration::from_secs(2),
            self.client.get(self.api_url("tags")).send(),
        )
        .await;
        matches!(probe, Ok(Ok(response)) if response.status().is_success())
    }
}

/// Deterministic hash-seeded embedder
///
/// Not semantic: signals are word and character-trigram hashes, normalized to
/// unit length. Identical text always produces identical vectors, which is
/// what tests and the startup fallback need.
pub struct StubEmbedder {
    dimension: usize,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn hash_string(s: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];

        let normalized: String = text
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c.is_whitespace() {
                    c.to_ascii_lowercase()
                } else {
                    ' '
                }
            })
            .collect();

        for word in normalized.split_whitespace() {
            let hash = Self::hash_string(word);
            let idx = (hash as usize) % self.dimension;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            let magnitude = 1.0 + ((hash >> 16) & 0xFF) as f32 / 255.0;
            embedding[idx] += sign * magnitude;
        }

        let chars: Vec<char> = normalized.chars().collect();
        for window in chars.windows(3) {
            let trigram: String = window.iter().collect();
            let hash = Self::hash_string(&trigram);
            let idx = (hash as usize) % self.dimension;
            let sign = if (hash >> 32) & 1 == 0 { 0.5 } else { -0.5 };
            embedding[idx] += sign;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut embedding {
                *value /= magnitude;
            }
        }

        embedding
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.generate(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "stub"
    }

    async fn ping(&self) -> bool {
        true
    }
}

/// In-process embedder backed by fastembed (all-MiniLM-L6-v2)
#[cfg(feature = "fastembed-embeddings")]
pub struct FastEmbedEmbedder {
    model: std::sync::Mutex<fastembed::TextEmbedding>,
}

#[cfg(feature = "fastembed-embeddings")]
impl FastEmbedEmbedder {
    pub fn new() -> Result<Self> {
        let options = fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false);
        let model = fastembed::TextEmbedding::try_new(options)
            .map_err(|e| ProviderError::Embedding(format!("failed to load model: {e}")))?;
        Ok(Self {
            model: std::sync::Mutex::new(model),
        })
    }
}

#[cfg(feature = "fastembed-embeddings")]
#[async_trait]
impl EmbeddingProvider for FastEmbedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut model = self
            .model
            .lock()
            .map_err(|e| ProviderError::Embedding(format!("model lock poisoned: {e}")))?;
        model
            .embed(texts.to_vec(), None)
            .map_err(|e| ProviderError::Embedding(e.to_string()).into())
    }

    fn dimension(&self) -> usize {
        DEFAULT_DIMENSION
    }

    fn name(&self) -> &str {
        "inproc"
    }

    async fn ping(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_deterministic() {
        let embedder = StubEmbedder::default();
        let a = embedder.embed(&["hello world".to_string()]).await.unwrap();
        let b = embedder.embed(&["hello world".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_stub_dimension_and_norm() {
        let embedder = StubEmbedder::default();
        let vectors = embedder.embed(&["some text".to_string()]).await.unwrap();
        assert_eq!(vectors[0].len(), DEFAULT_DIMENSION);

        let magnitude: f32 = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_stub_empty_batch() {
        let embedder = StubEmbedder::default();
        let vectors = embedder.embed(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[tokio::test]
    async fn test_stub_batch_length_matches() {
        let embedder = StubEmbedder::default();
        let texts: Vec<String> = (0..5).map(|i| format!("text {i}")).collect();
        let vectors = embedder.embed(&texts).await.unwrap();
        assert_eq!(vectors.len(), texts.len());
    }

    #[tokio::test]
    async fn test_stub_lexical_overlap_ranks_closer() {
        let embedder = StubEmbedder::default();
        let vectors = embedder
            .embed(&[
                "widget part assembly".to_string(),
                "widget part manual".to_string(),
                "completely different topic".to_string(),
            ])
            .await
            .unwrap();

        let close = crate::store::vector::cosine_distance(&vectors[0], &vectors[1]);
        let far = crate::store::vector::cosine_distance(&vectors[0], &vectors[2]);
        assert!(close < far);
    }

    #[test]
    fn test_remote_embedder_url() {
        let model = ModelConfig {
            ollama_url: "http://localhost:11434/".to_string(),
            ..ModelConfig::default()
        };
        let embedder = OllamaEmbedder::new(&model, &EmbeddingConfig::default());
        assert_eq!(embedder.api_url("embeddings"), "http://localhost:11434/api/embeddings");
    }
}
