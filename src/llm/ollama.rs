//! Local-engine provider speaking the Ollama chat API

use crate::config::ModelConfig;
use crate::error::{ProviderError, Result};
use crate::llm::LmProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error};

/// Ollama chat API request
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

/// Ollama chat API response
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    done: bool,
}

/// Ollama provider
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_sec: u64,
}

impl OllamaProvider {
    pub fn new(config: &ModelConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_sec))
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.model_name.clone(),
            timeout_sec: config.timeout_sec,
        }
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.base_url, endpoint)
    }
}

#[async_trait]
impl LmProvider for OllamaProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = OllamaChatRequest {
            model: self.model.clone(),
            messages: vec![OllamaMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
        };

        let url = self.api_url("chat");
        debug!(%url, "sending generation request");

        let response = timeout(
            Duration::from_secs(self.timeout_sec),
            self.client.post(&url).json(&request).send(),
        )
        .await
        .map_err(|_| ProviderError::Timeout)?
        .map_err(|e| ProviderError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            error!("ollama API error: {error_text}");
            return Err(ProviderError::Generation(error_text).into());
        }

        let payload: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if !payload.done {
            return Err(ProviderError::InvalidResponse("incomplete response".to_string()).into());
        }

        Ok(payload.message.content)
    }

    fn name(&self) -> &str {
        "ollama"
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        let config = ModelConfig::default();
        let provider = OllamaProvider::new(&config);
        assert_eq!(provider.api_url("chat"), "http://localhost:11434/api/chat");
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = ModelConfig {
            ollama_url: "http://localhost:11434///".to_string(),
            ..ModelConfig::default()
        };
        let provider = OllamaProvider::new(&config);
        assert_eq!(provider.api_url("tags"), "http://localhost:11434/api/tags");
    }
}
