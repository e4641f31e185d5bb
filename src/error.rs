//! Error handling for the copilot service

use thiserror::Error;

/// Result type alias for the copilot service
pub type Result<T> = std::result::Result<T, CopilotError>;

/// Main error type for the copilot service
#[derive(Error, Debug)]
pub enum CopilotError {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by embedding and language-model providers
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("timeout: operation took too long")]
    Timeout,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("no provider reachable")]
    AllUnreachable,
}

/// Errors raised by the vector or graph store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store not initialized")]
    NotInitialized,

    #[error("invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("upsert failed: {0}")]
    UpsertFailed(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<neo4rs::Error> for StoreError {
    fn from(e: neo4rs::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<sqlx::Error> for CopilotError {
    fn from(e: sqlx::Error) -> Self {
        CopilotError::Store(e.into())
    }
}

impl From<neo4rs::Error> for CopilotError {
    fn from(e: neo4rs::Error) -> Self {
        CopilotError::Store(e.into())
    }
}

impl CopilotError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CopilotError::Provider(ProviderError::Timeout)
                | CopilotError::Provider(ProviderError::ConnectionFailed(_))
        )
    }

    /// Get error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            CopilotError::BadInput(_) => "bad_input",
            CopilotError::Provider(_) => "provider",
            CopilotError::Store(_) => "store",
            CopilotError::Config(_) => "config",
            CopilotError::Io(_) => "io",
            CopilotError::Serialization(_) => "serialization",
        }
    }
}
