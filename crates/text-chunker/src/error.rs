use thiserror::Error;

/// Result type for chunker operations
pub type Result<T> = std::result::Result<T, ChunkerError>;

/// Errors that can occur during text chunking
#[derive(Error, Debug)]
pub enum ChunkerError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A strategy was built without a capability it cannot run without
    #[error("Strategy '{strategy}' requires a {capability} capability, but none was supplied")]
    MissingCapability {
        strategy: &'static str,
        capability: &'static str,
    },

    /// Embeddings of different lengths were combined
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Strategy name could not be resolved
    #[error("Unknown chunking strategy '{name}' (valid: {})", valid.join(", "))]
    UnknownStrategy { name: String, valid: Vec<&'static str> },

    /// Embedding or completion service failed or returned unusable data
    #[error("External service failure: {0}")]
    ExternalService(String),

    /// Invalid chunk boundaries
    #[error("Invalid chunk boundaries: start={start}, end={end}")]
    InvalidBoundaries { start: usize, end: usize },

    /// Parent/child links are not bidirectionally consistent
    #[error("Inconsistent chunk hierarchy: {0}")]
    InvalidHierarchy(String),

    /// Empty content
    #[error("Empty content provided")]
    EmptyContent,

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChunkerError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an external service error
    pub fn external_service(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    /// Errors caused by how the engine was set up rather than by a runtime failure.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_) | Self::MissingCapability { .. } | Self::UnknownStrategy { .. }
        )
    }
}
