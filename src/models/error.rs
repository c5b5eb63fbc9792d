//! Error types for prefbench.
//!
//! Taxonomy:
//! - Expected failures: bad input files, unknown names, missing models
//! - Infrastructure failures: network, timeout, endpoint errors
//! - Internal: invariant violations (bugs)

use thiserror::Error;

/// Top-level error type for prefbench.
#[derive(Debug, Error)]
pub enum PrefbenchError {
    // ═══════════════════════════════════════════════════════════════════
    // EXPECTED: bad input or unknown names
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Unknown dataset: '{0}'")]
    UnknownDataset(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    // ═══════════════════════════════════════════════════════════════════
    // INFRASTRUCTURE: endpoint and transport failures
    // ═══════════════════════════════════════════════════════════════════

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // INTERNAL: invariant broken
    // ═══════════════════════════════════════════════════════════════════

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors reported by an OpenAI-compatible endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: f64 },

    #[error("API error (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request failed after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl PrefbenchError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Api(ApiError::RateLimited { .. }) => true,
            Self::Api(ApiError::Status { status, .. }) => *status >= 500,
            _ => false,
        }
    }

    /// Check if this error means the requested model is not being served.
    pub fn is_model_missing(&self) -> bool {
        matches!(self, Self::Api(ApiError::ModelNotFound(_)))
    }
}

/// Result type alias for prefbench.
pub type Result<T> = std::result::Result<T, PrefbenchError>;
