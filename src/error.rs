use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::{EmbeddingError, VectorIndexError};
use crate::llm::GenerationError;

/// Main error type for querykit
#[derive(Error, Debug)]
pub enum QueryError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {}", format_validation_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// A required environment variable is absent or empty
    #[error("Missing required environment variable {name}: {hint}")]
    MissingEnv { name: String, hint: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Embedding provider failures
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Generation client failures
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Approximate index failures
    #[error(transparent)]
    VectorIndex(#[from] VectorIndexError),

    /// A source could not be loaded or parsed
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// The user supplied nothing to work with
    #[error("{0}")]
    EmptyInput(String),

    /// Generated SQL that is not a read-only query
    #[error("Refusing to execute non-SELECT statement: {0}")]
    UnsafeSql(String),

    /// Persisted index load attempted without trusting its contents
    #[error("Refusing to load index at {path} without an explicit trust flag")]
    UntrustedIndex { path: PathBuf },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl QueryError {
    pub fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }

    pub fn json(source: serde_json::Error, context: impl Into<String>) -> Self {
        Self::Json {
            source,
            context: context.into(),
        }
    }

    /// Startup errors halt the process; everything else is reported per query.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::ConfigValidation { .. }
                | Self::ConfigNotFound { .. }
                | Self::InvalidConfigValue { .. }
                | Self::MissingEnv { .. }
                | Self::Toml(_)
        )
    }
}

/// Result type for querykit operations
pub type Result<T> = std::result::Result<T, QueryError>;
