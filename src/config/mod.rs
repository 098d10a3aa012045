//! Configuration management for querykit
//!
//! Settings come from a TOML file, then `QUERYKIT_SECTION__KEY` environment
//! overrides, then validation. Secrets and connection parameters never live
//! in the file; they are read from the environment (and `.env`) by [`env`].

use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod env;
mod validator;

pub use env::{Credentials, DatabaseSettings};
pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub sql: SqlConfig,
    pub documents: DocumentsConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Inventory database schema exposure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Tables whose schema is shown to the model
    pub include_tables: Vec<String>,
    /// Example rows appended to each table's schema
    pub sample_rows: usize,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "gemini" (hosted) or "fastembed" (local)
    pub provider: String,
    pub model: String,
    pub batch_size: usize,
    /// Requested output dimension; discovered from the first response when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub api_key_env: String,
    pub base_url: String,
    /// Per-request HTTP timeout in seconds; no timeout when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// SQL pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlConfig {
    /// Few-shot examples placed in the prompt
    pub examples_k: usize,
    /// Row limit the model is told to apply
    pub top_k: usize,
    /// Run a second generation round that double checks the drafted query
    pub use_query_checker: bool,
    pub metric: String,
}

/// Document pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Chunks retrieved per question (returned as sources)
    pub retrieve_k: usize,
    /// Retrieved chunks concatenated into the prompt
    pub context_k: usize,
    pub metric: String,
    /// "flat" (exact) or "hnsw"
    pub index: String,
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
    /// Characters shown per source in results
    pub preview_chars: usize,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(QueryError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::io(e, format!("Failed to read config file: {:?}", path))
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load from `path` (or the default location), falling back to defaults
    /// when no file exists. Env overrides and validation apply either way.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if path.exists() {
            return Self::load(&path);
        }

        tracing::warn!(
            "Config file not found at {}, using defaults. Run 'querykit config init' to create one.",
            path.display()
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| {
            QueryError::io(e, format!("Failed to write config file: {:?}", path))
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: QUERYKIT_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("QUERYKIT_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "EMBEDDING__PROVIDER" => self.embedding.provider = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__BATCH_SIZE" => self.embedding.batch_size = parse_value(path, value)?,
            "EMBEDDING__DIMENSION" => self.embedding.dimension = Some(parse_value(path, value)?),
            "LLM__PROVIDER" => self.llm.provider = value.to_string(),
            "LLM__MODEL" => self.llm.model = value.to_string(),
            "LLM__TEMPERATURE" => self.llm.temperature = parse_value(path, value)?,
            "LLM__API_KEY_ENV" => self.llm.api_key_env = value.to_string(),
            "LLM__BASE_URL" => self.llm.base_url = value.to_string(),
            "LLM__TIMEOUT_SECS" => self.llm.timeout_secs = Some(parse_value(path, value)?),
            "SQL__EXAMPLES_K" => self.sql.examples_k = parse_value(path, value)?,
            "SQL__TOP_K" => self.sql.top_k = parse_value(path, value)?,
            "SQL__USE_QUERY_CHECKER" => self.sql.use_query_checker = parse_value(path, value)?,
            "DATABASE__SAMPLE_ROWS" => self.database.sample_rows = parse_value(path, value)?,
            "DOCUMENTS__CHUNK_SIZE" => self.documents.chunk_size = parse_value(path, value)?,
            "DOCUMENTS__CHUNK_OVERLAP" => self.documents.chunk_overlap = parse_value(path, value)?,
            "DOCUMENTS__RETRIEVE_K" => self.documents.retrieve_k = parse_value(path, value)?,
            "DOCUMENTS__CONTEXT_K" => self.documents.context_k = parse_value(path, value)?,
            "DOCUMENTS__INDEX" => self.documents.index = value.to_string(),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| QueryError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("querykit").join("config.toml"))
    }
}

fn parse_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| QueryError::InvalidConfigValue {
            path: path.to_string(),
            message: format!(
                "Cannot parse '{}' as {}",
                value,
                std::any::type_name::<T>()
            ),
        })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            database: DatabaseConfig {
                include_tables: vec!["t_shirts".to_string(), "discounts".to_string()],
                sample_rows: 3,
            },
            embedding: EmbeddingConfig {
                provider: "gemini".to_string(),
                model: "models/gemini-embedding-001".to_string(),
                batch_size: 32,
                dimension: None,
            },
            llm: LlmConfig {
                provider: "gemini".to_string(),
                model: "gemini-2.5-flash".to_string(),
                temperature: 0.0,
                api_key_env: "GOOGLE_API_KEY".to_string(),
                base_url: crate::gemini::DEFAULT_BASE_URL.to_string(),
                timeout_secs: Some(60),
            },
            sql: SqlConfig {
                examples_k: 2,
                top_k: 1,
                use_query_checker: true,
                metric: "cosine".to_string(),
            },
            documents: DocumentsConfig {
                chunk_size: 500,
                chunk_overlap: 100,
                retrieve_k: 4,
                context_k: 3,
                metric: "cosine".to_string(),
                index: "flat".to_string(),
                hnsw_m: 16,
                hnsw_ef_construction: 200,
                hnsw_ef_search: 64,
                preview_chars: 500,
            },
        }
    }
}
