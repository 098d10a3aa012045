use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{QueryError, Result, ValidationError};

const EMBEDDING_PROVIDERS: [&str; 2] = ["gemini", "fastembed"];
const LLM_PROVIDERS: [&str; 1] = ["gemini"];
const METRICS: [&str; 2] = ["cosine", "l2"];
const INDEX_KINDS: [&str; 2] = ["flat", "hnsw"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem found
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_database(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_sql(config, &mut errors);
        Self::validate_documents(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(QueryError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_database(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.database.include_tables.is_empty() {
            errors.push(ValidationError::new(
                "database.include_tables",
                "At least one table must be exposed",
            ));
        }

        for table in &config.database.include_tables {
            let valid = !table.is_empty()
                && table
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                errors.push(ValidationError::new(
                    "database.include_tables",
                    format!("Invalid table name: '{}'", table),
                ));
            }
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let provider = &config.embedding.provider;
        if !EMBEDDING_PROVIDERS.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "embedding.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    EMBEDDING_PROVIDERS, provider
                ),
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.model.trim().is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.dimension == Some(0) {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Dimension must be greater than 0 when set",
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        let provider = &config.llm.provider;
        if !LLM_PROVIDERS.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    LLM_PROVIDERS, provider
                ),
            ));
        }

        if config.llm.model.trim().is_empty() {
            errors.push(ValidationError::new("llm.model", "Model name cannot be empty"));
        }

        if config.llm.api_key_env.trim().is_empty() {
            errors.push(ValidationError::new(
                "llm.api_key_env",
                "API key variable name cannot be empty",
            ));
        }

        let url = &config.llm.base_url;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            errors.push(ValidationError::new(
                "llm.base_url",
                format!("Base URL must start with http:// or https://, got '{}'", url),
            ));
        }

        if config.llm.timeout_secs == Some(0) {
            errors.push(ValidationError::new(
                "llm.timeout_secs",
                "Timeout must be greater than 0 when set",
            ));
        }
    }

    fn validate_sql(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.sql.top_k == 0 {
            errors.push(ValidationError::new(
                "sql.top_k",
                "top_k must be greater than 0",
            ));
        }

        Self::validate_metric("sql.metric", &config.sql.metric, errors);
    }

    fn validate_documents(config: &Config, errors: &mut Vec<ValidationError>) {
        let docs = &config.documents;

        if docs.chunk_size == 0 {
            errors.push(ValidationError::new(
                "documents.chunk_size",
                "Chunk size must be greater than 0",
            ));
        }

        if docs.chunk_overlap >= docs.chunk_size {
            errors.push(ValidationError::new(
                "documents.chunk_overlap",
                format!(
                    "Chunk overlap ({}) must be smaller than chunk size ({})",
                    docs.chunk_overlap, docs.chunk_size
                ),
            ));
        }

        if docs.retrieve_k == 0 {
            errors.push(ValidationError::new(
                "documents.retrieve_k",
                "retrieve_k must be greater than 0",
            ));
        }

        if docs.context_k == 0 {
            errors.push(ValidationError::new(
                "documents.context_k",
                "context_k must be greater than 0",
            ));
        }

        Self::validate_metric("documents.metric", &docs.metric, errors);

        if !INDEX_KINDS.contains(&docs.index.as_str()) {
            errors.push(ValidationError::new(
                "documents.index",
                format!("Index must be one of {:?}, got '{}'", INDEX_KINDS, docs.index),
            ));
        }

        if docs.hnsw_m == 0 || docs.hnsw_ef_construction == 0 || docs.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "documents.hnsw",
                "HNSW parameters must be greater than 0",
            ));
        }
    }

    fn validate_metric(path: &str, metric: &str, errors: &mut Vec<ValidationError>) {
        if !METRICS.contains(&metric) {
            errors.push(ValidationError::new(
                path,
                format!("Metric must be one of {:?}, got '{}'", METRICS, metric),
            ));
        }
    }
}
