//! Shared HTTP transport for the Gemini generative language API
//!
//! Both the embedding provider and the generator talk to the same REST
//! surface: `POST {base_url}/models/{model}:{method}` with the API key in the
//! `x-goog-api-key` header.

use crate::config::{Credentials, LlmConfig};
use crate::error::{QueryError, Result};
use crate::runtime::ExecutionContext;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Failure talking to the API, before it is mapped into a module error
#[derive(Debug, Clone, PartialEq)]
pub enum ApiFailure {
    /// Network, TLS or timeout failure
    Request(String),
    /// Non-success HTTP status, with the server's message when present
    Status { status: u16, message: String },
    /// Response body did not match the expected shape
    Decode(String),
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiFailure::Request(msg) => write!(f, "request failed: {}", msg),
            ApiFailure::Status { status, message } => {
                write!(f, "API returned {}: {}", status, message)
            }
            ApiFailure::Decode(msg) => write!(f, "unexpected response: {}", msg),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Blocking facade over an async `reqwest` client
#[derive(Clone)]
pub struct GeminiTransport {
    client: Client,
    base_url: String,
    api_key: String,
    context: Arc<ExecutionContext>,
}

impl GeminiTransport {
    pub fn new(
        base_url: &str,
        api_key: String,
        timeout: Option<Duration>,
        context: Arc<ExecutionContext>,
    ) -> Result<Self> {
        // reqwest needs the runtime's reactor once requests are in flight
        context.ensure_ready()?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| QueryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            context,
        })
    }

    /// Transport for the configured endpoint, reading the API key from the
    /// variable named in `llm.api_key_env`
    pub fn from_config(config: &LlmConfig, context: Arc<ExecutionContext>) -> Result<Self> {
        let credentials = Credentials::from_env(&config.api_key_env)?;
        Self::new(
            &config.base_url,
            credentials.api_key,
            config.timeout_secs.map(Duration::from_secs),
            context,
        )
    }

    /// Full URL for a model method, accepting `gemini-x` or `models/gemini-x`.
    pub fn method_url(&self, model: &str, method: &str) -> String {
        format!("{}/{}:{}", self.base_url, qualified_model(model), method)
    }

    /// POST a JSON body and decode the JSON response, blocking the caller.
    pub fn post<B, R>(&self, model: &str, method: &str, body: &B) -> std::result::Result<R, ApiFailure>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self.method_url(model, method);
        tracing::debug!("POST {}", url);

        let request = async {
            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(body)
                .send()
                .await
                .map_err(|e| ApiFailure::Request(e.to_string()))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| ApiFailure::Request(e.to_string()))?;

            if !status.is_success() {
                return Err(ApiFailure::Status {
                    status: status.as_u16(),
                    message: error_message(&text),
                });
            }

            serde_json::from_str::<R>(&text).map_err(|e| ApiFailure::Decode(e.to_string()))
        };

        self.context
            .block_on(request)
            .map_err(|e| ApiFailure::Request(e.to_string()))?
    }
}

/// `models/` prefixed model name as the API expects in paths and bodies
pub fn qualified_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body.trim().to_string(),
    }
}
