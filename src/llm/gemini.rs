use super::{truncate_at_stop, GenerationError, Generator};
use crate::gemini::GeminiTransport;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

/// Generator calling `models/{model}:generateContent`
pub struct GeminiGenerator {
    transport: GeminiTransport,
    model: String,
    temperature: f32,
}

impl GeminiGenerator {
    pub fn new(transport: GeminiTransport, model: &str, temperature: f32) -> Self {
        tracing::info!("Using generation model: {} (temperature {})", model, temperature);
        Self {
            transport,
            model: model.trim().to_string(),
            temperature,
        }
    }

    fn request<'a>(&self, prompt: &'a str, stop: &[&'a str]) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                stop_sequences: stop.to_vec(),
            },
        }
    }
}

/// Join the text parts of the first candidate
fn first_candidate_text(response: GenerateResponse) -> Result<String, GenerationError> {
    let candidate = match response.candidates.into_iter().next() {
        Some(candidate) => candidate,
        None => {
            return Err(GenerationError::Empty {
                reason: response.prompt_feedback.and_then(|f| f.block_reason),
            })
        }
    };

    let content = candidate
        .content
        .ok_or_else(|| GenerationError::Malformed("candidate has no content".to_string()))?;

    Ok(content
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect::<Vec<_>>()
        .join(""))
}

impl Generator for GeminiGenerator {
    fn generate(&self, prompt: &str, stop: &[&str]) -> Result<String, GenerationError> {
        tracing::debug!(
            "Generating with {} ({} prompt chars, {} stop sequences)",
            self.model,
            prompt.chars().count(),
            stop.len()
        );

        let response: GenerateResponse =
            self.transport
                .post(&self.model, "generateContent", &self.request(prompt, stop))?;

        let text = first_candidate_text(response)?;
        Ok(truncate_at_stop(&text, stop).to_string())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
