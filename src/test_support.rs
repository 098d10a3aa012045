//! Deterministic stand-ins for the hosted clients
//!
//! Shared by unit tests and the integration tests under `tests/`, so imports
//! go through the including module's `embedding` and `llm` paths.
#![allow(dead_code)]

use super::embedding::{EmbeddingError, EmbeddingProvider};
use super::llm::{GenerationError, Generator};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const KEYWORD_DIM: usize = 512;

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in token.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Each lowercase token adds 1.0 to a hashed bucket
pub fn keyword_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; KEYWORD_DIM];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let bucket = (fnv1a(&token.to_lowercase()) % KEYWORD_DIM as u64) as usize;
        vector[bucket] += 1.0;
    }
    vector
}

/// Bag-of-words embedder; clones share one call counter
#[derive(Clone, Default)]
pub struct KeywordEmbedder {
    calls: Arc<AtomicUsize>,
}

impl KeywordEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for KeywordEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(keyword_vector(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        KEYWORD_DIM
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

/// Embedder that must never be called
pub struct UnreachableEmbedder;

impl EmbeddingProvider for UnreachableEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        panic!("embedding provider should not be called")
    }

    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        panic!("embedding provider should not be called")
    }

    fn dimension(&self) -> usize {
        0
    }

    fn model_name(&self) -> &str {
        "unreachable"
    }
}

/// Replays canned completions in order and records every prompt.
/// Clones share the script, so a test can keep one and box the other.
#[derive(Clone)]
pub struct ScriptedGenerator {
    replies: Arc<Mutex<VecDeque<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    stops: Arc<Mutex<Vec<Vec<String>>>>,
    /// Returned once the replies run out
    exhausted: GenerationError,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().map(Into::into).collect())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            stops: Arc::new(Mutex::new(Vec::new())),
            exhausted: GenerationError::Request("script exhausted".to_string()),
        }
    }

    /// Every call fails with `error`
    pub fn failing(error: GenerationError) -> Self {
        Self {
            exhausted: error,
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Stop sequences of every call, in order
    pub fn stops(&self) -> Vec<Vec<String>> {
        self.stops.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, prompt: &str, stop: &[&str]) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.stops
            .lock()
            .unwrap()
            .push(stop.iter().map(|s| s.to_string()).collect());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| self.exhausted.clone())
    }

    fn model_name(&self) -> &str {
        "scripted-test"
    }
}

/// Generator that must never be called
pub struct UnreachableGenerator;

impl Generator for UnreachableGenerator {
    fn generate(&self, _prompt: &str, _stop: &[&str]) -> Result<String, GenerationError> {
        panic!("generator should not be called")
    }

    fn model_name(&self) -> &str {
        "unreachable"
    }
}
