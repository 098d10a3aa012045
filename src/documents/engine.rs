//! Question answering over ingested documents
//!
//! Chunks are indexed once per ingestion; every new ingestion replaces the
//! whole index. A question retrieves `retrieve_k` chunks, the first
//! `context_k` of them become the prompt context, and all retrieved chunks are
//! returned as sources.

use super::loader::{Document, DocumentLoader, IngestRequest};
use super::splitter::RecursiveSplitter;
use crate::config::{Config, DocumentsConfig};
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{QueryError, Result};
use crate::llm::{self, Generator};
use crate::runtime::ExecutionContext;
use crate::sql::postprocess::error_string;
use crate::store::{IndexManifest, ScoredItem, Store, StoreOptions, Trust};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const NO_INDEX_MESSAGE: &str = "Please process some documents first";

const CONTEXT_SEPARATOR: &str = "\n\n";

/// Grounded prompt for a question
pub fn build_prompt(context: &[ScoredItem], question: &str) -> String {
    let context = context
        .iter()
        .map(|item| item.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);
    format!(
        "Based on the following context, answer the question:\n\nContext:\n{}\n\nQuestion: {}\n\nAnswer:",
        context, question
    )
}

/// Answer text plus the chunks retrieved for it
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentAnswer {
    pub answer: String,
    pub sources: Vec<ScoredItem>,
}

impl DocumentAnswer {
    /// Error message in place of an answer, with no sources
    pub fn failed(error: &QueryError) -> Self {
        Self {
            answer: error_string(error),
            sources: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.answer.starts_with(crate::sql::ERROR_PREFIX) && self.sources.is_empty()
    }

    pub fn total_sources(&self) -> usize {
        self.sources.len()
    }

    /// Mean source length in characters, rounded down (0 without sources)
    pub fn average_source_length(&self) -> usize {
        if self.sources.is_empty() {
            return 0;
        }
        let total: usize = self.sources.iter().map(|s| s.text.chars().count()).sum();
        total / self.sources.len()
    }

    pub fn answer_word_count(&self) -> usize {
        self.answer.split_whitespace().count()
    }
}

/// Document question answering pipeline
///
/// Built once and driven by a single owner. `ingest` and `load_index` need
/// `&mut self`; asking only reads.
pub struct DocumentQueryEngine {
    embedder: Box<dyn EmbeddingProvider>,
    generator: Box<dyn Generator>,
    splitter: RecursiveSplitter,
    options: StoreOptions,
    retrieve_k: usize,
    context_k: usize,
    store: Option<Store>,
}

impl DocumentQueryEngine {
    pub fn new(
        embedder: Box<dyn EmbeddingProvider>,
        generator: Box<dyn Generator>,
        settings: &DocumentsConfig,
    ) -> Result<Self> {
        Ok(Self {
            embedder,
            generator,
            splitter: RecursiveSplitter::from_config(settings)?,
            options: StoreOptions::from_documents(settings)?,
            retrieve_k: settings.retrieve_k,
            context_k: settings.context_k,
            store: None,
        })
    }

    pub fn from_config(config: &Config, context: Arc<ExecutionContext>) -> Result<Self> {
        let embedder = embedding::from_config(config, Arc::clone(&context))?;
        let generator = llm::from_config(config, context)?;
        Self::new(embedder, generator, &config.documents)
    }

    /// Whether documents have been ingested or an index loaded
    pub fn is_ready(&self) -> bool {
        self.store.is_some()
    }

    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    pub fn retrieve_k(&self) -> usize {
        self.retrieve_k
    }

    pub fn context_k(&self) -> usize {
        self.context_k
    }

    /// Load, split and index the sources of a request
    ///
    /// The request is validated before any network or embedding call.
    pub fn process(&mut self, loader: &DocumentLoader, request: &IngestRequest) -> Result<usize> {
        let documents = loader.load(request)?;
        self.ingest(&documents)
    }

    /// Split documents and replace the index with their chunks
    pub fn ingest(&mut self, documents: &[Document]) -> Result<usize> {
        let chunks = self.splitter.split_documents(documents);
        if chunks.is_empty() {
            return Err(QueryError::EmptyInput(
                "No text could be extracted from the provided sources".to_string(),
            ));
        }

        let entries = chunks
            .into_iter()
            .map(|chunk| (chunk.text, chunk.metadata))
            .collect();
        let store = Store::build(self.embedder.as_ref(), entries, self.options)?;
        let count = store.len();
        self.store = Some(store);
        Ok(count)
    }

    /// Answer a question from the indexed chunks
    pub fn query(&self, question: &str) -> Result<DocumentAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::EmptyInput("Please enter a question".to_string()));
        }
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| QueryError::EmptyInput(NO_INDEX_MESSAGE.to_string()))?;

        let sources = store.select(self.embedder.as_ref(), question, self.retrieve_k)?;
        let context = &sources[..self.context_k.min(sources.len())];
        tracing::debug!(
            "Retrieved {} chunk(s), {} used as context",
            sources.len(),
            context.len()
        );

        let prompt = build_prompt(context, question);
        tracing::debug!("Document prompt is {} characters", prompt.chars().count());
        let answer = self.generator.generate(&prompt, &[])?;

        Ok(DocumentAnswer {
            answer: answer.trim().to_string(),
            sources,
        })
    }

    /// Like [`DocumentQueryEngine::query`], with failures rendered as an
    /// error answer
    pub fn ask(&self, question: &str) -> DocumentAnswer {
        match self.query(question) {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("Document query failed: {}", e);
                DocumentAnswer::failed(&e)
            }
        }
    }

    pub fn save_index(&self, dir: &Path) -> Result<IndexManifest> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| QueryError::EmptyInput(NO_INDEX_MESSAGE.to_string()))?;
        let manifest = store.save(dir)?;
        tracing::info!("Saved {} chunk(s) to {}", manifest.item_count, dir.display());
        Ok(manifest)
    }

    /// Replace the index with one saved earlier
    pub fn load_index(&mut self, dir: &Path, trust: Trust) -> Result<()> {
        let store = Store::load(dir, trust, self.options)?;
        if store.embedding_model() != self.embedder.model_name() {
            tracing::warn!(
                "Index was built with {} but queries use {}",
                store.embedding_model(),
                self.embedder.model_name()
            );
        }
        tracing::info!("Loaded {} chunk(s) from {}", store.len(), dir.display());
        self.store = Some(store);
        Ok(())
    }
}

/// Request timeout used for page fetches, taken from the LLM settings
pub fn loader_from_config(config: &Config, context: Arc<ExecutionContext>) -> Result<DocumentLoader> {
    DocumentLoader::new(context, config.llm.timeout_secs.map(Duration::from_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::loader::SOURCE;
    use crate::llm::GenerationError;
    use crate::store::Metadata;
    use crate::test_support::{KeywordEmbedder, ScriptedGenerator, UnreachableEmbedder, UnreachableGenerator};
    use tempfile::TempDir;

    fn settings() -> DocumentsConfig {
        Config::default().documents
    }

    fn documents() -> Vec<Document> {
        [
            "Polo shirts are made of pique cotton with a collar.",
            "Graphic tees ship with printed cotton designs.",
            "Returns are accepted within thirty days of purchase.",
            "Shipping takes five business days for cotton orders.",
            "Gift cards never expire.",
        ]
        .iter()
        .enumerate()
        .map(|(i, text)| Document::new(*text, format!("doc{}.txt", i)))
        .collect()
    }

    fn engine(generator: ScriptedGenerator) -> DocumentQueryEngine {
        let mut engine = DocumentQueryEngine::new(
            Box::new(KeywordEmbedder::default()),
            Box::new(generator),
            &settings(),
        )
        .unwrap();
        engine.ingest(&documents()).unwrap();
        engine
    }

    #[test]
    fn test_prompt_layout() {
        let item = |text: &str| ScoredItem {
            position: 0,
            text: text.to_string(),
            metadata: Metadata::new(),
            distance: 0.0,
        };
        assert_eq!(
            build_prompt(&[item("one"), item("two")], "What?"),
            "Based on the following context, answer the question:\n\nContext:\none\n\ntwo\n\nQuestion: What?\n\nAnswer:"
        );
    }

    #[test]
    fn test_asking_before_ingestion() {
        let engine = DocumentQueryEngine::new(
            Box::new(UnreachableEmbedder),
            Box::new(UnreachableGenerator),
            &settings(),
        )
        .unwrap();

        let answer = engine.ask("What is a polo?");
        assert_eq!(
            answer.answer,
            "Error processing query: Please process some documents first"
        );
        assert!(answer.sources.is_empty());
        assert!(answer.is_error());
    }

    #[test]
    fn test_retrieves_four_uses_three() {
        let generator = ScriptedGenerator::new(["  Pique cotton.  "]);
        let engine = engine(generator.clone());

        let answer = engine.ask("What cotton are polo shirts made of?");
        assert_eq!(answer.answer, "Pique cotton.");
        assert_eq!(answer.sources.len(), 4);
        assert_eq!(answer.sources[0].metadata.get(SOURCE), Some("doc0.txt"));

        let prompt = &generator.prompts()[0];
        for source in &answer.sources[..3] {
            assert!(prompt.contains(&source.text));
        }
        assert!(!prompt.contains(&answer.sources[3].text));
        assert!(prompt.ends_with("Question: What cotton are polo shirts made of?\n\nAnswer:"));
    }

    #[test]
    fn test_context_k_above_retrieve_k_uses_everything_retrieved() {
        let generator = ScriptedGenerator::new(["ok"]);
        let mut config = settings();
        config.retrieve_k = 2;
        config.context_k = 5;
        let mut engine = DocumentQueryEngine::new(
            Box::new(KeywordEmbedder::default()),
            Box::new(generator.clone()),
            &config,
        )
        .unwrap();
        engine.ingest(&documents()).unwrap();

        let answer = engine.ask("cotton");
        assert_eq!(answer.sources.len(), 2);
        for source in &answer.sources {
            assert!(generator.prompts()[0].contains(&source.text));
        }
    }

    #[test]
    fn test_generation_failure_is_an_error_answer() {
        let error = GenerationError::Api {
            status: 503,
            message: "overloaded".to_string(),
        };
        let generator = ScriptedGenerator::failing(error.clone());
        let engine = engine(generator);

        let answer = engine.ask("What about returns?");
        assert_eq!(answer.answer, format!("Error processing query: {}", error));
        assert!(answer.sources.is_empty());
        assert_eq!(answer.average_source_length(), 0);
    }

    #[test]
    fn test_blank_question() {
        let engine = engine(ScriptedGenerator::new(Vec::<String>::new()));
        assert_eq!(
            engine.ask("   ").answer,
            "Error processing query: Please enter a question"
        );
    }

    #[test]
    fn test_ingesting_nothing_is_rejected() {
        let mut engine = DocumentQueryEngine::new(
            Box::new(UnreachableEmbedder),
            Box::new(UnreachableGenerator),
            &settings(),
        )
        .unwrap();
        let err = engine.ingest(&[Document::new("  \n ", "blank.txt")]).unwrap_err();
        assert!(matches!(err, QueryError::EmptyInput(_)));
        assert!(!engine.is_ready());
    }

    #[test]
    fn test_reingestion_replaces_index() {
        let mut engine = engine(ScriptedGenerator::new(["a"]));
        assert_eq!(engine.store().map(Store::len), Some(5));

        engine
            .ingest(&[Document::new("Only this one.", "single.txt")])
            .unwrap();
        assert_eq!(engine.store().map(Store::len), Some(1));
    }

    #[test]
    fn test_metrics() {
        let item = |text: &str| ScoredItem {
            position: 0,
            text: text.to_string(),
            metadata: Metadata::new(),
            distance: 0.0,
        };
        let answer = DocumentAnswer {
            answer: "Three words here".to_string(),
            sources: vec![item("abcd"), item("abcdefg")],
        };
        assert_eq!(answer.total_sources(), 2);
        assert_eq!(answer.average_source_length(), 5);
        assert_eq!(answer.answer_word_count(), 3);
        assert!(!answer.is_error());
    }

    #[test]
    fn test_save_and_load_index() {
        let dir = TempDir::new().unwrap();
        let engine = engine(ScriptedGenerator::new(Vec::<String>::new()));
        let manifest = engine.save_index(dir.path()).unwrap();
        assert_eq!(manifest.item_count, 5);

        let generator = ScriptedGenerator::new(["Thirty days."]);
        let mut restored = DocumentQueryEngine::new(
            Box::new(KeywordEmbedder::default()),
            Box::new(generator),
            &settings(),
        )
        .unwrap();

        let err = restored.load_index(dir.path(), Trust::Refuse).unwrap_err();
        assert!(matches!(err, QueryError::UntrustedIndex { .. }));
        assert!(!restored.is_ready());

        restored.load_index(dir.path(), Trust::TrustSerialized).unwrap();
        let answer = restored.ask("How many days are returns accepted?");
        assert_eq!(answer.answer, "Thirty days.");
        assert_eq!(answer.sources[0].metadata.get(SOURCE), Some("doc2.txt"));
    }
}
