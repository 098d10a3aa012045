//! Document question answering
//!
//! Web pages, PDF files or a CSV table are loaded as text, split into
//! overlapping chunks and indexed by embedding. Questions are answered from
//! the closest chunks, which are returned as citations.

pub mod engine;
pub mod loader;
pub mod splitter;

pub use engine::{build_prompt, loader_from_config, DocumentAnswer, DocumentQueryEngine, NO_INDEX_MESSAGE};
pub use loader::{parse_csv, Document, DocumentLoader, HtmlCleaner, IngestRequest};
pub use splitter::RecursiveSplitter;
