//! querykit - natural-language query front-ends
//!
//! Two retrieval-augmented pipelines share one stack: an inventory assistant
//! that turns questions into read-only SQL over a T-shirt store database, and
//! a document assistant that answers questions from ingested web pages, PDF
//! files or CSV tables with source citations.

pub mod cli;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod gemini;
pub mod llm;
pub mod runtime;
pub mod sql;
pub mod store;

#[cfg(test)]
mod test_support;

pub use error::{QueryError, Result};
