//! Terminal rendering of results

use crate::documents::DocumentAnswer;
use crate::error::QueryError;
use crate::store::{IndexManifest, Metadata};
use std::fmt::Write;

/// `key: value` pairs of a source's metadata
pub fn metadata_line(metadata: &Metadata) -> String {
    metadata
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Message printed before exiting on an error that halts the program
pub fn fatal_error(error: &QueryError) -> String {
    format!("Error: {}", error)
}

pub fn sql_answer(question: &str, answer: &str) -> String {
    format!("Question: {}\nAnswer: {}", question, answer)
}

pub fn samples(questions: &[&str]) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {}", i + 1, q))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Answer, numbered sources with previews, then summary metrics
pub fn document_answer(result: &DocumentAnswer, preview_chars: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Answer\n======\n{}", result.answer);

    if !result.sources.is_empty() {
        let _ = writeln!(out, "\nSources\n-------");
        for (i, source) in result.sources.iter().enumerate() {
            let _ = writeln!(out, "[{}] {}", i + 1, metadata_line(&source.metadata));
            for line in source.preview(preview_chars).lines() {
                let _ = writeln!(out, "    {}", line);
            }
        }
    }

    let _ = write!(
        out,
        "\nTotal sources: {} | Avg. content length: {} | Answer length: {} words",
        result.total_sources(),
        result.average_source_length(),
        result.answer_word_count()
    );
    out
}

pub fn manifest(manifest: &IndexManifest) -> String {
    format!(
        "Index {}\n  Chunks: {}\n  Model: {} ({}D, {})\n  Created: {}",
        manifest.index_id,
        manifest.item_count,
        manifest.embedding_model,
        manifest.dimension,
        manifest.metric,
        manifest.created_at.format("%Y-%m-%d %H:%M:%S")
    )
}
