//! Recursive character splitting
//!
//! Text is cut at the first separator in the list that occurs in it; any piece
//! still too long is cut again with the remaining separators. Small pieces are
//! then merged back up to `chunk_size` characters, carrying the tail of each
//! chunk (up to `chunk_overlap` characters) into the next one. Separators stay
//! attached to the start of the piece that follows them.

use super::loader::Document;
use crate::config::DocumentsConfig;
use crate::error::{QueryError, Result};
use std::collections::VecDeque;

pub const DEFAULT_SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(QueryError::InvalidConfigValue {
                path: "documents.chunk_size".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if chunk_overlap >= chunk_size {
            return Err(QueryError::InvalidConfigValue {
                path: "documents.chunk_overlap".to_string(),
                message: format!(
                    "overlap {} must be smaller than chunk size {}",
                    chunk_overlap, chunk_size
                ),
            });
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn from_config(config: &DocumentsConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Replace the separator list; an empty string splits between characters
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Chunks of every document, each carrying its document's metadata
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        let chunks: Vec<Document> = documents
            .iter()
            .flat_map(|document| {
                self.split_text(&document.text)
                    .into_iter()
                    .map(move |text| Document {
                        text,
                        metadata: document.metadata.clone(),
                    })
            })
            .collect();

        tracing::debug!(
            "Split {} document(s) into {} chunk(s)",
            documents.len(),
            chunks.len()
        );
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut short: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                short.push(piece);
                continue;
            }

            if !short.is_empty() {
                chunks.extend(self.merge(&short));
                short.clear();
            }
            if remaining.is_empty() {
                let piece = piece.trim();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }
        if !short.is_empty() {
            chunks.extend(self.merge(&short));
        }
        chunks
    }

    /// Greedily join pieces up to `chunk_size`, keeping up to `chunk_overlap`
    /// trailing characters as the start of the next chunk
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total,
                        self.chunk_size
                    );
                }
                if !current.is_empty() {
                    push_joined(&mut chunks, &current);
                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        match current.pop_front() {
                            Some((_, dropped)) => total -= dropped,
                            None => break,
                        }
                    }
                }
            }
            current.push_back((piece, len));
            total += len;
        }
        push_joined(&mut chunks, &current);
        chunks
    }
}

fn push_joined(chunks: &mut Vec<String>, current: &VecDeque<(&str, usize)>) {
    let joined: String = current.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split on `separator`, attaching each separator to the piece after it.
/// Empty pieces are dropped; an empty separator yields single characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (at, _) in text.match_indices(separator) {
        if at > start {
            pieces.push(&text[start..at]);
        }
        start = at;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}
