//! CLI command definitions and parsing
pub mod render;

use crate::documents::IngestRequest;
use crate::error::{QueryError, Result};
use crate::sql::SAMPLE_QUESTIONS;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "querykit",
    version,
    about = "Ask questions of an inventory database or a set of documents",
    long_about = "querykit answers natural-language questions in two ways: by generating and running \
                  a read-only SQL query against the T-shirt inventory database, or by retrieving the \
                  most relevant chunks of ingested web pages, PDF files or CSV tables and answering \
                  from them with citations."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/querykit/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask questions about the T-shirt inventory
    Sql {
        #[command(subcommand)]
        action: SqlAction,
    },

    /// Ask questions about web pages, PDF files or a CSV table
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Manage the demo inventory database
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum SqlAction {
    /// Answer a question with a generated SQL query
    Ask {
        /// Question text (overrides --sample)
        question: Option<String>,

        /// Ask one of the sample questions instead (1-based, see `sql samples`)
        #[arg(short, long)]
        sample: Option<usize>,

        /// Row limit suggested to the model
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// List the sample questions
    Samples,
}

#[derive(Subcommand, Debug)]
pub enum DocsAction {
    /// Ingest sources (or load a saved index) and answer a question
    Ask {
        /// Question to ask
        question: String,

        #[command(flatten)]
        sources: SourceArgs,

        /// Load a previously saved index instead of ingesting
        #[arg(long, value_name = "DIR", conflicts_with_all = ["url", "pdf", "csv"])]
        index: Option<PathBuf>,

        /// Accept the saved index contents without verification
        #[arg(long, requires = "index")]
        trust_index: bool,

        /// Save the freshly built index to this directory
        #[arg(long, value_name = "DIR")]
        save: Option<PathBuf>,
    },

    /// Ingest sources and save the index for later questions
    Ingest {
        #[command(flatten)]
        sources: SourceArgs,

        /// Directory to write the index to
        #[arg(long, value_name = "DIR")]
        save: PathBuf,
    },
}

/// Where documents come from; one kind per invocation
#[derive(Args, Debug, Default, Clone, PartialEq)]
pub struct SourceArgs {
    /// Web page to fetch (repeatable)
    #[arg(long, value_name = "URL", conflicts_with_all = ["pdf", "csv"])]
    pub url: Vec<String>,

    /// PDF file to read (repeatable)
    #[arg(long, value_name = "FILE", conflicts_with = "csv")]
    pub pdf: Vec<PathBuf>,

    /// CSV file, one document per row
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,
}

impl SourceArgs {
    /// The ingest request these flags describe, if any were given
    pub fn request(&self) -> Option<IngestRequest> {
        if let Some(csv) = &self.csv {
            Some(IngestRequest::Csv(csv.clone()))
        } else if !self.pdf.is_empty() {
            Some(IngestRequest::Pdfs(self.pdf.clone()))
        } else if !self.url.is_empty() {
            Some(IngestRequest::Urls(self.url.clone()))
        } else {
            None
        }
    }

    /// Validated request; no source flag at all reads as an empty URL list
    pub fn checked_request(&self) -> Result<IngestRequest> {
        let request = self
            .request()
            .unwrap_or_else(|| IngestRequest::Urls(Vec::new()));
        request.validate()?;
        Ok(request)
    }
}

#[derive(Subcommand, Debug)]
pub enum DbAction {
    /// Create a SQLite file seeded with the demo inventory
    Init {
        /// Database file to create
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

/// Question to ask: typed text wins, otherwise a sample (the first by default)
pub fn resolve_question(question: Option<&str>, sample: Option<usize>) -> Result<String> {
    if let Some(text) = question.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(text.to_string());
    }

    let number = sample.unwrap_or(1);
    number
        .checked_sub(1)
        .and_then(|i| SAMPLE_QUESTIONS.get(i))
        .map(|q| q.to_string())
        .ok_or_else(|| {
            QueryError::EmptyInput(format!(
                "Sample question {} does not exist (choose 1-{})",
                number,
                SAMPLE_QUESTIONS.len()
            ))
        })
}
