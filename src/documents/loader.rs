//! Source loading: web pages, PDF files and CSV tables to plain-text documents
//!
//! Requests are validated before anything leaves the machine. An empty URL
//! list, for example, fails without a single network call.

use crate::error::{QueryError, Result};
use crate::runtime::ExecutionContext;
use crate::store::Metadata;
use regex::Regex;
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const SOURCE: &str = "source";
pub const ROW: &str = "row";

/// What to ingest
#[derive(Debug, Clone, PartialEq)]
pub enum IngestRequest {
    Urls(Vec<String>),
    Pdfs(Vec<PathBuf>),
    Csv(PathBuf),
}

impl IngestRequest {
    /// Reject requests with nothing usable in them
    pub fn validate(&self) -> Result<()> {
        match self {
            IngestRequest::Urls(urls) => {
                if urls.iter().all(|u| u.trim().is_empty()) {
                    return Err(QueryError::EmptyInput(
                        "Please enter at least one URL".to_string(),
                    ));
                }
                for url in urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
                    let parsed = Url::parse(url)
                        .map_err(|e| QueryError::Ingestion(format!("Invalid URL '{}': {}", url, e)))?;
                    if !matches!(parsed.scheme(), "http" | "https") {
                        return Err(QueryError::Ingestion(format!(
                            "Unsupported URL scheme '{}': {}",
                            parsed.scheme(),
                            url
                        )));
                    }
                }
            }
            IngestRequest::Pdfs(paths) => {
                if paths.is_empty() {
                    return Err(QueryError::EmptyInput(
                        "Please upload at least one PDF file".to_string(),
                    ));
                }
                for path in paths {
                    ensure_file(path)?;
                }
            }
            IngestRequest::Csv(path) => ensure_file(path)?,
        }
        Ok(())
    }

    /// Short human description for logs
    pub fn describe(&self) -> String {
        match self {
            IngestRequest::Urls(urls) => format!("{} URL(s)", urls.len()),
            IngestRequest::Pdfs(paths) => format!("{} PDF file(s)", paths.len()),
            IngestRequest::Csv(path) => format!("CSV file {}", path.display()),
        }
    }
}

fn ensure_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(QueryError::Ingestion(format!(
            "File not found: {}",
            path.display()
        )))
    }
}

/// Extracted text with provenance
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new().with(SOURCE, source),
        }
    }
}

/// Reduces an HTML page to readable text
pub struct HtmlCleaner {
    hidden: Regex,
    comments: Regex,
    breaks: Regex,
    tags: Regex,
    numeric_entities: Regex,
    spaces: Regex,
}

impl HtmlCleaner {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| QueryError::Ingestion(format!("Invalid HTML pattern: {}", e)))
        };

        Ok(Self {
            hidden: compile(r"(?is)<(script|style|noscript|template)\b.*?</(script|style|noscript|template)\s*>")?,
            comments: compile(r"(?s)<!--.*?-->")?,
            breaks: compile(r"(?i)<(br|/p|/div|/li|/tr|/h[1-6]|/title|/section|/article)\b[^>]*>")?,
            tags: compile(r"(?s)<[^>]*>")?,
            numeric_entities: compile(r"&#([xX][0-9a-fA-F]+|[0-9]+);")?,
            spaces: compile(r"[ \t\u{a0}]+")?,
        })
    }

    pub fn clean(&self, html: &str) -> String {
        let text = self.hidden.replace_all(html, " ");
        let text = self.comments.replace_all(&text, " ");
        let text = self.breaks.replace_all(&text, "\n");
        let text = self.tags.replace_all(&text, " ");
        let text = self.decode_entities(&text);

        text.lines()
            .map(|line| self.spaces.replace_all(line, " ").trim().to_string())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn decode_entities(&self, text: &str) -> String {
        let decoded = self.numeric_entities.replace_all(text, |caps: &regex::Captures| {
            let digits = &caps[1];
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => digits.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        });

        decoded
            .replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&")
    }
}

/// Turns an ingest request into documents
pub struct DocumentLoader {
    client: Client,
    context: Arc<ExecutionContext>,
    cleaner: HtmlCleaner,
}

impl DocumentLoader {
    pub fn new(context: Arc<ExecutionContext>, timeout: Option<Duration>) -> Result<Self> {
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
            context,
            cleaner: HtmlCleaner::new()?,
        })
    }

    pub fn load(&self, request: &IngestRequest) -> Result<Vec<Document>> {
        request.validate()?;
        tracing::info!("Loading {}", request.describe());

        let documents = match request {
            IngestRequest::Urls(urls) => urls
                .iter()
                .map(|u| u.trim())
                .filter(|u| !u.is_empty())
                .map(|u| self.fetch_url(u))
                .collect::<Result<Vec<_>>>()?,
            IngestRequest::Pdfs(paths) => paths
                .iter()
                .map(|p| load_pdf(p))
                .collect::<Result<Vec<_>>>()?,
            IngestRequest::Csv(path) => load_csv(path)?,
        };

        let documents: Vec<Document> = documents
            .into_iter()
            .filter(|d| !d.text.trim().is_empty())
            .collect();
        if documents.is_empty() {
            return Err(QueryError::EmptyInput(
                "No text could be extracted from the provided sources".to_string(),
            ));
        }

        tracing::info!("Loaded {} document(s)", documents.len());
        Ok(documents)
    }

    fn fetch_url(&self, url: &str) -> Result<Document> {
        tracing::debug!("GET {}", url);

        let request = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| QueryError::Ingestion(format!("Failed to fetch {}: {}", url, e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(QueryError::Ingestion(format!(
                    "Failed to fetch {}: HTTP {}",
                    url, status
                )));
            }

            let is_html = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map_or(true, |v| v.contains("html"));
            let body = response
                .text()
                .await
                .map_err(|e| QueryError::Ingestion(format!("Failed to read {}: {}", url, e)))?;
            Ok((is_html, body))
        };

        let (is_html, body) = self.context.block_on(request)??;
        let text = if is_html {
            self.cleaner.clean(&body)
        } else {
            body
        };
        Ok(Document::new(text, url))
    }
}

pub fn load_pdf(path: &Path) -> Result<Document> {
    let text = pdf_extract::extract_text(path).map_err(|e| {
        QueryError::Ingestion(format!(
            "Failed to extract text from PDF '{}': {}",
            path.display(),
            e
        ))
    })?;
    Ok(Document::new(text, path.display().to_string()))
}

pub fn load_csv(path: &Path) -> Result<Vec<Document>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| QueryError::io(e, format!("Failed to read CSV file: {:?}", path)))?;
    parse_csv(&content, &path.display().to_string())
}

/// One document per data row, rendered as `column: value` lines
pub fn parse_csv(content: &str, source: &str) -> Result<Vec<Document>> {
    let mut records = parse_records(content)?.into_iter();
    let header = match records.next() {
        Some(header) => header,
        None => return Ok(Vec::new()),
    };

    let mut documents = Vec::new();
    for (row, record) in records.enumerate() {
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        let text = header
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let value = record.get(i).map(String::as_str).unwrap_or_default();
                format!("{}: {}", column.trim(), value.trim())
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut document = Document::new(text, source);
        document.metadata.insert(ROW, row.to_string());
        documents.push(document);
    }
    Ok(documents)
}

/// RFC 4180 records: quoted fields may hold commas, doubled quotes and newlines
fn parse_records(content: &str) -> Result<Vec<Vec<String>>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(QueryError::Ingestion(
            "Unterminated quoted field in CSV".to_string(),
        ));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}
