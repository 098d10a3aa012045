//! Reduction of raw model output to a final answer
//!
//! Every function here is pure. Parsing problems never fail: they fall back
//! through trace value, `Answer:` text, then the unmodified string.

use super::database::{Row, SqlValue};
use crate::error::QueryError;

pub const ERROR_PREFIX: &str = "Error processing query: ";

const ANSWER_LABEL: &str = "Answer:";

/// One executed SQL step of a chain run
#[derive(Debug, Clone, PartialEq)]
pub struct TraceStep {
    pub sql_query: String,
    pub sql_result: Vec<Row>,
}

/// Everything a chain run can hand back
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// Executed steps plus the model's final text
    StructuredTrace { steps: Vec<TraceStep>, result: String },
    /// Model text with no execution trace
    FreeTextAnswer(String),
    /// A bare value
    RawScalar(SqlValue),
}

/// Final answer shown to the user
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// Rounded to two decimals; always displayed with two fractional digits
    Numeric(f64),
    Text(String),
}

impl std::fmt::Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Answer::Numeric(v) => write!(f, "{:.2}", v),
            Answer::Text(s) => f.write_str(s),
        }
    }
}

/// Strip markdown code fences around a query and collapse whitespace
pub fn clean_sql_query(sql: &str) -> String {
    let mut body = sql.trim();
    if let Some(rest) = strip_prefix_ignore_case(body, "```sql") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    body = body.trim_end();
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove stray code fences anywhere in a user question
pub fn clean_question(question: &str) -> String {
    let mut cleaned = String::with_capacity(question.len());
    let mut rest = question;

    while let Some(at) = rest.find("```") {
        let after = &rest[at + 3..];
        match strip_prefix_ignore_case(after, "sql") {
            Some(tail) => {
                cleaned.push_str(&rest[..at]);
                rest = tail.trim_start();
            }
            None => {
                cleaned.push_str(rest[..at].trim_end());
                rest = after;
            }
        }
    }
    cleaned.push_str(rest);
    cleaned.trim().to_string()
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

fn parse_finite(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        // Too large to carry a fractional part anyway
        return value;
    }
    let rounded = scaled.round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Numeric answer rounded to two decimals when the text reads as a number
///
/// Tries the text as is, then once more with everything but digits, `.` and
/// `-` removed. Anything else comes back unchanged as text.
pub fn format_numeric_answer(value: &str) -> Answer {
    if let Some(number) = parse_finite(value) {
        return Answer::Numeric(round2(number));
    }

    let digits: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if !digits.is_empty() {
        if let Some(number) = parse_finite(&digits) {
            return Answer::Numeric(round2(number));
        }
    }

    Answer::Text(value.to_string())
}

/// Answer for a single database cell
pub fn format_value(value: &SqlValue) -> Answer {
    match value {
        SqlValue::Integer(i) => Answer::Numeric(round2(*i as f64)),
        SqlValue::Real(f) if f.is_finite() => Answer::Numeric(round2(*f)),
        SqlValue::Text(text) => format_numeric_answer(text),
        other => Answer::Text(other.to_string()),
    }
}

/// Text after the last `Answer:` label (the whole text when there is none)
pub fn answer_text(result: &str) -> &str {
    result
        .rsplit(ANSWER_LABEL)
        .next()
        .unwrap_or(result)
        .trim()
}

/// First cell of the first non-empty row of the first step that has one
pub fn first_trace_value(steps: &[TraceStep]) -> Option<&SqlValue> {
    steps
        .iter()
        .find_map(|step| step.sql_result.first().and_then(|row| row.first()))
}

/// Reduce any model output to the final answer
pub fn extract_answer(output: &ModelOutput) -> Answer {
    match output {
        ModelOutput::StructuredTrace { steps, result } => match first_trace_value(steps) {
            Some(value) => format_value(value),
            None => format_numeric_answer(answer_text(result)),
        },
        ModelOutput::FreeTextAnswer(text) => format_numeric_answer(answer_text(text)),
        ModelOutput::RawScalar(value) => format_value(value),
    }
}

/// User-facing form of a per-query failure
pub fn error_string(error: &QueryError) -> String {
    format!("{}{}", ERROR_PREFIX, error)
}
