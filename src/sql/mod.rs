//! Inventory question answering over SQL
//!
//! A question is turned into a single read-only query against the inventory
//! database with the help of a few worked examples chosen by similarity. The
//! rows (or the model's answer text) are reduced to one display answer.
//!
//! - `database`: connection, schema description, guarded execution
//! - `few_shots`: the curated worked examples
//! - `prompt`: prompt templates
//! - `postprocess`: answer extraction from model output
//! - `chain`: the end-to-end pipeline

pub mod chain;
pub mod database;
pub mod few_shots;
pub mod postprocess;
pub mod prompt;

pub use chain::{InventoryAssistant, SAMPLE_QUESTIONS};
pub use database::{format_rows, InventoryDatabase, Row, SqlValue};
pub use few_shots::{FewShot, FEW_SHOTS};
pub use postprocess::{
    clean_question, clean_sql_query, error_string, extract_answer, format_numeric_answer, Answer,
    ModelOutput, TraceStep, ERROR_PREFIX,
};
