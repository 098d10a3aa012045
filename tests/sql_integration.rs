//! Inventory assistant end to end against a seeded SQLite file
mod common;

use common::{KeywordEmbedder, ScriptedGenerator};
use querykit::config::{Config, DatabaseSettings};
use querykit::llm::GenerationError;
use querykit::sql::{Answer, InventoryAssistant, InventoryDatabase, ModelOutput, SAMPLE_QUESTIONS};
use tempfile::TempDir;

const ADIDAS_SQL: &str = "SELECT SUM(stock_quantity) FROM t_shirts WHERE brand = 'Adidas'";

fn seeded_file(dir: &TempDir) -> InventoryDatabase {
    let path = dir.path().join("inventory.db");
    InventoryDatabase::init_file(&path, false).unwrap();

    let url = format!("sqlite://{}", path.display());
    let settings = DatabaseSettings::from_lookup(|name| match name {
        "DATABASE_URL" => Some(url.clone()),
        "DB_NAME" => Some("inventory.db".to_string()),
        _ => None,
    })
    .unwrap();
    InventoryDatabase::open(&settings.location().unwrap(), &Config::default().database).unwrap()
}

fn assistant(dir: &TempDir, script: &ScriptedGenerator, use_query_checker: bool) -> InventoryAssistant {
    let config = Config::default();
    let mut sql = config.sql.clone();
    sql.use_query_checker = use_query_checker;
    InventoryAssistant::new(
        Box::new(KeywordEmbedder::default()),
        Box::new(script.clone()),
        seeded_file(dir),
        &sql,
    )
    .unwrap()
}

#[test]
fn test_adidas_stock_question() {
    let dir = TempDir::new().unwrap();
    let script = ScriptedGenerator::new([
        format!(" {}", ADIDAS_SQL),
        format!("```sql\n{};\n```", ADIDAS_SQL),
        " 832".to_string(),
    ]);
    let mut assistant = assistant(&dir, &script, true);

    assert_eq!(assistant.query_inventory(SAMPLE_QUESTIONS[0], 1), "832.00");

    let prompts = script.prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[0].contains("at most 1 results"));
    assert!(prompts[1].starts_with(ADIDAS_SQL));
    assert!(prompts[1].contains("Double check the SQLite query above"));
    assert!(prompts[2].contains("SQLResult: [(832,)]\nAnswer:"));
}

#[test]
fn test_discount_question_uses_integer_arithmetic_of_database() {
    let dir = TempDir::new().unwrap();
    let sql = "SELECT SUM(a.total_amount * ((100 - COALESCE(discounts.pct_discount, 0)) / 100)) AS total_revenue \
               FROM (SELECT SUM(price * stock_quantity) AS total_amount, t_shirt_id FROM t_shirts \
               WHERE brand = 'Adidas' AND size = 'S' GROUP BY t_shirt_id) a \
               LEFT JOIN discounts ON a.t_shirt_id = discounts.t_shirt_id";
    let script = ScriptedGenerator::new([sql, "4279"]);
    let mut assistant = assistant(&dir, &script, false);

    let answer = assistant.answer(SAMPLE_QUESTIONS[2], 1).unwrap();
    assert_eq!(answer, Answer::Numeric(4279.0));
}

#[test]
fn test_text_cell_is_returned_as_text() {
    let dir = TempDir::new().unwrap();
    let script = ScriptedGenerator::new([
        "SELECT brand, SUM(stock_quantity) AS total FROM t_shirts GROUP BY brand ORDER BY total DESC LIMIT 1",
        "Nike",
    ]);
    let mut assistant = assistant(&dir, &script, false);

    let output = assistant.run("Which brand has the most shirts?", 1).unwrap();
    match &output {
        ModelOutput::StructuredTrace { steps, result } => {
            assert_eq!(steps.len(), 1);
            assert_eq!(steps[0].sql_result.len(), 1);
            assert_eq!(result, "Nike");
        }
        other => panic!("unexpected output {:?}", other),
    }
    assert_eq!(
        assistant.query_inventory("Which brand has the most shirts?", 1),
        "Error processing query: Generation request failed: script exhausted"
    );
}

#[test]
fn test_generation_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let error = GenerationError::Api {
        status: 429,
        message: "quota exceeded".to_string(),
    };
    let script = ScriptedGenerator::failing(error.clone());
    let mut assistant = assistant(&dir, &script, true);

    assert_eq!(
        assistant.query_inventory("How many Levi shirts?", 1),
        format!("Error processing query: {}", error)
    );
    assert_eq!(script.calls(), 1);
}

#[test]
fn test_modifying_statements_never_run() {
    let dir = TempDir::new().unwrap();
    let script = ScriptedGenerator::new(["DELETE FROM t_shirts", "unused"]);
    let mut assistant = assistant(&dir, &script, false);

    let message = assistant.query_inventory("Clear the inventory", 1);
    assert_eq!(
        message,
        "Error processing query: Refusing to execute non-SELECT statement: DELETE FROM t_shirts"
    );

    let rows = assistant
        .database()
        .run("SELECT COUNT(*) FROM t_shirts")
        .unwrap();
    assert_eq!(rows[0][0].to_string(), "64");
    assert_eq!(script.calls(), 1);
}

#[test]
fn test_missing_database_file_is_a_configuration_error() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("absent.db").display());
    let settings = DatabaseSettings::from_lookup(|name| match name {
        "DATABASE_URL" => Some(url.clone()),
        "DB_NAME" => Some("absent.db".to_string()),
        _ => None,
    })
    .unwrap();

    let err = InventoryDatabase::open(&settings.location().unwrap(), &Config::default().database)
        .err()
        .unwrap();
    assert!(err.is_configuration());
}
