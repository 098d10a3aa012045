//! Natural-language questions over the inventory database
//!
//! One run: select similar worked examples, ask the model for a query,
//! optionally have it double check the query, execute it, then ask for the
//! final answer given the rows. Every failure ends the run; nothing is
//! retried.

use super::database::{format_rows, InventoryDatabase};
use super::few_shots::{self, FEW_SHOTS};
use super::postprocess::{
    clean_question, clean_sql_query, error_string, extract_answer, Answer, ModelOutput, TraceStep,
};
use super::prompt::{answer_input, build_sql_prompt, query_checker_prompt, question_input, RESULT_STOP};
use crate::config::{Config, DatabaseSettings, SqlConfig};
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{QueryError, Result};
use crate::llm::{self, GenerationError, Generator};
use crate::runtime::ExecutionContext;
use crate::store::{Store, StoreOptions};
use std::sync::Arc;

/// Questions offered when the user does not type one
pub const SAMPLE_QUESTIONS: &[&str] = &[
    "How many Adidas T shirts I have left in my store?",
    "How many t-shirts do we have left for Nike in XS size and white color?",
    "How much sales amount will be generated if we sell all small size Adidas shirts today after discounts?",
];

const QUERY_LABEL: &str = "SQLQuery:";
const RESULT_LABEL: &str = "SQLResult:";

/// Query text from a completion: after the last `SQLQuery:`, before any
/// `SQLResult:`
fn extract_sql(completion: &str) -> &str {
    let after = completion.rsplit(QUERY_LABEL).next().unwrap_or(completion);
    after.split(RESULT_LABEL).next().unwrap_or(after).trim()
}

/// SQL question answering pipeline
///
/// Build once and reuse. A single owner drives it, one question at a time.
pub struct InventoryAssistant {
    embedder: Box<dyn EmbeddingProvider>,
    generator: Box<dyn Generator>,
    database: InventoryDatabase,
    examples: Store,
    examples_k: usize,
    top_k: usize,
    use_query_checker: bool,
}

impl InventoryAssistant {
    /// Embeds the worked examples up front
    pub fn new(
        embedder: Box<dyn EmbeddingProvider>,
        generator: Box<dyn Generator>,
        database: InventoryDatabase,
        settings: &SqlConfig,
    ) -> Result<Self> {
        let options = StoreOptions::flat(settings.metric.parse()?);
        let examples = Store::build(embedder.as_ref(), few_shots::entries(FEW_SHOTS), options)?;

        Ok(Self {
            embedder,
            generator,
            database,
            examples,
            examples_k: settings.examples_k,
            top_k: settings.top_k,
            use_query_checker: settings.use_query_checker,
        })
    }

    /// Wire up the hosted clients and the database named in the environment
    pub fn from_config(config: &Config, context: Arc<ExecutionContext>) -> Result<Self> {
        let settings = DatabaseSettings::from_env()?;
        let database = InventoryDatabase::open(&settings.location()?, &config.database)?;
        let embedder = embedding::from_config(config, Arc::clone(&context))?;
        let generator = llm::from_config(config, context)?;
        Self::new(embedder, generator, database, &config.sql)
    }

    /// Row limit used when the caller does not give one
    pub fn default_top_k(&self) -> usize {
        self.top_k
    }

    pub fn database(&self) -> &InventoryDatabase {
        &self.database
    }

    /// Run the chain and return the raw output with its execution trace
    pub fn run(&mut self, question: &str, top_k: usize) -> Result<ModelOutput> {
        let question = clean_question(question);
        if question.is_empty() {
            return Err(QueryError::EmptyInput("Please enter a question".to_string()));
        }
        tracing::info!("Question: {}", question);

        let table_info = self.database.table_info()?;
        let examples = self
            .examples
            .select(self.embedder.as_ref(), &question, self.examples_k)?;
        tracing::debug!("Selected {} worked examples", examples.len());

        let prompt = build_sql_prompt(&examples, &table_info, top_k, &question_input(&question));
        tracing::debug!("SQL prompt is {} characters", prompt.chars().count());
        let draft = self.generator.generate(&prompt, &[RESULT_STOP])?;
        let mut sql = extract_sql(&draft).to_string();

        if self.use_query_checker {
            let checked = self.generator.generate(&query_checker_prompt(&sql), &[])?;
            sql = extract_sql(&checked).to_string();
        }

        let sql = clean_sql_query(&sql);
        if sql.is_empty() {
            return Err(GenerationError::Malformed("model did not return a SQL query".to_string()).into());
        }
        tracing::info!("SQL: {}", sql);

        let rows = self.database.run(&sql)?;
        let rows_text = format_rows(&rows);

        let prompt = build_sql_prompt(
            &examples,
            &table_info,
            top_k,
            &answer_input(&question, &sql, &rows_text),
        );
        let result = self.generator.generate(&prompt, &[RESULT_STOP])?;

        Ok(ModelOutput::StructuredTrace {
            steps: vec![TraceStep {
                sql_query: sql,
                sql_result: rows,
            }],
            result,
        })
    }

    /// Final answer for a question, or the error that ended the run
    pub fn answer(&mut self, question: &str, top_k: usize) -> Result<Answer> {
        let output = self.run(question, top_k)?;
        Ok(extract_answer(&output))
    }

    /// Display string for a question; failures become
    /// `Error processing query: <message>`
    pub fn query_inventory(&mut self, question: &str, top_k: usize) -> String {
        match self.answer(question, top_k) {
            Ok(answer) => answer.to_string(),
            Err(e) => {
                tracing::warn!("Query failed: {}", e);
                error_string(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_support::{KeywordEmbedder, ScriptedGenerator};

    const ADIDAS_SQL: &str = "SELECT SUM(stock_quantity) FROM t_shirts WHERE brand = 'Adidas'";

    fn assistant(generator: ScriptedGenerator, use_query_checker: bool) -> InventoryAssistant {
        let config = Config::default();
        let mut sql = config.sql.clone();
        sql.use_query_checker = use_query_checker;
        let database = InventoryDatabase::seeded_in_memory(&config.database).unwrap();
        InventoryAssistant::new(
            Box::new(KeywordEmbedder::default()),
            Box::new(generator),
            database,
            &sql,
        )
        .unwrap()
    }

    #[test]
    fn test_extract_sql() {
        assert_eq!(extract_sql(" SELECT 1"), "SELECT 1");
        assert_eq!(extract_sql("Question: q\nSQLQuery: SELECT 2\nSQLResult: [(2,)]"), "SELECT 2");
        assert_eq!(extract_sql("SQLQuery: a SQLQuery: SELECT 3"), "SELECT 3");
    }

    #[test]
    fn test_adidas_question_end_to_end() {
        let generator = ScriptedGenerator::new([
            format!(" {}", ADIDAS_SQL),
            format!("```sql\n{}\n```", ADIDAS_SQL),
            " 832".to_string(),
        ]);
        let mut assistant = assistant(generator, true);

        let output = assistant.run(SAMPLE_QUESTIONS[0], 1).unwrap();
        match &output {
            ModelOutput::StructuredTrace { steps, .. } => {
                assert_eq!(steps.len(), 1);
                assert_eq!(steps[0].sql_query, ADIDAS_SQL);
            }
            other => panic!("unexpected output {:?}", other),
        }
        assert_eq!(extract_answer(&output).to_string(), "832.00");
    }

    #[test]
    fn test_prompts_sent_to_model() {
        let generator = ScriptedGenerator::new([ADIDAS_SQL, "832"]);
        let config = Config::default();
        let mut sql = config.sql.clone();
        sql.use_query_checker = false;

        let mut assistant = InventoryAssistant::new(
            Box::new(KeywordEmbedder::default()),
            Box::new(generator.clone()),
            InventoryDatabase::seeded_in_memory(&config.database).unwrap(),
            &sql,
        )
        .unwrap();
        assert_eq!(assistant.query_inventory(SAMPLE_QUESTIONS[0], 1), "832.00");

        assert_eq!(generator.stops(), vec![vec![RESULT_STOP.to_string()]; 2]);

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("query for at most 1 results"));
        assert_eq!(prompts[0].matches("\nSQLResult: Result of the SQL query").count(), 2);
        assert!(prompts[0].contains("CREATE TABLE t_shirts"));
        assert!(prompts[0].ends_with("How many Adidas T shirts I have left in my store?\nSQLQuery:"));
        assert!(prompts[1].ends_with(&format!(
            "SQLQuery: {}\nSQLResult: [(832,)]\nAnswer:",
            ADIDAS_SQL
        )));
    }

    #[test]
    fn test_generation_failure_becomes_error_string() {
        let error = GenerationError::Request("connection refused".to_string());
        let mut assistant = assistant(ScriptedGenerator::failing(error.clone()), true);
        assert_eq!(
            assistant.query_inventory("How many Nike shirts?", 1),
            format!("Error processing query: {}", error)
        );
    }

    #[test]
    fn test_write_statement_is_refused() {
        let generator = ScriptedGenerator::new(["DROP TABLE t_shirts", "unused"]);
        let mut assistant = assistant(generator, false);

        let message = assistant.query_inventory("Delete everything", 1);
        assert!(message.starts_with("Error processing query: Refusing to execute"));
        assert!(assistant
            .database()
            .table_names()
            .unwrap()
            .contains(&"t_shirts".to_string()));
    }

    #[test]
    fn test_empty_rows_fall_back_to_answer_text() {
        let generator = ScriptedGenerator::new([
            "SELECT stock_quantity FROM t_shirts WHERE brand = 'Puma'",
            "Answer: 0",
        ]);
        let mut assistant = assistant(generator, false);
        assert_eq!(assistant.answer("How many Puma shirts?", 1).unwrap(), Answer::Numeric(0.0));
    }

    #[test]
    fn test_blank_question() {
        let mut assistant = assistant(ScriptedGenerator::new(Vec::<String>::new()), false);
        assert_eq!(
            assistant.query_inventory("```sql ```", 1),
            "Error processing query: Please enter a question"
        );
    }

    #[test]
    fn test_missing_query_is_malformed() {
        let generator = ScriptedGenerator::new(["   "]);
        let mut assistant = assistant(generator, false);
        let err = assistant.answer("How many?", 1).unwrap_err();
        assert!(matches!(err, QueryError::Generation(GenerationError::Malformed(_))));
    }
}
