//! Prompt assembly for the SQL pipeline
//!
//! Layout: instruction block, selected examples, then the table schema and
//! the question, separated by blank lines. Selected items are only read.

use super::few_shots::{ANSWER, QUESTION, SQL_QUERY, SQL_RESULT};
use crate::store::{Metadata, ScoredItem};

pub const DIALECT: &str = "SQLite";

/// Generation stops here so the model never invents query results
pub const RESULT_STOP: &str = "\nSQLResult:";

const INSTRUCTIONS: &str = "You are a SQLite expert. Given an input question, first create a syntactically correct SQLite query to run, then look at the results of the query and return the answer to the input question.
Unless the user specifies in the question a specific number of examples to obtain, query for at most {top_k} results using the LIMIT clause as per SQLite. You can order the results to return the most informative data in the database.
Never query for all columns from a table. You must query only the columns that are needed to answer the question. Wrap each column name in double quotes (\") to denote them as delimited identifiers.
Pay attention to use only the column names you can see in the tables below. Be careful to not query for columns that do not exist. Also, pay attention to which column is in which table.
Pay attention to use date('now') function to get the current date, if the question involves \"today\".

Use the following format:

Question: Question here
SQLQuery: Query to run with no pre-amble
SQLResult: Result of the SQLQuery
Answer: Final answer here

No pre-amble.
";

const EXAMPLE_SEPARATOR: &str = "\n\n";

const QUERY_CHECKER: &str = "{query}
Double check the {dialect} query above for common mistakes, including:
- Using NOT IN with NULL values
- Using UNION when UNION ALL should have been used
- Using BETWEEN for exclusive ranges
- Data type mismatch in predicates
- Properly quoting identifiers
- Using the correct number of arguments for functions
- Casting to the correct data type
- Using the proper columns for joins

If there are any of the above mistakes, rewrite the query. If there are no mistakes, just reproduce the original query.

Output the final SQL query only.

SQL Query: ";

/// Instruction block with the row limit filled in
pub fn instructions(top_k: usize) -> String {
    INSTRUCTIONS.replace("{top_k}", &top_k.to_string())
}

/// One worked example in the `Question / SQLQuery / SQLResult / Answer` grammar
pub fn render_example(metadata: &Metadata) -> String {
    let field = |key: &str| metadata.get(key).unwrap_or_default();
    format!(
        "\nQuestion: {}\nSQLQuery: {}\nSQLResult: {}\nAnswer: {}",
        field(QUESTION),
        field(SQL_QUERY),
        field(SQL_RESULT),
        field(ANSWER)
    )
}

/// Closing block naming the usable tables and posing the question
pub fn suffix(table_info: &str, input: &str) -> String {
    format!(
        "Only use the following tables:\n{}\n\nQuestion: {}",
        table_info, input
    )
}

/// Model input for the first round: the question, primed for a query
pub fn question_input(question: &str) -> String {
    format!("{}\nSQLQuery:", question)
}

/// Model input for the answer round: query and its rows appended
pub fn answer_input(question: &str, sql: &str, rows: &str) -> String {
    format!(
        "{} {}\nSQLResult: {}\nAnswer:",
        question_input(question),
        sql,
        rows
    )
}

/// Full prompt for one generation round
pub fn build_sql_prompt(
    examples: &[ScoredItem],
    table_info: &str,
    top_k: usize,
    input: &str,
) -> String {
    let mut blocks = Vec::with_capacity(examples.len() + 2);
    blocks.push(instructions(top_k));
    blocks.extend(examples.iter().map(|e| render_example(&e.metadata)));
    blocks.push(suffix(table_info, input));
    blocks.join(EXAMPLE_SEPARATOR)
}

/// Prompt asking the model to double check a drafted query
pub fn query_checker_prompt(query: &str) -> String {
    QUERY_CHECKER
        .replace("{dialect}", DIALECT)
        .replace("{query}", query)
}
