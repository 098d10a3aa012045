//! Curated question/query pairs shown to the model as worked examples
//!
//! Results and answers match the bundled demo inventory.

use crate::store::Metadata;

pub const QUESTION: &str = "Question";
pub const SQL_QUERY: &str = "SQLQuery";
pub const SQL_RESULT: &str = "SQLResult";
pub const ANSWER: &str = "Answer";

#[derive(Debug, Clone, PartialEq)]
pub struct FewShot {
    pub question: &'static str,
    pub sql_query: &'static str,
    pub sql_result: &'static str,
    pub answer: &'static str,
}

impl FewShot {
    /// Text that gets embedded: the four fields joined by single spaces
    pub fn embedding_text(&self) -> String {
        [self.question, self.sql_query, self.sql_result, self.answer].join(" ")
    }

    pub fn metadata(&self) -> Metadata {
        Metadata::new()
            .with(QUESTION, self.question)
            .with(SQL_QUERY, self.sql_query)
            .with(SQL_RESULT, self.sql_result)
            .with(ANSWER, self.answer)
    }
}

pub const FEW_SHOTS: &[FewShot] = &[
    FewShot {
        question: "How many t-shirts do we have left for Nike in XS size and white color?",
        sql_query: "SELECT SUM(stock_quantity) FROM t_shirts WHERE brand = 'Nike' AND color = 'White' AND size = 'XS'",
        sql_result: "Result of the SQL query",
        answer: "80",
    },
    FewShot {
        question: "How much is the total price of the inventory for all S-size t-shirts?",
        sql_query: "SELECT SUM(price * stock_quantity) FROM t_shirts WHERE size = 'S'",
        sql_result: "Result of the SQL query",
        answer: "26406",
    },
    FewShot {
        question: "If we have to sell all the Van Huesen T-shirts today with discounts applied, how much revenue will our store generate (post discounts)?",
        sql_query: "SELECT SUM(a.total_amount * ((100 - COALESCE(discounts.pct_discount, 0)) / 100)) AS total_revenue FROM (SELECT SUM(price * stock_quantity) AS total_amount, t_shirt_id FROM t_shirts WHERE brand = 'Van Huesen' GROUP BY t_shirt_id) a LEFT JOIN discounts ON a.t_shirt_id = discounts.t_shirt_id",
        sql_result: "Result of the SQL query",
        answer: "23262.35",
    },
    FewShot {
        question: "If we have to sell all the Levi's T-shirts today, how much revenue will our store generate without discount?",
        sql_query: "SELECT SUM(price * stock_quantity) FROM t_shirts WHERE brand = 'Levi'",
        sql_result: "Result of the SQL query",
        answer: "31931",
    },
    FewShot {
        question: "How many white color Levi's shirts do I have?",
        sql_query: "SELECT SUM(stock_quantity) FROM t_shirts WHERE brand = 'Levi' AND color = 'White'",
        sql_result: "Result of the SQL query",
        answer: "221",
    },
    FewShot {
        question: "How much sales amount will be generated if we sell all large size Nike t-shirts today after discounts?",
        sql_query: "SELECT SUM(a.total_amount * ((100 - COALESCE(discounts.pct_discount, 0)) / 100)) AS total_revenue FROM (SELECT SUM(price * stock_quantity) AS total_amount, t_shirt_id FROM t_shirts WHERE brand = 'Nike' AND size = 'L' GROUP BY t_shirt_id) a LEFT JOIN discounts ON a.t_shirt_id = discounts.t_shirt_id",
        sql_result: "Result of the SQL query",
        answer: "12822",
    },
];

/// Store entries for the few-shot examples
pub fn entries(examples: &[FewShot]) -> Vec<(String, Metadata)> {
    examples
        .iter()
        .map(|e| (e.embedding_text(), e.metadata()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sql::database::{InventoryDatabase, SqlValue};

    #[test]
    fn test_embedding_text_joins_fields_in_order() {
        let example = &FEW_SHOTS[0];
        let text = example.embedding_text();
        assert!(text.starts_with(example.question));
        assert!(text.ends_with(" Result of the SQL query 80"));
    }

    #[test]
    fn test_metadata_holds_template_fields() {
        let metadata = FEW_SHOTS[1].metadata();
        assert_eq!(metadata.len(), 4);
        assert_eq!(metadata.get(ANSWER), Some("26406"));
    }

    #[test]
    fn test_answers_match_demo_inventory() {
        let db = InventoryDatabase::seeded_in_memory(&Config::default().database).unwrap();
        for example in FEW_SHOTS {
            let rows = db.run(example.sql_query).unwrap();
            let value = match &rows[0][0] {
                SqlValue::Integer(i) => format!("{}", i),
                SqlValue::Real(f) => format!("{:.2}", f),
                other => panic!("unexpected value {:?} for {}", other, example.question),
            };
            assert_eq!(value, example.answer, "{}", example.question);
        }
    }
}
