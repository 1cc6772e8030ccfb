pub mod postgres;
pub mod value;

use std::fmt::Display;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Trait defining the interface for database operations
#[async_trait]
pub trait Database: Send + Sync {
    /// Run a single SQL statement inside its own transaction.
    ///
    /// Never fails at the signature level. Engine errors, decode errors
    /// and broken connections all fold into [`QueryResult::Error`].
    async fn execute(&mut self, query: &str) -> QueryResult;

    /// Close the connection.
    async fn close(self: Box<Self>) -> Result<(), String>;
}

/// Outcome of one SQL statement, in exactly one of three wire shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResult {
    /// The statement produced a result set. Column names keep statement
    /// order and may repeat; a zero-row result keeps its columns.
    Table {
        columns: Vec<String>,
        results: Vec<Vec<Value>>,
    },
    /// The statement ran but returns no rows (writes, DDL).
    Ack { message: String },
    /// The statement failed and the transaction was rolled back.
    Error { error: String },
}

impl QueryResult {
    #[must_use]
    pub fn table(columns: Vec<String>, results: Vec<Vec<Value>>) -> Self {
        QueryResult::Table { columns, results }
    }

    #[must_use]
    pub fn ack() -> Self {
        QueryResult::Ack {
            message: "Query executed successfully".to_string(),
        }
    }

    pub fn error(error: impl Display) -> Self {
        QueryResult::Error {
            error: error.to_string(),
        }
    }

    /// The JSON text handed back to the model as tool output.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tabular_results_keep_column_order_and_duplicates() {
        let result = QueryResult::table(
            vec!["id".to_string(), "name".to_string(), "name".to_string()],
            vec![vec![json!(1), json!("a"), json!("b")]],
        );

        let encoded: Value = serde_json::from_str(&result.to_json()).unwrap();
        assert_eq!(encoded["columns"], json!(["id", "name", "name"]));
        assert_eq!(encoded["results"], json!([[1, "a", "b"]]));
    }

    #[test]
    fn zero_row_results_keep_their_columns() {
        let result = QueryResult::table(vec!["id".to_string()], vec![]);

        let encoded: Value = serde_json::from_str(&result.to_json()).unwrap();
        assert_eq!(encoded["columns"], json!(["id"]));
        assert_eq!(encoded["results"], json!([]));
    }

    #[test]
    fn acknowledgments_use_the_fixed_message() {
        assert_eq!(
            QueryResult::ack().to_json(),
            r#"{"message":"Query executed successfully"}"#
        );
    }

    #[test]
    fn errors_carry_the_engine_text() {
        let result = QueryResult::error("relation \"users\" does not exist");
        assert_eq!(
            result.to_json(),
            r#"{"error":"relation \"users\" does not exist"}"#
        );
    }

    // The untagged variants are tried in declaration order, so each wire
    // shape has to land back in the variant that produced it.
    #[test]
    fn wire_shapes_decode_back_into_the_matching_variant() {
        let shapes = [
            QueryResult::table(vec!["id".to_string()], vec![vec![json!(1)]]),
            QueryResult::ack(),
            QueryResult::error("value out of range"),
        ];

        for shape in shapes {
            let decoded: QueryResult = serde_json::from_str(&shape.to_json()).unwrap();
            assert_eq!(decoded, shape);
        }
    }
}
