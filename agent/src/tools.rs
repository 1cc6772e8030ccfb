use ai::{HashMap, Value, create_tool, json};

/// Name of the single function the model may call.
pub(crate) const EXECUTE_QUERY: &str = "execute_query";

pub(crate) fn query_tool() -> ai::Tool {
    let parameters: HashMap<String, Value> = serde_json::from_value(json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "The SQL query to execute.",
            },
        },
        "required": ["query"],
    }))
    .expect("Invalid tool parameters");

    create_tool(
        EXECUTE_QUERY,
        "Execute a SQL query on the PostgreSQL database",
        parameters,
    )
}
