mod tools;

use ai::{ChatMessage, ChatProvider, LlmError, Tool, ToolCall};
use db::{Database, QueryResult};
use serde::Deserialize;
use thiserror::Error;

const SYSTEM_PROMPT: &str = "You are a helpful database assistant. You can execute SQL queries to explore and analyze the database. Remember previous interactions and use that context to provide more relevant responses.";

/// Errors that abort a single conversational turn
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model provider call failed
    #[error("LLM error: {0}")]
    Provider(#[from] LlmError),

    /// Tool call arguments did not match the function's schema
    #[error("Invalid arguments for {tool}: {source}")]
    Arguments {
        tool: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct QueryArguments {
    query: String,
}

/// A conversational agent that answers questions about a database.
///
/// Owns the full conversation history and a single advertised capability,
/// running SQL through the database it holds. The history always starts
/// with the system prompt; each turn appends the user message, the model's
/// reply, and any tool traffic in between.
pub struct DatabaseAgent {
    provider: Box<dyn ChatProvider>,
    database: Box<dyn Database>,
    history: Vec<ChatMessage>,
    tools: Vec<Tool>,
}

impl DatabaseAgent {
    pub fn new(provider: Box<dyn ChatProvider>, database: Box<dyn Database>) -> Self {
        Self {
            provider,
            database,
            history: vec![ChatMessage::system(SYSTEM_PROMPT)],
            tools: vec![tools::query_tool()],
        }
    }

    /// Run one conversational turn.
    ///
    /// The model is offered the query tool once per turn. If it requests
    /// calls, each gets executed and answered in request order, then a
    /// follow-up completion without tools produces the final answer. An
    /// `Err` fails only this turn; the agent stays usable.
    pub async fn respond(&mut self, input: &str) -> Result<String, AgentError> {
        self.history.push(ChatMessage::user(input));

        let reply = self.provider.complete(&self.history, &self.tools).await?;
        self.history.push(reply.clone());

        let Some(tool_calls) = reply.tool_calls else {
            return Ok(reply.content);
        };

        tracing::debug!(calls = tool_calls.len(), "model requested tool calls");
        for call in &tool_calls {
            let result = self.dispatch(call).await?;
            self.history
                .push(ChatMessage::tool_result(&call.id, &call.name, result.to_json()));
        }

        let reply = self.provider.complete(&self.history, &[]).await?;
        self.history.push(reply.clone());
        Ok(reply.content)
    }

    async fn dispatch(&mut self, call: &ToolCall) -> Result<QueryResult, AgentError> {
        if call.name != tools::EXECUTE_QUERY {
            tracing::warn!(name = %call.name, "model requested an unknown function");
            return Ok(QueryResult::error(format!(
                "Unknown function: {}",
                call.name
            )));
        }

        let arguments: QueryArguments =
            serde_json::from_value(call.arguments.clone()).map_err(|source| {
                AgentError::Arguments {
                    tool: call.name.clone(),
                    source,
                }
            })?;

        Ok(self.database.execute(&arguments.query).await)
    }

    /// Drop everything but the system prompt.
    pub fn reset(&mut self) {
        self.history.truncate(1);
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Consume the agent and release the database connection.
    pub async fn close(self) -> Result<(), String> {
        self.database.close().await
    }
}
