//! Client for OpenAI-compatible chat completions APIs

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{ChatMessage, ChatProvider, LlmError, Tool, ToolCall};

/// Talks to a chat completions endpoint with function calling enabled.
///
/// No request timeout is set. A completion blocks until the provider
/// answers or the connection drops.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn build_request_body(&self, messages: &[ChatMessage], tools: &[Tool]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": wire_messages(messages),
        });

        if !tools.is_empty() {
            body["tools"] = json!(tools);
            body["tool_choice"] = json!("auto");
        }

        body
    }
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[Tool],
    ) -> Result<ChatMessage, LlmError> {
        let body = self.build_request_body(messages, tools);
        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "requesting completion"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let reply: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("invalid completion response: {e}")))?;

        parse_reply(&reply)
    }
}

/// Convert messages to the wire format. Tool call arguments go out as
/// JSON-encoded strings, the way the protocol expects them.
fn wire_messages(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let mut msg = json!({
                "role": m.role,
                "content": m.content,
            });

            if let Some(tool_calls) = &m.tool_calls {
                msg["tool_calls"] = json!(
                    tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": serde_json::to_string(&tc.arguments)
                                        .unwrap_or_default(),
                                }
                            })
                        })
                        .collect::<Vec<_>>()
                );
            }

            if let Some(tool_call_id) = &m.tool_call_id {
                msg["tool_call_id"] = json!(tool_call_id);
            }

            if let Some(name) = &m.name {
                msg["name"] = json!(name);
            }

            msg
        })
        .collect()
}

fn parse_reply(response: &CompletionResponse) -> Result<ChatMessage, LlmError> {
    let choice = response
        .choices
        .first()
        .ok_or_else(|| LlmError::Parse("no choices in response".to_string()))?;

    let mut tool_calls = Vec::new();
    if let Some(wire_calls) = &choice.message.tool_calls {
        for call in wire_calls {
            let arguments = serde_json::from_str(&call.function.arguments).map_err(|e| {
                LlmError::Parse(format!(
                    "tool call {} arguments are not valid JSON: {e}",
                    call.id
                ))
            })?;
            tool_calls.push(ToolCall {
                id: call.id.clone(),
                name: call.function.name.clone(),
                arguments,
            });
        }
    }

    let content = choice.message.content.clone().unwrap_or_default();
    Ok(if tool_calls.is_empty() {
        ChatMessage::assistant(content)
    } else {
        ChatMessage::assistant_with_tools(content, tool_calls)
    })
}

// Wire response types

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}
