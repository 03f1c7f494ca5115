// Scout Engine — OpenRouter provider.
// Grounded on `integrations/llm/openrouter.py`: every call site in the
// original (research_assistant, compact_context, the agent's final-answer
// call) uses the plain `chat()` method, never `chat_stream()`, so this
// client exposes only a non-streaming call.
// Retry/backoff shape follows the teacher's `engine/providers/openai.rs`.

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{ChatCompletion, FunctionCall, Message, Role, ToolCallProposal, ToolDefinition, TokenUsage};
use serde_json::{json, Value};
use std::time::Duration;

const BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct OpenRouterProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    /// Points the client at a different endpoint than the real OpenRouter
    /// API — used by integration tests against a local mock server.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("reqwest client");
        OpenRouterProvider { client, api_key: api_key.into(), base_url: base_url.into() }
    }

    /// Issue one chat-completion call, retrying up to 3 times with
    /// exponential backoff when the failure is a timeout or a network
    /// error. HTTP-status errors (401/402/429/502/503/other) are not
    /// retried — they are mapped straight to `EngineError::Provider`.
    pub async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        temperature: f64,
        tools: Option<&[ToolDefinition]>,
    ) -> EngineResult<ChatCompletion> {
        if model.is_empty() {
            return Err(EngineError::Config("model parameter is required".into()));
        }

        let payload = build_payload(messages, model, temperature, tools);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send(&payload).await {
                Ok(completion) => return Ok(completion),
                Err(e) if attempt < MAX_ATTEMPTS && is_retryable(&e) => {
                    let backoff = Duration::from_secs(1 << (attempt - 1).min(3));
                    log::warn!("openrouter request failed (attempt {attempt}/{MAX_ATTEMPTS}): {e}, retrying in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send(&self, payload: &Value) -> EngineResult<ChatCompletion> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::provider("openrouter", "request timed out after 30 seconds")
                } else {
                    EngineError::provider("openrouter", format!("network error: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let raw = response.text().await?;
            let body: Value = serde_json::from_str(raw.trim())
                .map_err(|e| EngineError::provider("openrouter", format!("invalid JSON response: {e}")))?;
            return Ok(parse_completion(&body));
        }

        let error_message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.get("message")).and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        let message = match status.as_u16() {
            401 => format!("authentication failed: {error_message}"),
            402 => format!("insufficient credits: {error_message}"),
            429 => format!("rate limit exceeded: {error_message}"),
            502 | 503 => format!("model unavailable: {error_message}"),
            code => format!("API error ({code}): {error_message}"),
        };
        Err(EngineError::provider("openrouter", message))
    }
}

fn is_retryable(e: &EngineError) -> bool {
    matches!(e, EngineError::Provider { message, .. } if message.contains("timed out") || message.contains("network error"))
}

fn build_payload(messages: &[Message], model: &str, temperature: f64, tools: Option<&[ToolDefinition]>) -> Value {
    let mut payload = json!({
        "model": model,
        "messages": format_messages(messages),
        "temperature": temperature,
        "usage": { "include": true },
    });
    if let Some(tools) = tools {
        if !tools.is_empty() {
            payload["tools"] = json!(tools);
            payload["tool_choice"] = json!("auto");
        }
    }
    payload
}

fn format_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            let mut entry = json!({ "role": role });
            if let Some(content) = &m.content {
                entry["content"] = json!(content);
            }
            if let Some(calls) = &m.tool_calls {
                entry["tool_calls"] = json!(calls
                    .iter()
                    .map(|c| json!({
                        "id": c.id,
                        "type": c.call_type,
                        "function": { "name": c.function.name, "arguments": c.function.arguments },
                    }))
                    .collect::<Vec<_>>());
            }
            if let Some(id) = &m.tool_call_id {
                entry["tool_call_id"] = json!(id);
            }
            entry
        })
        .collect()
}

fn parse_completion(body: &Value) -> ChatCompletion {
    let choice = &body["choices"][0]["message"];
    let content = choice.get("content").and_then(|v| v.as_str()).map(String::from);
    let reasoning = choice.get("reasoning").and_then(|v| v.as_str()).map(String::from);

    let tool_calls = choice
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|tc| {
                    Some(ToolCallProposal {
                        id: tc.get("id")?.as_str()?.to_string(),
                        call_type: "function".to_string(),
                        function: FunctionCall {
                            name: tc.get("function")?.get("name")?.as_str()?.to_string(),
                            arguments: tc.get("function")?.get("arguments")?.as_str()?.to_string(),
                        },
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let usage = body.get("usage").map(|u| TokenUsage {
        prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
        completion_tokens: u.get("completion_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
    });

    ChatCompletion { content, reasoning, tool_calls, usage }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_messages_preserves_tool_call_shape() {
        let messages = vec![Message::user("hi")];
        let formatted = format_messages(&messages);
        assert_eq!(formatted[0]["role"], "user");
        assert_eq!(formatted[0]["content"], "hi");
    }

    #[test]
    fn parse_completion_extracts_content_and_usage() {
        let body = json!({
            "choices": [{ "message": { "content": "hello" } }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5 },
        });
        let completion = parse_completion(&body);
        assert_eq!(completion.content.as_deref(), Some("hello"));
        assert_eq!(completion.usage.unwrap().prompt_tokens, 10);
    }
}
