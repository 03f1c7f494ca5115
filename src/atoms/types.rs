// Scout Engine — Atoms: pure data types.
// No I/O, no side effects. Everything here is Serialize/Deserialize and
// freely cloneable so the engine layer can pass it across task boundaries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Message Log ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single tool-call proposal attached to an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallProposal {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String, // always "function"
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them.
    pub arguments: String,
}

/// One entry of the Message Log. `role` determines which other fields are
/// meaningful: an assistant record carries `content` and/or `tool_calls`;
/// a tool record carries `tool_call_id` and `content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallProposal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Message { role: Role::System, content: Some(text.into()), tool_calls: None, tool_call_id: None }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Message { role: Role::User, content: Some(text.into()), tool_calls: None, tool_call_id: None }
    }

    pub fn assistant(text: Option<String>, proposals: Option<Vec<ToolCallProposal>>) -> Self {
        Message { role: Role::Assistant, content: text, tool_calls: proposals, tool_call_id: None }
    }

    pub fn tool_result(id: impl Into<String>, text: impl Into<String>) -> Self {
        Message {
            role: Role::Tool,
            content: Some(text.into()),
            tool_calls: None,
            tool_call_id: Some(id.into()),
        }
    }
}

// ── Tool schema surface ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String, // always "function"
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: serde_json::Value) -> Self {
        ToolDefinition {
            tool_type: "function".into(),
            function: FunctionDefinition { name: name.into(), description: description.into(), parameters },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

// ── ThinkingStep ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingStep {
    pub step: u32,
    pub tool: String,
    pub input: serde_json::Value,
    pub output: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    pub has_code: bool,
    pub has_image: bool,
}

// ── Source ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub index: u32,
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<String>,
}

// ── Artifact ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub artifact_type: String, // "html_blog"
    pub title: String,
    pub html_content: String,
    pub file_path: String,
    pub file_size_kb: u64,
}

// ── Mode / Stage ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Chat,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Hil,
    Research,
}

// ── ChatResponse ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response_id: String,
    pub session_id: String,
    pub user_id: String,
    pub user_message: String,
    pub assistant_message: String,
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_steps: Option<Vec<ThinkingStep>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    pub used_tools: bool,
    pub has_code: bool,
    pub has_web_results: bool,
    pub total_time_ms: u64,
    pub model: String,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    pub created_at: String,
}

/// On-disk envelope for `chat_history.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistory {
    pub session_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub responses: Vec<ChatResponse>,
}

/// Lightweight summary used by list-history, built without instantiating
/// the session's engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub display_name: String,
    pub first_message: String,
    pub response_count: usize,
    pub created_at: String,
    pub updated_at: String,
}

// ── Turn submission ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    pub message: String,
    pub session_id: Option<String>,
    pub mode: Mode,
    pub temperature: Option<f64>,
    pub max_iterations: Option<u32>,
}

// ── Provider wire shapes ────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Normalized result of one (possibly streamed, possibly not) model call.
#[derive(Debug, Clone, Default)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub reasoning: Option<String>,
    pub tool_calls: Vec<ToolCallProposal>,
    pub usage: Option<TokenUsage>,
}

// ── Web search ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub age: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
}

// ── Code execution ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub size_kb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxResult {
    pub success: bool,
    pub output: String,
    pub files_generated: Vec<GeneratedFile>,
    pub execution_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub type ToolEnv = HashMap<String, String>;
