// Scout Engine — research_assistant (C4.4.4).
// Grounded on `chat/tools/research_assistant.py`: a nested sub-agent with
// its own persisted conversation and a single `file_read` tool, used to
// keep heavy reading out of the main agent's context.

use crate::atoms::types::{FunctionDefinition, ToolDefinition};
use crate::engine::message_log::MessageLog;
use crate::engine::providers::openrouter::OpenRouterProvider;
use crate::engine::tools::files;
use crate::engine::workspace::Workspace;
use serde_json::{json, Value};

const MAX_ITERATIONS: u32 = 10;
const MODEL: &str = "openai/gpt-5";
const TEMPERATURE: f64 = 0.7;

const SYSTEM_PROMPT: &str = "You are a friendly research buddy - think of yourself as a helpful colleague who's here to chat and collaborate.\n\n\
**You're here to help with:**\n\
- Reading and analyzing files from the workspace\n\
- Giving second opinions on research direction\n\
- Answering questions about content you've read\n\
- Reviewing drafts and providing feedback\n\n\
**Available tools:**\n\
- file_read: Read workspace files (progress.md, notes.md, draft.md, cache/*.md, etc.)\n\n\
**How to interact:**\n\
- Be conversational and approachable - no formality needed\n\
- When asked about a file, just read it with file_read\n\
- Give honest, helpful feedback\n\
- Remember our conversation as we go\n\
- Don't hesitate to ask clarifying questions if something's unclear\n\n\
Remember: you're a collaborator, not a servant. Feel free to push back, ask questions, or suggest alternatives.";

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".into(),
        function: FunctionDefinition {
            name: "research_assistant".into(),
            description: "Chat with a friendly research buddy who can read and analyze workspace files for you. Great for a second opinion on articles, comparing sources, or reviewing your drafts. The buddy remembers your conversation via conv_id.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "question": { "type": "string", "description": "Your question or request for the research assistant." },
                    "conv_id": { "type": "string", "description": "Conversation ID to continue a previous dialogue. Omit to start a new conversation." }
                },
                "required": ["question"]
            }),
        },
    }
}

pub async fn execute(workspace: &Workspace, openrouter: &OpenRouterProvider, args: &Value) -> Value {
    let Some(question) = args["question"].as_str() else {
        return json!({ "success": false, "error": "missing 'question' argument", "answer": "" });
    };
    let requested_conv_id = args["conv_id"].as_str().map(String::from);

    let (conv_id, is_new) = match &requested_conv_id {
        Some(id) => (id.clone(), false),
        None => (format!("conv_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]), true),
    };
    let conv_dir = workspace.root().join("conversations").join(&conv_id);

    if !is_new && !conv_dir.join("messages.json").exists() {
        return json!({
            "success": false,
            "error": format!("Conversation {conv_id} not found. Omit conv_id to start a new conversation."),
            "answer": "",
        });
    }

    let mut log = match MessageLog::load(&conv_dir) {
        Ok(log) => log,
        Err(e) => return json!({ "success": false, "error": e.to_string(), "answer": "" }),
    };
    if is_new {
        if let Err(e) = log.append_system(SYSTEM_PROMPT) {
            return json!({ "success": false, "error": e.to_string(), "answer": "" });
        }
    }
    if let Err(e) = log.append_user(question) {
        return json!({ "success": false, "error": e.to_string(), "answer": "" });
    }

    let file_read_tool = [files::definitions().into_iter().find(|d| d.name() == "file_read").expect("file_read always registered")];

    let mut final_answer: Option<String> = None;

    for _ in 0..MAX_ITERATIONS {
        let completion = match openrouter.chat(log.list(), MODEL, TEMPERATURE, Some(&file_read_tool)).await {
            Ok(c) => c,
            Err(e) => return json!({ "success": false, "error": format!("Research assistant error: {e}"), "answer": "Unable to consult research assistant at this time." }),
        };

        if completion.tool_calls.is_empty() {
            let content = completion.content.unwrap_or_default();
            if log.append_assistant(Some(content.clone()), None).is_err() {
                break;
            }
            final_answer = Some(content);
            break;
        }

        let assistant_text = completion.reasoning.or(completion.content).unwrap_or_default();
        if log.append_assistant(Some(assistant_text), Some(completion.tool_calls.clone())).is_err() {
            break;
        }

        for call in &completion.tool_calls {
            let tool_args: Value = serde_json::from_str(&call.function.arguments).unwrap_or(json!({}));
            let result = if call.function.name == "file_read" {
                files::execute("file_read", &tool_args, workspace).unwrap_or(json!({ "success": false, "error": "file_read failed" }))
            } else {
                json!({ "error": format!("Unknown tool: {}", call.function.name) })
            };
            let _ = log.append_tool_result(&call.id, result.to_string());
        }
    }

    let Some(answer) = final_answer else {
        return json!({ "success": false, "error": "Assistant timeout", "answer": "", "conv_id": conv_id });
    };

    json!({
        "success": true,
        "answer": answer,
        "conv_id": conv_id,
        "total_messages": log.length(true) + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_question_is_reported() {
        let workspace_root = std::env::temp_dir().join(format!("scout-engine-ra-{}", uuid::Uuid::new_v4()));
        let ws = Workspace::ensure(workspace_root).unwrap();
        let provider = OpenRouterProvider::new("unused");
        let result = execute(&ws, &provider, &json!({})).await;
        assert_eq!(result["success"], false);
        let _ = ws.clean();
    }
}
