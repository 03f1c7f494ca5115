// Scout Engine — Compaction Sub-Agent (C6).
// Grounded on `chat/tools/compact_context.py`: a nested ReAct loop with
// only `file_read` available, summarizing an old message-log prefix into a
// fixed five-section digest, then folding it back into the log behind a
// model-generated confirmation turn rather than an injected fake one.

use crate::atoms::types::{FunctionDefinition, Message, Role, ToolDefinition};
use crate::engine::message_log::MessageLog;
use crate::engine::providers::openrouter::OpenRouterProvider;
use crate::engine::tools::files;
use crate::engine::workspace::Workspace;
use serde_json::{json, Value};

/// Exposed to the model as an explicit tool in Agent/Research stage (spec
/// §4.6's explicit-invocation trigger, alongside the automatic
/// prompt-token-threshold trigger the React Loop checks itself).
pub fn definition() -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".into(),
        function: FunctionDefinition {
            name: "compact_context".into(),
            description: "Compress older conversation history into a summary to free up context space. Call this if the conversation has grown very long and you're running low on room to work. Recent messages are preserved verbatim.".into(),
            parameters: json!({ "type": "object", "properties": {}, "required": [] }),
        },
    }
}

const MAX_ITERATIONS: u32 = 10;
const MODEL: &str = "google/gemini-2.5-pro";
const TEMPERATURE: f64 = 0.2;
pub const DEFAULT_KEEP_RECENT: usize = 10;

const COMPACTION_AGENT_SYSTEM_PROMPT: &str = r#"You are a conversation context compressor agent. Your job: compress old conversation history into a structured summary that allows the main agent to resume seamlessly.

<your_task>
You will be given old conversation messages to compress. Your goal is to extract and organize critical information into 5 structured sections using XML tags.

You can use tools to help you understand the context better (e.g., read workspace files to see what's been created).
</your_task>

<available_tools>
You have ONE tool available: file_read

**file_read(filename: str)**
- Reads a file from the workspace
- Parameter: filename - relative path to the file (e.g., "progress.md", "cache/article_name.md")
- Returns: File content as text

**When to use file_read**:
- You see file paths mentioned in the conversation
- You need to understand what's in progress.md, notes.md, or draft.md
- You want to check cached articles to better summarize findings

**ReAct workflow**:
1. Review conversation messages
2. If you need more context, call file_read tool(s)
3. After tool results, go back to step 1
4. When you have enough information, output your final answer

**Final answer**:
When you're ready to provide the summary, simply output your answer directly (without calling any tools):
- First: <scratchpad> with your analysis
- Then: 5 XML sections (overall_goal, file_system_state, key_knowledge, recent_actions, current_plan)

The absence of tool calls signals you're providing the final result.
</available_tools>

<thinking_process>
Before generating the final summary, use a private scratchpad to organize your thoughts:

1. **Scratchpad (private thinking space)**:
   - Wrap your analysis in <scratchpad>...</scratchpad>
   - Review the entire conversation history
   - Identify: user's goal, agent's strategy, tool outputs, file changes, unresolved issues
   - This is for YOUR thinking - be thorough and honest
   - Note: "private" means you can think freely without worrying about format

2. **Final Summary**:
   - After scratchpad, output the structured 5-section summary
   - The summary is what the main agent will see
</thinking_process>

<output_format>
Your complete output should be:

<scratchpad>
[Your private analysis here - review history, identify patterns, note key information]
</scratchpad>

Then output exactly 5 XML sections:

<overall_goal>
Extract from user's initial request. One clear sentence. What is the ultimate objective?
Example: "Compare top 5 production LLMs on cost, performance, and streaming support for $500/month budget"
</overall_goal>

<file_system_state>
ALL file operations with CREATED/MODIFIED/READ prefixes. Include what each file contains and navigation hints.
Format:
- CREATED: cache/article.md - Brief description of content
- MODIFIED: notes.md - What changed
- READ: progress.md - Key discovery from reading
- HINT: Where to find specific information
- STATUS: Overall workspace state
Preserve exact file paths. Map information locations.
</file_system_state>

<key_knowledge>
Hard facts, research insights, reasoning takeaways:
- Specific data points with numbers and units
- URLs, API endpoints, technical specs
- Discoveries and patterns
- Constraints and requirements
- Strategic decisions made and why
Focus on facts that affect next steps.
</key_knowledge>

<recent_actions>
Last 5-10 tool executions with FULL DETAILS:
- tool_name(exact_parameters) -> specific_result
- Include: file paths, data extracted, errors
- Be comprehensive: agent resumes from here
</recent_actions>

<current_plan>
Next immediate steps and continuation strategy:
- Numbered action items
- Pending decisions or questions
- Overall strategy for continuation
</current_plan>
</output_format>

<critical_rules>
1. Use file_read if you need context, but not all files may be needed
2. Focus on FACTS and RESULTS in the conversation, not process descriptions
3. Be comprehensive in recent_actions - include full tool parameters and results
4. Preserve ALL file paths exactly as mentioned
5. Include specific numbers, URLs, data points
6. When ready to summarize: output final answer WITHOUT calling any tools
</critical_rules>

You are autonomous - decide what information you need and how to extract it."#;

const COMPACTION_KICKOFF_PROMPT: &str = "Summarize the above conversation using the 5-section XML format. Use file_read if needed.";
const CONFIRMATION_FALLBACK: &str = "I understand the previous work and will continue from here.";
const CONTINUE_PROMPT: &str = "Good. Please continue your work.";

pub enum CompactionOutcome {
    /// Fewer than `keep_recent` user messages exist, or the log is too
    /// short to bother compacting — no-op.
    Skipped { reason: String },
    Compacted { messages_before: usize, messages_after: usize },
    Failed { error: String },
}

/// Compact `log` in place: summarize everything between the system
/// message(s) and the Kth most recent user message, replacing it with a
/// summary turn and a model-generated confirmation turn (spec §4.6).
pub async fn compact(log: &mut MessageLog, workspace: &Workspace, openrouter: &OpenRouterProvider, keep_recent: usize) -> CompactionOutcome {
    let all = log.list().to_vec();
    if all.len() <= 3 {
        return CompactionOutcome::Skipped { reason: "too few messages to compact".into() };
    }

    let system_end = all.iter().take_while(|m| m.role == Role::System).count();

    let mut user_count = 0usize;
    let mut split_index = all.len();
    for (i, message) in all.iter().enumerate().rev() {
        if message.role == Role::User {
            user_count += 1;
            if user_count == keep_recent {
                split_index = i;
                break;
            }
        }
    }
    if user_count < keep_recent {
        return CompactionOutcome::Skipped { reason: format!("only {user_count} user messages found, keeping all") };
    }

    let system_messages = &all[..system_end];
    let old_messages = &all[system_end..split_index];
    let recent_messages = &all[split_index..];
    if old_messages.is_empty() {
        return CompactionOutcome::Skipped { reason: "no old messages to compact".into() };
    }

    let mut compact_messages = vec![Message::system(COMPACTION_AGENT_SYSTEM_PROMPT)];
    compact_messages.extend(old_messages.iter().cloned());
    compact_messages.push(Message::user(COMPACTION_KICKOFF_PROMPT));

    let file_read_tool = [files::definitions().into_iter().find(|d| d.name() == "file_read").expect("file_read always registered")];

    let mut summary_text: Option<String> = None;
    for _ in 0..MAX_ITERATIONS {
        let completion = match openrouter.chat(&compact_messages, MODEL, TEMPERATURE, Some(&file_read_tool)).await {
            Ok(c) => c,
            Err(e) => return CompactionOutcome::Failed { error: format!("compaction agent error: {e}") },
        };

        if completion.tool_calls.is_empty() {
            let content = completion.content.unwrap_or_default();
            summary_text = Some(content.clone());
            compact_messages.push(Message::assistant(Some(content), None));
            break;
        }

        compact_messages.push(Message::assistant(completion.content.clone(), Some(completion.tool_calls.clone())));
        for call in &completion.tool_calls {
            let tool_args: Value = serde_json::from_str(&call.function.arguments).unwrap_or(json!({}));
            let result = if call.function.name == "file_read" {
                files::execute("file_read", &tool_args, workspace).unwrap_or(json!({ "success": false, "error": "file_read failed" }))
            } else {
                json!({ "error": format!("Unknown tool: {}", call.function.name) })
            };
            compact_messages.push(Message::tool_result(call.id.clone(), result.to_string()));
        }
    }

    let Some(summary_text) = summary_text else {
        return CompactionOutcome::Failed { error: "compaction agent timeout".into() };
    };

    let summary_message = Message::user(format!("\u{1F4CB} **[Context Summary - Previous Conversation]**\n\n{summary_text}\n\n---\nPlease review the above summary and confirm your understanding of previous work."));

    let mut confirmation_messages = system_messages.to_vec();
    confirmation_messages.push(summary_message.clone());
    let confirmation_text = match openrouter.chat(&confirmation_messages, MODEL, TEMPERATURE, None).await {
        Ok(c) => c.content.filter(|t| !t.is_empty()).unwrap_or_else(|| CONFIRMATION_FALLBACK.to_string()),
        Err(_) => CONFIRMATION_FALLBACK.to_string(),
    };
    let confirmation_message = Message::assistant(Some(confirmation_text), None);

    let mut new_messages = system_messages.to_vec();
    new_messages.push(summary_message);
    new_messages.push(confirmation_message);
    new_messages.extend(recent_messages.iter().cloned());
    new_messages.push(Message::user(CONTINUE_PROMPT));

    let messages_before = all.len();
    let messages_after = new_messages.len();
    if let Err(e) = log.replace_all(new_messages) {
        return CompactionOutcome::Failed { error: e.to_string() };
    }
    CompactionOutcome::Compacted { messages_before, messages_after }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_ws(tag: &str) -> Workspace {
        let root = std::env::temp_dir().join(format!("scout-engine-compaction-{tag}-{}", uuid::Uuid::new_v4()));
        Workspace::ensure(root).unwrap()
    }

    fn tmp_log(tag: &str) -> MessageLog {
        let dir = std::env::temp_dir().join(format!("scout-engine-compaction-log-{tag}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        MessageLog::load(&dir).unwrap()
    }

    #[tokio::test]
    async fn skips_when_too_few_messages() {
        let ws = tmp_ws("skip-short");
        let mut log = tmp_log("skip-short");
        log.append_system("sys").unwrap();
        log.append_user("hi").unwrap();
        let provider = OpenRouterProvider::new("unused");
        let outcome = compact(&mut log, &ws, &provider, DEFAULT_KEEP_RECENT).await;
        assert!(matches!(outcome, CompactionOutcome::Skipped { .. }));
        let _ = ws.clean();
    }

    #[tokio::test]
    async fn skips_when_fewer_than_keep_recent_user_messages() {
        let ws = tmp_ws("skip-few-users");
        let mut log = tmp_log("skip-few-users");
        log.append_system("sys").unwrap();
        for i in 0..3 {
            log.append_user(format!("turn {i}")).unwrap();
            log.append_assistant(Some("ok".into()), None).unwrap();
        }
        let provider = OpenRouterProvider::new("unused");
        let outcome = compact(&mut log, &ws, &provider, DEFAULT_KEEP_RECENT).await;
        assert!(matches!(outcome, CompactionOutcome::Skipped { .. }));
        let _ = ws.clean();
    }
}
