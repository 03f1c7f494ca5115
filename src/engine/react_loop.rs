// Scout Engine — React Loop (C8).
// The central controller: one invocation corresponds to one turn from one
// user. Implements the 7-step procedure of spec §4.8. Grounded on
// `AgentModeAgent.py`'s tool-call iteration loop and artifact-extraction
// tail, adapted from Python's free-form dict shuffling to typed Rust
// records at each boundary.

use crate::atoms::error::EngineResult;
use crate::atoms::types::{Artifact, ChatResponse, Mode, Source, Stage, ThinkingStep};
use crate::engine::compaction;
use crate::engine::config::EngineConfig;
use crate::engine::events::{EngineEvent, EventSink};
use crate::engine::message_log::MessageLog;
use crate::engine::tools::{self, control, ToolContext, ToolOutcome};
use chrono::Utc;
use log::warn;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Spec §4.8 step 6: a tool output's `success` flag is false exactly when
/// it begins with one of these prefixes.
const TOOL_CALL_ERROR_PREFIXES: [&str; 3] = ["Tool execution failed", "Failed to", "Tool '"];

/// Nudge injected when Agent/Research produces a plain-text reply without
/// calling a tool or `stop_answer` — that stage has no terminal-text
/// branch, so the loop asks the model to try again rather than ending the
/// turn silently.
const MUST_CALL_TOOL_NUDGE: &str = "Please continue your research by calling a tool, or call stop_answer if you are ready to produce the final report.";

pub struct TurnInput {
    pub session_id: String,
    pub user_message: String,
    pub mode: Mode,
    pub temperature: f64,
    /// Per-turn override of `EngineConfig::max_iterations` (spec §6 turn
    /// submission field), falling back to the configured default.
    pub max_iterations: Option<u32>,
}

/// Runs one full turn against `log`/`ctx`, driving `stage` through its
/// transitions, and returns the persisted-ready ChatResponse.
pub async fn run_turn(
    input: TurnInput,
    log: &mut MessageLog,
    ctx: &ToolContext,
    stage: &mut Option<Stage>,
    cancel: Arc<AtomicBool>,
    sink: &dyn EventSink,
) -> EngineResult<ChatResponse> {
    let config: &EngineConfig = &ctx.config;
    let start = Instant::now();
    let response_id = generate_response_id();
    let created_at = Utc::now().to_rfc3339();

    log.append_user(&input.user_message)?;

    let mut acc = TurnAccumulator::default();
    let max_iterations = input.max_iterations.unwrap_or(config.max_iterations);

    for _ in 0..max_iterations {
        if cancel.load(Ordering::SeqCst) {
            cancel.store(false, Ordering::SeqCst);
            *stage = (*stage).map(|_| Stage::Hil);
            ctx.teardown_sandbox().await;
            sink.emit(EngineEvent::Cancelled {
                message: "Turn cancelled by user.".into(),
                steps_completed: acc.step_counter,
                stage: (*stage).map(stage_name),
            })
            .await;
            return Ok(cancelled_response(&response_id, &input, &created_at, config));
        }

        let defs = tools::definitions(input.mode, *stage, ctx);
        let completion = ctx.openrouter.chat(log.list(), &config.default_model, input.temperature, Some(&defs)).await?;
        if let Some(usage) = &completion.usage {
            acc.last_prompt_tokens = Some(usage.prompt_tokens);
        }

        if completion.tool_calls.is_empty() {
            let text = completion.content.unwrap_or_default();
            if matches!((input.mode, *stage), (Mode::Agent, Some(Stage::Research))) {
                log.append_assistant(Some(text), None)?;
                log.append_user(MUST_CALL_TOOL_NUDGE)?;
                continue;
            }
            log.append_assistant(Some(text.clone()), None)?;
            ctx.teardown_sandbox().await;
            let response = acc.finish(&response_id, &input, &created_at, config, text, None, start);
            sink.emit(EngineEvent::Complete(Box::new(response.clone()))).await;
            return Ok(response);
        }

        let proposals = completion.tool_calls.clone();
        let control_call = proposals
            .iter()
            .find(|p| matches!(p.function.name.as_str(), "start_research" | "stop_answer" | "compact_context"))
            .cloned();

        if let Some(proposal) = control_call {
            log.append_assistant(completion.content.clone(), Some(vec![proposal.clone()]))?;
            log.append_tool_result(proposal.id.clone(), json!({ "success": true }).to_string())?;

            match proposal.function.name.as_str() {
                "start_research" => {
                    *stage = Some(Stage::Research);
                    sink.emit(EngineEvent::StageSwitch { stage: "research".into() }).await;
                    log.append_user(control::START_RESEARCH_GUIDANCE)?;
                    continue;
                }
                "compact_context" => {
                    let outcome = compaction::compact(log, &ctx.workspace, &ctx.openrouter, crate::engine::config::COMPACTION_KEEP_RECENT).await;
                    log_compaction_outcome(&outcome);
                    continue;
                }
                _ => {
                    // stop_answer: inject the stage-appropriate final-answer
                    // prompt and drop into the final-answer phase.
                    let prompt = match stage {
                        Some(Stage::Research) => {
                            let draft = ctx.workspace.read("draft.md").unwrap_or_default();
                            let notes = ctx.workspace.read("notes.md").unwrap_or_default();
                            control::research_final_answer_prompt(&draft, &notes)
                        }
                        _ => control::HIL_FINAL_ANSWER_PROMPT.to_string(),
                    };
                    log.append_user(prompt)?;
                    ctx.teardown_sandbox().await;
                    let response = finalize(log, ctx, &response_id, &input, &created_at, config, stage, acc, start).await?;
                    sink.emit(EngineEvent::Complete(Box::new(response.clone()))).await;
                    return Ok(response);
                }
            }
        }

        acc.used_tools = true;
        log.append_assistant(completion.content.clone(), Some(proposals.clone()))?;

        for call in &proposals {
            acc.step_counter += 1;
            let args: Value = match serde_json::from_str(&call.function.arguments) {
                Ok(v) => v,
                Err(e) => {
                    let output = format!("Tool execution failed: invalid arguments for '{}': {e}", call.function.name);
                    log.append_tool_result(call.id.clone(), output.clone())?;
                    let step = derive_thinking_step(acc.step_counter, &call.function.name, json!({}), output, completion.reasoning.clone());
                    sink.emit(EngineEvent::ThinkingStep(step.clone())).await;
                    acc.thinking_steps.push(step);
                    continue;
                }
            };

            let outcome = tools::dispatch(&call.function.name, &args, ctx).await;
            let output = acc.render_outcome(&outcome, &call.function.name, input.mode);
            let step = derive_thinking_step(acc.step_counter, &call.function.name, args, output.clone(), completion.reasoning.clone());
            log.append_tool_result(call.id.clone(), output)?;
            sink.emit(EngineEvent::ThinkingStep(step.clone())).await;
            acc.thinking_steps.push(step);
        }

        if acc.last_prompt_tokens.map(|t| t > crate::engine::config::AUTO_COMPACT_THRESHOLD).unwrap_or(false) {
            let outcome = compaction::compact(log, &ctx.workspace, &ctx.openrouter, crate::engine::config::COMPACTION_KEEP_RECENT).await;
            log_compaction_outcome(&outcome);
        }
    }

    // MAX_ITERATIONS exhausted without stop_answer.
    ctx.teardown_sandbox().await;
    let text = control::MAX_ITERATIONS_FALLBACK.to_string();
    log.append_assistant(Some(text.clone()), None)?;
    let response = acc.finish(&response_id, &input, &created_at, config, text, None, start);
    sink.emit(EngineEvent::Complete(Box::new(response.clone()))).await;
    Ok(response)
}

async fn finalize(
    log: &mut MessageLog,
    ctx: &ToolContext,
    response_id: &str,
    input: &TurnInput,
    created_at: &str,
    config: &EngineConfig,
    stage: &mut Option<Stage>,
    acc: TurnAccumulator,
    start: Instant,
) -> EngineResult<ChatResponse> {
    let completion = ctx.openrouter.chat(log.list(), &config.default_model, 0.3, None).await?;
    let raw_text = completion.content.unwrap_or_default();
    log.append_assistant(Some(raw_text.clone()), None)?;

    let (answer, artifact) = if matches!(stage, Some(Stage::Research)) {
        let (overview, artifact) = control::extract_artifact(&raw_text);
        if let Some(a) = &artifact {
            let _ = ctx.workspace.write_artifact(&a.html_content);
        }
        (overview, artifact)
    } else {
        (raw_text, None)
    };

    if matches!(stage, Some(Stage::Research)) {
        *stage = Some(Stage::Hil);
    }

    Ok(acc.finish(response_id, input, created_at, config, answer, artifact, start))
}

fn log_compaction_outcome(outcome: &compaction::CompactionOutcome) {
    match outcome {
        compaction::CompactionOutcome::Compacted { messages_before, messages_after } => {
            log::info!("compacted context: {messages_before} messages -> {messages_after}");
        }
        compaction::CompactionOutcome::Skipped { reason } => {
            log::debug!("skipped compaction: {reason}");
        }
        compaction::CompactionOutcome::Failed { error } => {
            warn!("compaction failed: {error}");
        }
    }
}

/// Response identifiers follow `resp_<YYYYMMDD_HHMMSS>_<6-hex>` (spec §6).
fn generate_response_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    format!("resp_{timestamp}_{}", &uuid::Uuid::new_v4().simple().to_string()[..6])
}

fn stage_name(stage: Stage) -> String {
    match stage {
        Stage::Hil => "hil".into(),
        Stage::Research => "research".into(),
    }
}

/// Mutable per-turn state threaded through the iteration loop: the
/// thinking-step log, the growing Source list, and the flags folded into
/// the final ChatResponse.
#[derive(Default)]
struct TurnAccumulator {
    thinking_steps: Vec<ThinkingStep>,
    sources: Vec<Source>,
    used_tools: bool,
    has_code: bool,
    has_web_results: bool,
    last_prompt_tokens: Option<u64>,
    step_counter: u32,
}

impl TurnAccumulator {
    /// Per-tool post-processing contract (spec §4.3): normalize a dispatch
    /// outcome into the text that goes into the tool-result message,
    /// growing the per-turn Source list for `web_search` and flagging
    /// `has_code`/`has_web_results` as a side effect.
    fn render_outcome(&mut self, outcome: &ToolOutcome, tool_name: &str, mode: Mode) -> String {
        match outcome {
            ToolOutcome::WebSearch(search) => {
                self.has_web_results = !search.items.is_empty();
                // Sources are replaced on every search call rather than
                // accumulated across calls, matching the original
                // (`BaseAgent.py:235`) and keeping URLs pairwise distinct
                // within a response (spec §3 invariant (c)) without needing
                // cross-call dedup bookkeeping.
                let mut seen = std::collections::HashSet::new();
                self.sources = search
                    .items
                    .iter()
                    .filter(|item| seen.insert(item.url.clone()))
                    .enumerate()
                    .map(|(offset, item)| Source {
                        index: offset as u32 + 1,
                        title: item.title.clone(),
                        url: item.url.clone(),
                        snippet: item.snippet.clone(),
                        age: item.age.clone(),
                        cache_path: item.cache_path.clone(),
                    })
                    .collect();
                let with_labels = matches!(mode, Mode::Chat);
                tools::web_search::render_block(search, 1, with_labels)
            }
            ToolOutcome::Sandbox(result) => {
                self.has_code = true;
                if result.success {
                    serde_json::to_string_pretty(result).unwrap_or_else(|_| result.output.clone())
                } else {
                    format!("Tool execution failed: {}", result.error.clone().unwrap_or_default())
                }
            }
            ToolOutcome::Json(value) => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
            ToolOutcome::Mcp(Ok(text)) => text.clone(),
            ToolOutcome::Mcp(Err(e)) => format!("Tool execution failed: {e}"),
            ToolOutcome::StopAnswer | ToolOutcome::StartResearch => String::new(),
            ToolOutcome::NotFound => format!("Tool '{tool_name}' not found"),
        }
    }

    fn finish(self, response_id: &str, input: &TurnInput, created_at: &str, config: &EngineConfig, answer: String, artifact: Option<Artifact>, start: Instant) -> ChatResponse {
        ChatResponse {
            response_id: response_id.to_string(),
            session_id: input.session_id.clone(),
            user_id: "default".into(),
            user_message: input.user_message.clone(),
            assistant_message: answer,
            mode: input.mode,
            thinking_steps: if self.thinking_steps.is_empty() { None } else { Some(self.thinking_steps) },
            sources: if self.sources.is_empty() { None } else { Some(self.sources) },
            used_tools: self.used_tools,
            has_code: self.has_code,
            has_web_results: self.has_web_results,
            total_time_ms: start.elapsed().as_millis() as u64,
            model: config.default_model.clone(),
            temperature: input.temperature,
            prompt_tokens: self.last_prompt_tokens,
            artifact,
            created_at: created_at.to_string(),
        }
    }
}

fn cancelled_response(response_id: &str, input: &TurnInput, created_at: &str, config: &EngineConfig) -> ChatResponse {
    ChatResponse {
        response_id: response_id.to_string(),
        session_id: input.session_id.clone(),
        user_id: "default".into(),
        user_message: input.user_message.clone(),
        assistant_message: String::new(),
        mode: input.mode,
        thinking_steps: None,
        sources: None,
        used_tools: false,
        has_code: false,
        has_web_results: false,
        total_time_ms: 0,
        model: config.default_model.clone(),
        temperature: input.temperature,
        prompt_tokens: None,
        artifact: None,
        created_at: created_at.to_string(),
    }
}

fn derive_thinking_step(step: u32, tool: &str, input: Value, output: String, reasoning: Option<String>) -> ThinkingStep {
    let success = !TOOL_CALL_ERROR_PREFIXES.iter().any(|p| output.starts_with(p));
    let has_code = tool == "execute_python";
    let has_image = has_code && {
        let lower = output.to_lowercase();
        lower.contains("image") || lower.contains("plot")
    };
    let urls = input
        .get("url")
        .and_then(|v| v.as_str())
        .map(|u| vec![u.to_string()])
        .or_else(|| input.get("urls").and_then(|v| v.as_array()).map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect()));
    ThinkingStep { step, tool: tool.to_string(), input, output, success, reasoning, urls, has_code, has_image }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_thinking_step_marks_failure_by_prefix() {
        let step = derive_thinking_step(1, "file_read", json!({}), "Tool execution failed: nope".into(), None);
        assert!(!step.success);
    }

    #[test]
    fn derive_thinking_step_marks_not_found_as_failure() {
        let step = derive_thinking_step(1, "bogus_tool", json!({}), "Tool 'bogus_tool' not found".into(), None);
        assert!(!step.success);
    }

    #[test]
    fn derive_thinking_step_marks_success_otherwise() {
        let step = derive_thinking_step(1, "file_read", json!({}), "ok".into(), None);
        assert!(step.success);
    }

    #[test]
    fn derive_thinking_step_extracts_urls_field() {
        let step = derive_thinking_step(1, "web_search", json!({"url": "https://a"}), "ok".into(), None);
        assert_eq!(step.urls, Some(vec!["https://a".to_string()]));
    }

    #[test]
    fn render_outcome_chat_mode_labels_sources() {
        let outcome = ToolOutcome::WebSearch(tools::web_search::WebSearchOutcome {
            query: "q".into(),
            search_type: "auto".into(),
            items: vec![tools::web_search::WebSearchItem { url: "https://a".into(), title: "A".into(), snippet: "s".into(), age: None, cache_path: None }],
            error: None,
        });
        let mut acc = TurnAccumulator::default();
        let text = acc.render_outcome(&outcome, "web_search", Mode::Chat);
        assert_eq!(acc.sources.len(), 1);
        assert_eq!(acc.sources[0].index, 1);
        assert!(text.contains("[1]"));
        assert!(acc.has_web_results);
    }

    #[test]
    fn render_outcome_not_found_names_the_tool() {
        let mut acc = TurnAccumulator::default();
        let text = acc.render_outcome(&ToolOutcome::NotFound, "mystery", Mode::Chat);
        assert_eq!(text, "Tool 'mystery' not found");
    }
}
