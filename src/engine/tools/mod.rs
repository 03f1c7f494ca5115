// Scout Engine — Tool Registry and dispatch (C3 / C4).
// Each tool group is a self-contained module exposing `definition(s)()` and
// `execute(...)`; this module aggregates them per the Mode/Stage
// available-tool table (spec §4.7) and dispatches by name, falling back to
// the MCP bridge for `mcp_`-prefixed names. Grounded on the teacher's
// `engine/tools/mod.rs` per-module registry pattern.

pub mod control;
pub mod execute_python;
pub mod files;
pub mod research_assistant;
pub mod web_search;

use crate::atoms::types::{Mode, SandboxResult, Stage, ToolDefinition};
use crate::engine::compaction;
use crate::engine::config::EngineConfig;
use crate::engine::mcp::McpRegistry;
use crate::engine::providers::e2b::E2bSandbox;
use crate::engine::providers::exa::ExaProvider;
use crate::engine::providers::openrouter::OpenRouterProvider;
use crate::engine::workspace::Workspace;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Everything a tool call needs: workspace, vendor clients, the MCP bridge,
/// and the lazily-created sandbox handle shared across calls within a turn.
///
/// `openrouter`/`exa` are cheap to clone (a `reqwest::Client` shares its
/// connection pool through an internal `Arc`), so each session's turn gets
/// its own `ToolContext` built from clones of the process-wide clients
/// (spec §5: vendor clients are a cross-session resource). `mcp` is
/// genuinely shared — the bridge owns child processes — so it is held
/// behind an `Arc` rather than cloned.
pub struct ToolContext {
    pub workspace: Workspace,
    pub openrouter: OpenRouterProvider,
    pub exa: ExaProvider,
    pub mcp: Arc<McpRegistry>,
    pub config: EngineConfig,
    sandbox: Mutex<Option<E2bSandbox>>,
}

impl ToolContext {
    pub fn new(workspace: Workspace, openrouter: OpenRouterProvider, exa: ExaProvider, mcp: Arc<McpRegistry>, config: EngineConfig) -> Self {
        ToolContext { workspace, openrouter, exa, mcp, config, sandbox: Mutex::new(None) }
    }

    /// Reuse the sandbox created earlier this turn, or create one now
    /// (spec §4.4.2: "lazily creates, then reuses across calls").
    async fn sandbox(&self) -> Result<(), String> {
        let mut guard = self.sandbox.lock().await;
        if guard.is_none() {
            let key = self.config.e2b_api_key.as_deref().ok_or("sandbox not configured")?;
            *guard = Some(E2bSandbox::create(key).await.map_err(|e| e.to_string())?);
        }
        Ok(())
    }

    /// Tear down the sandbox at end of turn (spec §4.4.2).
    pub async fn teardown_sandbox(&self) {
        let mut guard = self.sandbox.lock().await;
        if let Some(sandbox) = guard.take() {
            let _ = sandbox.kill().await;
        }
    }
}

/// Terminal outcome of dispatching one tool call, carrying enough shape
/// for the React Loop's per-tool post-processing contract (spec §4.3).
pub enum ToolOutcome {
    WebSearch(web_search::WebSearchOutcome),
    Sandbox(SandboxResult),
    Json(Value),
    Mcp(Result<String, String>),
    StopAnswer,
    StartResearch,
    NotFound,
}

/// The tool set visible to the model for a given Mode/Stage (spec §4.7
/// available-tool invariants table).
pub fn definitions(mode: Mode, stage: Option<Stage>, ctx: &ToolContext) -> Vec<ToolDefinition> {
    let sandbox_enabled = ctx.config.sandbox_enabled();
    let mut defs = match (mode, stage) {
        (Mode::Chat, _) => {
            let mut d = vec![web_search::definition()];
            if sandbox_enabled {
                d.push(execute_python::definition());
            }
            d.push(files::definitions().into_iter().find(|t| t.name() == "file_read").expect("file_read registered"));
            d
        }
        (Mode::Agent, Some(Stage::Hil)) | (Mode::Agent, None) => {
            vec![web_search::definition(), control::start_research_definition()]
        }
        (Mode::Agent, Some(Stage::Research)) => {
            let mut d = vec![web_search::definition()];
            if sandbox_enabled {
                d.push(execute_python::definition());
            }
            d.extend(files::definitions().into_iter().filter(|t| t.name() != "file_edit"));
            d.push(research_assistant::definition());
            d.push(compaction::definition());
            d.push(control::stop_answer_definition());
            d
        }
    };
    if matches!((mode, stage), (Mode::Chat, _) | (Mode::Agent, Some(Stage::Research))) {
        defs.extend(ctx.mcp.all_tool_definitions());
    }
    defs
}

/// Dispatch a tool call by name. Returns `ToolOutcome::NotFound` if no
/// module (including the MCP bridge) claims the name.
///
/// `compact_context` is not dispatched here: it needs `&mut MessageLog`,
/// which this registry does not hold, so the React Loop intercepts it
/// alongside the other control proposals before falling through to this
/// function.
pub async fn dispatch(name: &str, args: &Value, ctx: &ToolContext) -> ToolOutcome {
    if name == "stop_answer" {
        return ToolOutcome::StopAnswer;
    }
    if name == "start_research" {
        return ToolOutcome::StartResearch;
    }
    if name == "web_search" {
        return ToolOutcome::WebSearch(web_search::execute(&ctx.workspace, &ctx.exa, args).await);
    }
    if name == "execute_python" {
        return match ctx.sandbox().await {
            Ok(()) => {
                let guard = ctx.sandbox.lock().await;
                let sandbox = guard.as_ref().expect("sandbox populated above");
                let code = args["code"].as_str().unwrap_or_default();
                ToolOutcome::Sandbox(execute_python::execute(&ctx.workspace, sandbox, code).await)
            }
            Err(e) => ToolOutcome::Sandbox(SandboxResult { success: false, output: String::new(), files_generated: Vec::new(), execution_time: 0.0, error: Some(e) }),
        };
    }
    if let Some(value) = files::execute(name, args, &ctx.workspace) {
        return ToolOutcome::Json(value);
    }
    if name == "research_assistant" {
        return ToolOutcome::Json(research_assistant::execute(&ctx.workspace, &ctx.openrouter, args).await);
    }
    if let Some(result) = ctx.mcp.execute_tool(name, args).await {
        return ToolOutcome::Mcp(result);
    }
    ToolOutcome::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_reports_not_found_for_unknown_tool() {
        let ws_root = std::env::temp_dir().join(format!("scout-engine-toolmod-{}", uuid::Uuid::new_v4()));
        let ctx = ToolContext::new(
            Workspace::ensure(ws_root).unwrap(),
            OpenRouterProvider::new("unused"),
            ExaProvider::new("unused"),
            Arc::new(McpRegistry::new()),
            EngineConfig { data_base_dir: std::env::temp_dir(), openrouter_api_key: "x".into(), exa_api_key: "x".into(), e2b_api_key: None, environment: "development".into(), log_level: "info".into(), max_iterations: 10, default_model: "m".into(), http_port: 0 },
        );
        let outcome = dispatch("totally_unknown_tool", &serde_json::json!({}), &ctx).await;
        assert!(matches!(outcome, ToolOutcome::NotFound));
        let _ = ctx.workspace.clean();
    }

    #[test]
    fn chat_mode_tool_set_excludes_control_tools() {
        let ws_root = std::env::temp_dir().join(format!("scout-engine-toolmod-defs-{}", uuid::Uuid::new_v4()));
        let ctx = ToolContext::new(
            Workspace::ensure(ws_root).unwrap(),
            OpenRouterProvider::new("unused"),
            ExaProvider::new("unused"),
            Arc::new(McpRegistry::new()),
            EngineConfig { data_base_dir: std::env::temp_dir(), openrouter_api_key: "x".into(), exa_api_key: "x".into(), e2b_api_key: None, environment: "development".into(), log_level: "info".into(), max_iterations: 10, default_model: "m".into(), http_port: 0 },
        );
        let defs = definitions(Mode::Chat, None, &ctx);
        assert!(defs.iter().any(|d| d.name() == "web_search"));
        assert!(!defs.iter().any(|d| d.name() == "stop_answer"));
        assert!(!defs.iter().any(|d| d.name() == "execute_python"));
        let _ = ctx.workspace.clean();
    }
}
