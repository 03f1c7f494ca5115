// Scout Engine — process entry point. Wires the process-wide shared
// resources (config, vendor clients, MCP registry) into one
// `SessionRegistry`, then serves the HTTP/SSE API. Grounded on `main.py`'s
// `lifespan` startup/shutdown sequence (connect MCP servers on boot,
// disconnect on shutdown) and the teacher's `main.rs` binary-entry shape.

use scout_engine::engine::mcp::{McpRegistry, McpServerConfig};
use scout_engine::engine::providers::exa::ExaProvider;
use scout_engine::engine::providers::OpenRouterProvider;
use scout_engine::engine::{EngineConfig, EngineShared, SessionRegistry};
use scout_engine::http;
use std::sync::Arc;

/// Hardcoded MCP server mapping (spec §4.5: "a static mapping from logical
/// server name to {command, args, env?}"), ported from `mcp_client.py`'s
/// `MCP_SERVERS` dict. The chrome-devtools server expects its binary and
/// Chromium to be preinstalled on the host image, same as the original.
fn default_mcp_servers() -> Vec<McpServerConfig> {
    vec![McpServerConfig {
        id: "chrome-devtools".into(),
        command: "chrome-devtools-mcp".into(),
        args: vec![
            "--headless".into(),
            "--executablePath".into(),
            "/usr/bin/chromium".into(),
            "--isolated".into(),
            "--chromeArg=--no-sandbox".into(),
            "--chromeArg=--disable-setuid-sandbox".into(),
            "--chromeArg=--disable-dev-shm-usage".into(),
        ],
        env: Default::default(),
    }]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level)).init();

    log::info!("starting scout-engine in {} mode", config.environment);

    let mut mcp = McpRegistry::new();
    mcp.connect_all(default_mcp_servers()).await;
    let mcp = Arc::new(mcp);

    let shared = Arc::new(EngineShared {
        openrouter: OpenRouterProvider::new(config.openrouter_api_key.clone()),
        exa: ExaProvider::new(config.exa_api_key.clone()),
        mcp,
        config: config.clone(),
    });

    let registry = Arc::new(SessionRegistry::new(shared));
    let app = http::router(http::AppState { registry });

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
