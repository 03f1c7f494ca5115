// Scout Engine — MCP client: one connection's initialize/tools-list/tools-call
// lifecycle. Grounded on the teacher's `engine/mcp/client.rs`.

use super::transport::StdioTransport;
use super::types::*;
use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

const PROTOCOL_VERSION: &str = "2024-11-05";
const DEFAULT_TIMEOUT: u64 = 30;
const TOOL_CALL_TIMEOUT: u64 = 120;

pub struct McpClient {
    pub config: McpServerConfig,
    transport: StdioTransport,
    next_id: AtomicU64,
    pub server_info: Option<McpServerInfo>,
    pub tools: Vec<McpToolDef>,
}

impl McpClient {
    pub async fn connect(config: McpServerConfig) -> Result<Self, String> {
        info!("[mcp] connecting to server '{}'", config.id);
        let transport = StdioTransport::spawn(&config.command, &config.args, &config.env).await?;

        let mut client = McpClient { config, transport, next_id: AtomicU64::new(1), server_info: None, tools: Vec::new() };
        client.initialize().await?;
        client.refresh_tools().await?;
        Ok(client)
    }

    async fn initialize(&mut self) -> Result<(), String> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: McpClientCapabilities::default(),
            client_info: McpClientInfo { name: "scout-engine".into(), version: env!("CARGO_PKG_VERSION").into() },
        };
        let req = JsonRpcRequest::new(self.next_id(), "initialize", Some(serde_json::to_value(&params).map_err(|e| e.to_string())?));
        let resp = self.transport.send_request(req, DEFAULT_TIMEOUT).await?;

        if let Some(err) = resp.error {
            return Err(format!("MCP initialize failed: {} (code={})", err.message, err.code));
        }
        if let Some(result) = resp.result {
            let init: InitializeResult = serde_json::from_value(result).map_err(|e| format!("parse init result: {e}"))?;
            info!("[mcp] server '{}' initialized (protocol={})", self.config.id, init.protocol_version);
            self.server_info = init.server_info;
        }

        self.transport.send_notification("notifications/initialized", None).await?;
        Ok(())
    }

    pub async fn refresh_tools(&mut self) -> Result<(), String> {
        let req = JsonRpcRequest::new(self.next_id(), "tools/list", None);
        let resp = self.transport.send_request(req, DEFAULT_TIMEOUT).await?;

        if let Some(err) = resp.error {
            if err.code == -32601 {
                self.tools = Vec::new();
                return Ok(());
            }
            return Err(format!("tools/list failed: {} (code={})", err.message, err.code));
        }

        self.tools = match resp.result {
            Some(result) => serde_json::from_value::<ToolsListResult>(result).map_err(|e| format!("parse tools/list: {e}"))?.tools,
            None => Vec::new(),
        };
        info!("[mcp] server '{}' exposes {} tools", self.config.id, self.tools.len());
        Ok(())
    }

    pub async fn call_tool(&self, tool_name: &str, arguments: serde_json::Value) -> Result<String, String> {
        let params = ToolCallParams { name: tool_name.into(), arguments };
        let req = JsonRpcRequest::new(self.next_id(), "tools/call", Some(serde_json::to_value(&params).map_err(|e| e.to_string())?));
        let resp = self.transport.send_request(req, TOOL_CALL_TIMEOUT).await?;

        if let Some(err) = resp.error {
            return Err(format!("tools/call '{tool_name}' failed: {} (code={})", err.message, err.code));
        }
        let result_val = resp.result.ok_or_else(|| format!("tools/call '{tool_name}': empty result"))?;
        let tool_result: ToolCallResult = serde_json::from_value(result_val).map_err(|e| format!("parse tools/call result: {e}"))?;

        let text = extract_text_content(&tool_result.content);
        if tool_result.is_error {
            Err(text)
        } else {
            Ok(text)
        }
    }

    pub async fn shutdown(&self) {
        info!("[mcp] shutting down server '{}'", self.config.id);
        self.transport.shutdown().await;
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

fn extract_text_content(content: &[McpContent]) -> String {
    content
        .iter()
        .filter_map(|c| match c {
            McpContent::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_text_content_concatenates_text_blocks_only() {
        let content = vec![
            McpContent::Text { text: "line 1".into() },
            McpContent::Image { data: "base64...".into(), mime_type: "image/png".into() },
            McpContent::Text { text: "line 2".into() },
        ];
        assert_eq!(extract_text_content(&content), "line 1\nline 2");
    }

    #[test]
    fn extract_text_content_empty_is_empty_string() {
        assert_eq!(extract_text_content(&[]), "");
    }
}
