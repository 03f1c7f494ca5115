// Scout Engine — MCP server registry: connects every configured server,
// dispatches `mcp_<server>_<tool>` calls, tears down in LIFO order.
// Grounded on the teacher's `engine/mcp/registry.rs`.

use super::client::McpClient;
use super::types::*;
use crate::atoms::types::{FunctionDefinition, ToolDefinition};
use log::{info, warn};
use std::collections::HashMap;

#[derive(Default)]
pub struct McpRegistry {
    clients: HashMap<String, McpClient>,
    /// Connection order, oldest first — teardown walks this in reverse.
    order: Vec<String>,
}

impl McpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect every configured server. A failing server is logged and
    /// skipped; it never prevents the others from starting (spec §4.5).
    pub async fn connect_all(&mut self, configs: Vec<McpServerConfig>) {
        for config in configs {
            let id = config.id.clone();
            match McpClient::connect(config).await {
                Ok(client) => {
                    self.clients.insert(id.clone(), client);
                    self.order.push(id);
                }
                Err(e) => warn!("[mcp] server '{id}' failed to connect, skipping: {e}"),
            }
        }
    }

    /// Close every connected server, last-opened first (stack-unwinding
    /// discipline, spec §4.5).
    pub async fn disconnect_all(&mut self) {
        while let Some(id) = self.order.pop() {
            if let Some(client) = self.clients.remove(&id) {
                client.shutdown().await;
            }
        }
    }

    pub fn all_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.clients.iter().flat_map(|(server_id, client)| client.tools.iter().map(move |t| mcp_tool_to_definition(server_id, t))).collect()
    }

    /// Dispatch a `mcp_<server>_<tool>` call. Returns `None` if `tool_name`
    /// does not carry the `mcp_` prefix or names no known server/tool pair,
    /// so callers can fall through to other registries.
    pub async fn execute_tool(&self, tool_name: &str, arguments: &serde_json::Value) -> Option<Result<String, String>> {
        let stripped = tool_name.strip_prefix("mcp_")?;
        let (server_id, original_name) = find_server_and_tool(stripped, &self.clients)?;
        let client = self.clients.get(server_id)?;
        Some(client.call_tool(original_name, arguments.clone()).await)
    }

    pub fn connected_ids(&self) -> &[String] {
        &self.order
    }
}

fn mcp_tool_to_definition(server_id: &str, tool: &McpToolDef) -> ToolDefinition {
    let name = format!("mcp_{server_id}_{}", tool.name);
    let description = format!("{} [MCP: {server_id}]", tool.description.as_deref().unwrap_or("(no description)"));
    ToolDefinition { tool_type: "function".into(), function: FunctionDefinition { name, description, parameters: tool.input_schema.clone() } }
}

/// Server IDs may themselves contain underscores, so the split between
/// `{server_id}` and `{tool_name}` is ambiguous without trying the longest
/// known server ID first.
fn find_server_and_tool<'a>(stripped: &'a str, clients: &'a HashMap<String, McpClient>) -> Option<(&'a str, &'a str)> {
    let mut ids: Vec<&String> = clients.keys().collect();
    ids.sort_by(|a, b| b.len().cmp(&a.len()));
    for id in ids {
        if let Some(rest) = stripped.strip_prefix(id.as_str()) {
            if let Some(tool_name) = rest.strip_prefix('_') {
                return Some((id.as_str(), tool_name));
            }
        }
    }
    let _ = info!("[mcp] no server matched tool prefix '{stripped}'");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mcp_tool_to_definition_prefixes_name_and_tags_server() {
        let tool = McpToolDef { name: "read_file".into(), description: Some("Read a file".into()), input_schema: serde_json::json!({"type": "object"}) };
        let def = mcp_tool_to_definition("github", &tool);
        assert_eq!(def.function.name, "mcp_github_read_file");
        assert!(def.function.description.contains("[MCP: github]"));
    }

    #[test]
    fn find_server_and_tool_prefers_longest_server_id() {
        let stripped = "github_read_file";
        assert_eq!(stripped.strip_prefix("github").and_then(|r| r.strip_prefix('_')), Some("read_file"));
    }

    #[test]
    fn registry_new_is_empty() {
        let reg = McpRegistry::new();
        assert!(reg.all_tool_definitions().is_empty());
        assert!(reg.connected_ids().is_empty());
    }
}
