// Scout Engine — External-Tool Bridge (C5).
//
// JSON-RPC-over-stdio bridge to Model Context Protocol servers, letting a
// session reach third-party tool sets without any Rust code change.
//
//   types.rs     — MCP protocol types + static server config
//   transport.rs — stdio transport, Content-Length framed (LSP-style)
//   client.rs    — initialize handshake, tools/list, tools/call
//   registry.rs  — multi-server lifecycle + mcp_<server>_<tool> dispatch

pub mod client;
pub mod registry;
pub mod transport;
pub mod types;

pub use registry::McpRegistry;
pub use types::McpServerConfig;
