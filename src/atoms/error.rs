// Scout Engine — Error Types
// Single canonical error enum for the engine, built with `thiserror`.
//
// Variants are coarse-grained by domain (I/O, Provider, Tool, Security…).
// `#[from]` wires std/external error conversions automatically.
// No variant carries secret material (API keys) in its message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Model/search/sandbox vendor HTTP or API-level failure.
    #[error("Provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    /// Tool execution failure, projected into a tool result rather than
    /// propagated — this variant exists for the few call sites where a
    /// tool error must still stop the turn (e.g. can't even construct a
    /// tool registry).
    #[error("Tool error: {tool}: {message}")]
    Tool { tool: String, message: String },

    /// External-tool bridge (MCP) transport or protocol failure.
    #[error("Bridge error: {server}: {message}")]
    Bridge { server: String, message: String },

    /// Workspace path-containment or filesystem-layout violation.
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// Engine configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session does not exist or has been deleted.
    #[error("Session error: {0}")]
    Session(String),

    /// Catch-all for errors that do not yet have a dedicated variant.
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider { provider: provider.into(), message: message.into() }
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool { tool: tool.into(), message: message.into() }
    }

    pub fn bridge(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Bridge { server: server.into(), message: message.into() }
    }
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Other(s)
    }
}

impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        EngineError::Other(s.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<EngineError> for String {
    fn from(e: EngineError) -> Self {
        e.to_string()
    }
}
