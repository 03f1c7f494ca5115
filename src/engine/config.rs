// Scout Engine — configuration.
// Loaded once at process start from the environment. Grounded on the
// teacher's env-driven EngineConfig pattern (engine/state.rs) and the
// originating Python Config class (core/config.py).

use crate::atoms::error::{EngineError, EngineResult};
use std::path::PathBuf;

/// Default context window ceiling in tokens (spec §6).
pub const CONTEXT_CEILING: u64 = 400_000;
/// Forced-compaction threshold in tokens (spec §4.6 / §6).
pub const AUTO_COMPACT_THRESHOLD: u64 = 280_000;
/// Keep-recent-user-messages count used by compaction (spec §4.6).
pub const COMPACTION_KEEP_RECENT: usize = 10;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub data_base_dir: PathBuf,
    pub openrouter_api_key: String,
    pub exa_api_key: String,
    pub e2b_api_key: Option<String>,
    pub environment: String,
    pub log_level: String,
    pub max_iterations: u32,
    pub default_model: String,
    pub http_port: u16,
}

impl EngineConfig {
    pub fn load() -> EngineResult<Self> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        if !matches!(environment.as_str(), "development" | "staging" | "production") {
            return Err(EngineError::Config(format!("invalid ENVIRONMENT: {environment}")));
        }

        let openrouter_api_key = std::env::var("OPENROUTER_API_KEY").unwrap_or_default();
        let exa_api_key = std::env::var("EXA_API_KEY").unwrap_or_default();
        let e2b_api_key = std::env::var("E2B_API_KEY").ok().filter(|s| !s.trim().is_empty());

        if environment == "production" {
            if openrouter_api_key.is_empty() {
                return Err(EngineError::Config("OPENROUTER_API_KEY is required in production".into()));
            }
            if exa_api_key.is_empty() {
                return Err(EngineError::Config("EXA_API_KEY is required in production".into()));
            }
        }

        let max_iterations: u32 = std::env::var("MAX_ITERATIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(200);

        let http_port: u16 = std::env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8000);

        Ok(EngineConfig {
            data_base_dir: std::env::var("DATA_BASE_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./data")),
            openrouter_api_key,
            exa_api_key,
            e2b_api_key,
            environment,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            max_iterations,
            default_model: std::env::var("SCOUT_DEFAULT_MODEL").unwrap_or_else(|_| "openai/gpt-5-codex".into()),
            http_port,
        })
    }

    pub fn sandbox_enabled(&self) -> bool {
        self.e2b_api_key.is_some()
    }

    pub fn chats_dir(&self) -> PathBuf {
        self.data_base_dir.join("chats")
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.chats_dir().join(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_environment() {
        std::env::set_var("ENVIRONMENT", "nonsense");
        let result = EngineConfig::load();
        std::env::remove_var("ENVIRONMENT");
        assert!(result.is_err());
    }
}
