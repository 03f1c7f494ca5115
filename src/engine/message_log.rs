// Scout Engine — Message Log (C1).
// Append-only sequence of Messages with position-preserving serialization
// to a single JSON file named `messages.json` under the session directory.
// Every mutator flushes to disk before returning. Grounded on the
// teacher's `engine/sessions.rs` persistence style, adapted from SQLite
// rows to a flat JSON document per spec §4.1 / §6.

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{Message, Role, ToolCallProposal};
use std::path::{Path, PathBuf};

pub struct MessageLog {
    path: PathBuf,
    messages: Vec<Message>,
}

impl MessageLog {
    /// Load the log from `dir/messages.json`. A missing file yields an
    /// empty log rather than an error.
    pub fn load(dir: &Path) -> EngineResult<Self> {
        let path = dir.join("messages.json");
        let messages = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(MessageLog { path, messages })
    }

    fn flush(&self) -> EngineResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&self.messages)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    pub fn append_system(&mut self, text: impl Into<String>) -> EngineResult<()> {
        self.messages.push(Message::system(text));
        self.flush()
    }

    pub fn append_user(&mut self, text: impl Into<String>) -> EngineResult<()> {
        self.messages.push(Message::user(text));
        self.flush()
    }

    /// At least one of `text` / `proposals` must be non-empty (spec §3 —
    /// Message invariant on assistant records).
    pub fn append_assistant(
        &mut self,
        text: Option<String>,
        proposals: Option<Vec<ToolCallProposal>>,
    ) -> EngineResult<()> {
        let has_text = text.as_ref().map(|t| !t.is_empty()).unwrap_or(false);
        let has_calls = proposals.as_ref().map(|p| !p.is_empty()).unwrap_or(false);
        if !has_text && !has_calls {
            return Err(EngineError::Other(
                "assistant message must carry content or tool-call proposals".into(),
            ));
        }
        for p in proposals.iter().flatten() {
            if p.id.is_empty() || p.call_type != "function" || p.function.name.is_empty() {
                return Err(EngineError::Other("malformed tool-call proposal".into()));
            }
        }
        self.messages.push(Message::assistant(text, proposals));
        self.flush()
    }

    pub fn append_tool_result(&mut self, id: impl Into<String>, text: impl Into<String>) -> EngineResult<()> {
        self.messages.push(Message::tool_result(id, text));
        self.flush()
    }

    pub fn list(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn length(&self, excluding_system: bool) -> usize {
        if excluding_system {
            self.messages.iter().filter(|m| m.role != Role::System).count()
        } else {
            self.messages.len()
        }
    }

    /// Drop everything but the leading system message(s) when `keep_system`
    /// is true; otherwise clear the log entirely.
    pub fn clear(&mut self, keep_system: bool) -> EngineResult<()> {
        if keep_system {
            self.messages.retain(|m| m.role == Role::System);
        } else {
            self.messages.clear();
        }
        self.flush()
    }

    /// The sole permitted in-place mutation: replace the system prompt at
    /// position 0 without touching the rest of the log (spec §4.1 / §9).
    pub fn replace_system_prompt(&mut self, text: impl Into<String>) -> EngineResult<()> {
        match self.messages.first_mut() {
            Some(m) if m.role == Role::System => {
                m.content = Some(text.into());
            }
            _ => {
                self.messages.insert(0, Message::system(text));
            }
        }
        self.flush()
    }

    /// Wholesale replacement used by compaction (§4.6) — the caller builds
    /// the full new message vector and this just persists it.
    pub fn replace_all(&mut self, messages: Vec<Message>) -> EngineResult<()> {
        self.messages = messages;
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile_dir::TempDir;

    mod tempfile_dir {
        use std::path::{Path, PathBuf};
        pub struct TempDir(PathBuf);
        impl TempDir {
            pub fn new(tag: &str) -> Self {
                let p = std::env::temp_dir().join(format!("scout-engine-test-{tag}-{}", uuid::Uuid::new_v4()));
                std::fs::create_dir_all(&p).unwrap();
                TempDir(p)
            }
            pub fn path(&self) -> &Path {
                &self.0
            }
        }
        impl Drop for TempDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }
    }

    #[test]
    fn load_missing_file_yields_empty_log() {
        let dir = TempDir::new("missing");
        let log = MessageLog::load(dir.path()).unwrap();
        assert_eq!(log.list().len(), 0);
    }

    #[test]
    fn append_and_reload_round_trips() {
        let dir = TempDir::new("roundtrip");
        {
            let mut log = MessageLog::load(dir.path()).unwrap();
            log.append_system("sys").unwrap();
            log.append_user("hello").unwrap();
        }
        let log = MessageLog::load(dir.path()).unwrap();
        assert_eq!(log.list().len(), 2);
        assert_eq!(log.list()[1].content.as_deref(), Some("hello"));
    }

    #[test]
    fn assistant_message_requires_content_or_proposals() {
        let dir = TempDir::new("assistant-empty");
        let mut log = MessageLog::load(dir.path()).unwrap();
        assert!(log.append_assistant(None, None).is_err());
        assert!(log.append_assistant(Some("ok".into()), None).is_ok());
    }

    #[test]
    fn replace_system_prompt_is_in_place() {
        let dir = TempDir::new("replace-sys");
        let mut log = MessageLog::load(dir.path()).unwrap();
        log.append_system("v1").unwrap();
        log.append_user("hi").unwrap();
        log.replace_system_prompt("v2").unwrap();
        assert_eq!(log.list()[0].content.as_deref(), Some("v2"));
        assert_eq!(log.list().len(), 2);
    }

    #[test]
    fn length_excludes_system_when_asked() {
        let dir = TempDir::new("length");
        let mut log = MessageLog::load(dir.path()).unwrap();
        log.append_system("sys").unwrap();
        log.append_user("hi").unwrap();
        assert_eq!(log.length(false), 2);
        assert_eq!(log.length(true), 1);
    }
}
