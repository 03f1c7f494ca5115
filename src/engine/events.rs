// Scout Engine — Event Stream (C10).
// The ordered protocol of events emitted to callers for one turn. See
// spec §4.10 for the alphabet and ordering invariants.

use crate::atoms::types::{ChatResponse, ThinkingStep};
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    SessionCreated { session_id: String },
    StageSwitch { stage: String },
    ThinkingStep(ThinkingStep),
    Cancelled { message: String, steps_completed: u32, #[serde(skip_serializing_if = "Option::is_none")] stage: Option<String> },
    Error { message: String },
    Complete(Box<ChatResponse>),
    Done {},
}

/// Narrow capability the React Loop emits events through. Production code
/// forwards to an SSE response body; tests use an in-memory collector.
/// This is the `EventSink` named in the ambient-stack glossary entry.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: EngineEvent);
}

/// In-memory sink — used by tests and by any caller that wants the full
/// event list back rather than a live stream.
#[derive(Default)]
pub struct CollectingSink {
    events: parking_lot::Mutex<Vec<EngineEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn emit(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }
}

/// Channel-backed sink — used by the HTTP layer to bridge engine events
/// into an SSE body without the engine knowing anything about axum.
pub struct ChannelSink {
    tx: tokio::sync::mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (ChannelSink { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: EngineEvent) {
        // Receiver dropped (client disconnected) — nothing more to do.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collecting_sink_preserves_order() {
        let sink = CollectingSink::new();
        sink.emit(EngineEvent::SessionCreated { session_id: "s1".into() }).await;
        sink.emit(EngineEvent::Done {}).await;
        let events = sink.take();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], EngineEvent::SessionCreated { .. }));
        assert!(matches!(events[1], EngineEvent::Done {}));
        assert!(sink.take().is_empty());
    }
}
