// Scout Engine — HTTP/SSE transport (ambient stack, spec §6 transport
// envelope). Grounded on `api/v1/chat.py::chat_stream`'s event_generator:
// one `data: {JSON}\n\n` record per engine event, terminated by
// `data: {"type":"done"}\n\n`, with the same three response headers. The
// axum `Sse`/`Event`/`KeepAlive` plumbing is grounded on
// `querymt-service/src/main.rs`'s streaming chat-completions handler,
// since the teacher's own HTTP crate (`pawz-code/server`) was retrieved
// without source files.

use crate::atoms::types::TurnRequest;
use crate::engine::events::{ChannelSink, EngineEvent, EventSink};
use crate::engine::SessionRegistry;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::http::{header, HeaderValue};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

/// Drive one turn to completion on a background task, forwarding every
/// emitted `EngineEvent` onto the returned stream as it happens.
fn turn_event_stream(registry: Arc<SessionRegistry>, req: TurnRequest) -> impl Stream<Item = Result<Event, Infallible>> {
    let (sink, rx) = ChannelSink::new();
    tokio::spawn(async move {
        if let Err(e) = registry.submit_turn(req, &sink).await {
            sink.emit(EngineEvent::Error { message: e.to_string() }).await;
        }
        sink.emit(EngineEvent::Done {}).await;
    });

    UnboundedReceiverStream::new(rx).map(|event| {
        let body = serde_json::to_string(&event).unwrap_or_else(|_| r#"{"type":"error","message":"event serialization failed"}"#.to_string());
        Ok(Event::default().data(body))
    })
}

/// `POST /api/v1/chat/stream` handler body: wraps `turn_event_stream` in
/// the transport-envelope headers spec §6 names explicitly.
pub fn turn_stream_response(registry: Arc<SessionRegistry>, req: TurnRequest) -> Response {
    let stream = turn_event_stream(registry, req);
    let sse = Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"));
    let mut response = sse.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
    response
}
