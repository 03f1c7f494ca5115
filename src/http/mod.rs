// Scout Engine — HTTP/SSE transport (ambient stack, spec §6). The route
// table, response envelopes, and transport headers are grounded on
// `api/v1/chat.py` and `main.py`; the axum/SSE mechanics are grounded on
// `querymt-service/src/main.rs` since the teacher's own HTTP crate
// (`pawz-code/server`) was retrieved without source files.

pub mod routes;
pub mod sse;

pub use routes::{router, AppState};
