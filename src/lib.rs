//! Scout Engine — a two-mode conversational research-agent backend.
//!
//! `atoms` holds the pure data layer; `engine` holds the control loop,
//! tools, providers, and per-session state; `http` exposes it over HTTP/SSE.

pub mod atoms;
pub mod engine;
pub mod http;
