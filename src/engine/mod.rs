// Scout Engine — engine layer. Everything here may depend on `atoms` and
// on its own sibling modules; nothing outside `engine` reaches into a
// module's internals directly except through what is re-exported below.

pub mod compaction;
pub mod config;
pub mod events;
pub mod mcp;
pub mod message_log;
pub mod mode_stage;
pub mod providers;
pub mod react_loop;
pub mod session_registry;
pub mod tools;
pub mod workspace;

pub use config::EngineConfig;
pub use events::{EngineEvent, EventSink};
pub use session_registry::{EngineShared, SessionHandle, SessionRegistry};
