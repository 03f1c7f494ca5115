// Scout Engine — Atoms: pure data layer. No I/O, no imports from `engine`.

pub mod error;
pub mod types;

pub use error::{EngineError, EngineResult};
