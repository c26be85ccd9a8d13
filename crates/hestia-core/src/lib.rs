//! Hestia core: the conversational search state machine.
//!
//! Turns free-form user utterances into a structured, incrementally-refined
//! search query, executes it against a search backend, and tracks which
//! results the user has picked across turns. The NLU service, the search
//! index, the presentation surface, and prompt I/O are all collaborators
//! behind traits; this crate owns only the session state and the protocol.

pub mod dialog;
pub mod error;
pub mod nlu;
pub mod normalize;
pub mod presenter;
pub mod search;
pub mod session;

// Re-export common error type
pub use error::{HestiaError, Result};
