//! The turn-based search dialog.
//!
//! Layered as: `resolver` folds NLU classifications into the query,
//! `selection` tracks the result page and picked hits, `state` holds the
//! serializable per-session machine state, and `dispatcher` drives the
//! whole interaction protocol one turn at a time.

pub mod dispatcher;
pub mod resolver;
pub mod selection;
pub mod state;

pub use dispatcher::SearchDialog;
pub use resolver::{IntentResolver, ResolveOutcome};
pub use selection::{ResultPage, SelectionSet};
pub use state::{DialogPhase, SessionState, SubDialog, TurnInput, TurnRequest};
