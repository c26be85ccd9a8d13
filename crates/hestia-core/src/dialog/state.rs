//! Dialog state types.
//!
//! The whole per-session state of the conversation lives in one
//! serializable `SessionState` value that is passed into each turn and
//! mutated in place. Suspension is explicit: the dispatcher returns a
//! `TurnRequest` telling the host what input to collect next, and the host
//! resumes the machine with a `TurnInput`. There is no hidden instance
//! state and no continuation callbacks, so a session can be persisted
//! between any two turns and resumed with no behavior difference.

use serde::{Deserialize, Serialize};

use super::selection::{ResultPage, SelectionSet};
use crate::search::{QueryBuilder, SearchHit};

/// Where the dialog currently is in its interaction protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogPhase {
    /// Waiting for a fresh search utterance (initial state).
    AwaitingQuery,
    /// Results are showing; waiting for a command, a selection id, or a
    /// new search utterance.
    AwaitingResultAction,
    /// Zero hits came back; waiting for a yes/no on retrying.
    AwaitingRetryConfirm,
    /// A hit was added in multi-selection mode; waiting for a yes/no on
    /// continuing to search.
    AwaitingContinueConfirm,
    /// A nested sub-dialog owns the conversation (see `SubDialog`).
    InSubDialog,
    /// The dialog has produced its final outcome. `abandoned` records
    /// whether the search ended with no result at all (retry declined),
    /// as opposed to finishing with the selection list; a resumed session
    /// must report the same outcome an uninterrupted one would.
    Terminal { abandoned: bool },
}

/// A nested dialog step in the refine sub-flow.
///
/// The stack of these is owned by `SessionState` rather than the
/// dispatcher, so a session persisted mid-sub-flow resumes at the right
/// step. Completing or cancelling a step always returns control through a
/// search re-execution, so no separate return point is carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubDialog {
    /// Picking which refiner to adjust, out of the offered names.
    SelectRefiner { offered: Vec<String> },
    /// Supplying a value for the chosen refiner.
    RefineValue { refiner: String },
}

/// The complete, serializable state of one conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// The incrementally-refined query.
    pub query: QueryBuilder,
    /// The current result page (wholesale-replaced per search).
    #[serde(default)]
    pub results: ResultPage,
    /// Hits picked so far, across turns.
    #[serde(default)]
    pub selections: SelectionSet,
    /// Whether the initial prompt has been shown at least once.
    #[serde(default)]
    pub first_prompt_shown: bool,
    /// Current protocol phase.
    pub phase: DialogPhase,
    /// Explicit call stack for nested sub-dialogs.
    #[serde(default)]
    pub sub_dialogs: Vec<SubDialog>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            query: QueryBuilder::new(),
            results: ResultPage::default(),
            selections: SelectionSet::new(),
            first_prompt_shown: false,
            phase: DialogPhase::AwaitingQuery,
            sub_dialogs: Vec::new(),
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, DialogPhase::Terminal { .. })
    }
}

/// One unit of user input resuming the dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnInput {
    /// Free text typed by the user.
    Text(String),
    /// Answer to a yes/no confirmation prompt.
    Confirm(bool),
    /// The host exhausted its confirmation attempt limit; treated as an
    /// implicit "no".
    ConfirmAborted,
}

/// What the dispatcher needs from the host before the next turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnRequest {
    /// Prompt the user with a message and collect free text.
    PromptText(String),
    /// Ask a yes/no question; the host enforces its own attempt limit and
    /// feeds back `TurnInput::ConfirmAborted` on exhaustion.
    PromptConfirm(String),
    /// Wait for the next utterance without issuing a new prompt.
    AwaitInput,
    /// The dialog is finished. `Some` carries the accumulated selections
    /// (possibly empty); `None` means the search was abandoned with no
    /// result at all.
    Completed(Option<Vec<SearchHit>>),
}
