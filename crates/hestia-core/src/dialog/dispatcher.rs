//! The per-turn dialog dispatcher.
//!
//! `SearchDialog` drives the whole interaction protocol: it classifies raw
//! input as a selection id, a list command, or free text for the NLU
//! collaborator, executes searches, tracks selections, and runs the refine
//! sub-flow. Each call to [`SearchDialog::take_turn`] advances the machine
//! by exactly one turn and returns the input the host must collect next.
//!
//! No failure in here is fatal: malformed input gets a clarification,
//! collaborator failures get a fallback message, and confirmation
//! attempt-exhaustion is an implicit "no". Every condition resolves to a
//! defined phase transition.

use std::sync::Arc;

use super::resolver::{IntentResolver, ResolveOutcome};
use super::selection::ResultPage;
use super::state::{DialogPhase, SessionState, SubDialog, TurnInput, TurnRequest};
use crate::nlu::NluClient;
use crate::normalize::{capitalize_first, normalize_price, normalize_room_count};
use crate::presenter::Presenter;
use crate::search::SearchClient;

const FIRST_PROMPT: &str = "What would you like to search for?";
const NEXT_PROMPT: &str = "What else would you like to search for?";
const NEXT_PROMPT_LIST_HINT: &str = " You can also *list* all items you've added so far.";
const RESULTS_CAPTION: &str = "Here are a few good options I found:";
const SELECTIONS_CAPTION: &str = "Here's what you've added to your list so far.";
const NOTHING_ADDED: &str = "You have not added anything yet.";
const MULTI_INSTRUCTIONS: &str = "You can select one or more to add to your list, *list* what you've selected so far, *refine* these results, see *more* or search *again*.";
const SINGLE_INSTRUCTIONS: &str =
    "You can select one, *refine* these results, see *more* or search *again*.";
const NO_RESULTS_RETRY: &str =
    "Sorry, I didn't find any matches. Do you want to retry your search?";
const UNKNOWN_ACTION: &str = "Not sure what you mean. You can search *again*, *refine*, *list* or select one of the items above. Or are you *done*?";
const CONTINUE_SEARCHING: &str = "Do you want to continue searching and adding more items?";
const NLU_UNAVAILABLE: &str =
    "Sorry, I'm having trouble understanding right now. Please try again.";
const FAREWELL: &str = "Goodbye! Happy house hunting.";
const STARTING_OVER: &str = "Okay, starting over with a fresh search.";
const NOTHING_TO_REFINE: &str = "There is nothing to refine by right now.";

/// Turn-based search dialog over the NLU, search, and presentation
/// collaborators.
///
/// The dialog itself holds no conversation state; everything lives in the
/// [`SessionState`] passed into each turn, so sessions can be persisted at
/// any suspension point.
pub struct SearchDialog {
    resolver: IntentResolver,
    search: Arc<dyn SearchClient>,
    presenter: Arc<dyn Presenter>,
    multiple_selection: bool,
}

impl SearchDialog {
    pub fn new(
        nlu: Arc<dyn NluClient>,
        search: Arc<dyn SearchClient>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            resolver: IntentResolver::new(nlu),
            search,
            presenter,
            multiple_selection: false,
        }
    }

    /// Enables multi-selection mode: selections accumulate into a list and
    /// the user decides when they are done.
    pub fn with_multiple_selection(mut self, multiple_selection: bool) -> Self {
        self.multiple_selection = multiple_selection;
        self
    }

    /// Opens the dialog: issues the initial prompt.
    pub fn start(&self, state: &mut SessionState) -> TurnRequest {
        self.initial_prompt(state)
    }

    /// Re-issues the pending request for a session restored from storage.
    ///
    /// `TurnRequest` values are not persisted, so a resumed host needs to
    /// ask what the machine was waiting for. No state is advanced.
    pub fn resume(&self, state: &mut SessionState) -> TurnRequest {
        match state.phase.clone() {
            DialogPhase::AwaitingQuery => self.initial_prompt(state),
            DialogPhase::AwaitingResultAction => TurnRequest::AwaitInput,
            DialogPhase::AwaitingRetryConfirm => {
                TurnRequest::PromptConfirm(NO_RESULTS_RETRY.to_string())
            }
            DialogPhase::AwaitingContinueConfirm => {
                TurnRequest::PromptConfirm(CONTINUE_SEARCHING.to_string())
            }
            DialogPhase::InSubDialog => match state.sub_dialogs.last() {
                Some(dialog) => prompt_for_sub_dialog(dialog),
                None => TurnRequest::AwaitInput,
            },
            DialogPhase::Terminal { abandoned } => terminal_outcome(state, abandoned),
        }
    }

    /// Advances the dialog by one turn.
    ///
    /// Input that does not match the current phase (a confirmation answer
    /// while free text is expected, and vice versa) is treated as malformed
    /// and recovered locally by re-requesting the expected input.
    pub async fn take_turn(&self, state: &mut SessionState, input: TurnInput) -> TurnRequest {
        tracing::debug!(phase = ?state.phase, "taking turn");
        match state.phase.clone() {
            DialogPhase::AwaitingQuery => match input {
                TurnInput::Text(text) => self.handle_query(state, &text).await,
                _ => self.initial_prompt(state),
            },
            DialogPhase::AwaitingResultAction => match input {
                TurnInput::Text(text) => self.handle_result_action(state, &text).await,
                _ => TurnRequest::AwaitInput,
            },
            DialogPhase::AwaitingRetryConfirm => match input {
                TurnInput::Confirm(true) => self.initial_prompt(state),
                TurnInput::Confirm(false) | TurnInput::ConfirmAborted => {
                    // Abandoned with no result: terminal, null outcome.
                    state.phase = DialogPhase::Terminal { abandoned: true };
                    TurnRequest::Completed(None)
                }
                TurnInput::Text(_) => TurnRequest::PromptConfirm(NO_RESULTS_RETRY.to_string()),
            },
            DialogPhase::AwaitingContinueConfirm => match input {
                TurnInput::Confirm(true) => self.initial_prompt(state),
                TurnInput::Confirm(false) | TurnInput::ConfirmAborted => {
                    self.complete_with_selections(state)
                }
                TurnInput::Text(_) => TurnRequest::PromptConfirm(CONTINUE_SEARCHING.to_string()),
            },
            DialogPhase::InSubDialog => self.handle_sub_dialog(state, input).await,
            DialogPhase::Terminal { abandoned } => terminal_outcome(state, abandoned),
        }
    }

    /// The `AwaitingQuery` entry point, also reached by fall-through from
    /// `AwaitingResultAction` ("type a new search while results are
    /// showing"). Selection ids are checked before intent classification,
    /// so numeric replies never reach the NLU service.
    async fn handle_query(&self, state: &mut SessionState, text: &str) -> TurnRequest {
        let trimmed = text.trim();

        if self.multiple_selection && trimmed.eq_ignore_ascii_case("list") {
            self.list_added_so_far(state).await;
            return self.initial_prompt(state);
        }

        if !trimmed.is_empty() && trimmed.parse::<i64>().is_ok() {
            return self.add_selected_item(state, trimmed).await;
        }

        match self.resolver.resolve(trimmed, &mut state.query).await {
            Ok(ResolveOutcome::Search) => self.execute_search(state).await,
            Ok(ResolveOutcome::Bye) => {
                self.presenter.post_text(FAREWELL).await;
                self.complete_with_selections(state)
            }
            Ok(ResolveOutcome::StartOver) => {
                state.query.reset();
                state.query.search_text.clear();
                self.presenter.post_text(STARTING_OVER).await;
                self.initial_prompt(state)
            }
            Err(err) => {
                tracing::warn!(error = %err, "NLU classification failed");
                self.presenter.post_text(NLU_UNAVAILABLE).await;
                state.phase = DialogPhase::AwaitingQuery;
                TurnRequest::AwaitInput
            }
        }
    }

    /// Command handling while results are showing.
    async fn handle_result_action(&self, state: &mut SessionState, text: &str) -> TurnRequest {
        match text.trim().to_lowercase().as_str() {
            "again" | "reset" => {
                state.query.reset();
                self.initial_prompt(state)
            }
            "more" => {
                state.query.next_page();
                self.execute_search(state).await
            }
            "refine" => self.enter_refine_subflow(state).await,
            "list" => {
                self.list_added_so_far(state).await;
                TurnRequest::AwaitInput
            }
            "done" => self.complete_with_selections(state),
            // Anything else is a selection id or a brand new query.
            _ => self.handle_query(state, text).await,
        }
    }

    /// Builds the query from the session's refinement state and runs it.
    ///
    /// Zero hits ask for a retry; a backend failure posts the fallback
    /// message and parks in `AwaitingResultAction` (no silent retry).
    async fn execute_search(&self, state: &mut SessionState) -> TurnRequest {
        let query = state.query.build();
        tracing::debug!(page = query.page, refinements = query.refinements.len(), "executing search");

        match self.search.execute(&query).await {
            Err(err) => {
                tracing::warn!(error = %err, "search execution failed");
                self.presenter.post_text(UNKNOWN_ACTION).await;
                state.phase = DialogPhase::AwaitingResultAction;
                TurnRequest::AwaitInput
            }
            Ok(response) if response.hits.is_empty() => {
                state.phase = DialogPhase::AwaitingRetryConfirm;
                TurnRequest::PromptConfirm(NO_RESULTS_RETRY.to_string())
            }
            Ok(response) => {
                state.results = ResultPage::new(response.hits);
                self.presenter
                    .render_results(&state.results.hits, RESULTS_CAPTION)
                    .await;
                let instructions = if self.multiple_selection {
                    MULTI_INSTRUCTIONS
                } else {
                    SINGLE_INSTRUCTIONS
                };
                self.presenter.post_text(instructions).await;
                state.phase = DialogPhase::AwaitingResultAction;
                TurnRequest::AwaitInput
            }
        }
    }

    /// Selection-by-id against the current result page.
    async fn add_selected_item(&self, state: &mut SessionState, id: &str) -> TurnRequest {
        let Some(hit) = state.results.find_by_key(id).cloned() else {
            self.presenter.post_text(UNKNOWN_ACTION).await;
            state.phase = DialogPhase::AwaitingResultAction;
            return TurnRequest::AwaitInput;
        };

        // Idempotent add: a key already in the list is never re-appended.
        state.selections.add(hit.clone());

        if !self.multiple_selection {
            return self.complete_with_selections(state);
        }

        self.presenter
            .post_text(&format!("'{}' was added to your list!", hit.title))
            .await;
        state.phase = DialogPhase::AwaitingContinueConfirm;
        TurnRequest::PromptConfirm(CONTINUE_SEARCHING.to_string())
    }

    async fn list_added_so_far(&self, state: &SessionState) {
        if state.selections.is_empty() {
            self.presenter.post_text(NOTHING_ADDED).await;
        } else {
            self.presenter
                .render_selections(state.selections.hits(), SELECTIONS_CAPTION)
                .await;
        }
    }

    fn complete_with_selections(&self, state: &mut SessionState) -> TurnRequest {
        state.phase = DialogPhase::Terminal { abandoned: false };
        TurnRequest::Completed(Some(state.selections.hits().to_vec()))
    }

    /// Pushes the refiner-selection step and prompts for a choice.
    async fn enter_refine_subflow(&self, state: &mut SessionState) -> TurnRequest {
        let offered = self.search.top_refiners();
        if offered.is_empty() {
            self.presenter.post_text(NOTHING_TO_REFINE).await;
            state.phase = DialogPhase::AwaitingResultAction;
            return TurnRequest::AwaitInput;
        }

        let prompt = refiner_prompt(&offered);
        state.sub_dialogs.push(SubDialog::SelectRefiner { offered });
        state.phase = DialogPhase::InSubDialog;
        TurnRequest::PromptText(prompt)
    }

    /// Runs the top step of the sub-dialog stack. On completion (value
    /// applied or the user declined) the step pops and the search
    /// re-executes, which also restores a top-level phase.
    async fn handle_sub_dialog(&self, state: &mut SessionState, input: TurnInput) -> TurnRequest {
        let Some(dialog) = state.sub_dialogs.last().cloned() else {
            // Stack/phase mismatch (e.g. hand-edited persisted state):
            // recover by re-running the search.
            tracing::warn!("sub-dialog phase with empty stack");
            return self.execute_search(state).await;
        };

        let TurnInput::Text(text) = input else {
            return prompt_for_sub_dialog(&dialog);
        };
        let choice = text.trim();

        match dialog {
            SubDialog::SelectRefiner { ref offered } => {
                if choice.is_empty() || choice.eq_ignore_ascii_case("cancel") {
                    state.sub_dialogs.pop();
                    return self.execute_search(state).await;
                }

                match pick_refiner(offered, choice) {
                    Some(refiner) => {
                        let prompt = value_prompt(&refiner);
                        // Replace the top step in place: same stack depth,
                        // next step of the sub-flow.
                        if let Some(top) = state.sub_dialogs.last_mut() {
                            *top = SubDialog::RefineValue { refiner };
                        }
                        TurnRequest::PromptText(prompt)
                    }
                    None => TurnRequest::PromptText(format!(
                        "I don't know that one. {}",
                        refiner_prompt(offered)
                    )),
                }
            }
            SubDialog::RefineValue { ref refiner } => {
                if choice.is_empty() || choice.eq_ignore_ascii_case("cancel") {
                    state.sub_dialogs.pop();
                    return self.execute_search(state).await;
                }

                let value = normalize_refiner_value(refiner, choice);
                tracing::debug!(refiner, %value, "applying refiner from sub-flow");
                state.query.refinements.set_single(refiner.clone(), value);
                state.sub_dialogs.pop();
                self.execute_search(state).await
            }
        }
    }

    fn initial_prompt(&self, state: &mut SessionState) -> TurnRequest {
        let prompt = if !state.first_prompt_shown {
            FIRST_PROMPT.to_string()
        } else if self.multiple_selection {
            format!("{}{}", NEXT_PROMPT, NEXT_PROMPT_LIST_HINT)
        } else {
            NEXT_PROMPT.to_string()
        };

        state.first_prompt_shown = true;
        state.phase = DialogPhase::AwaitingQuery;
        TurnRequest::PromptText(prompt)
    }
}

/// Resolves a refiner choice by 1-based number or case-insensitive name.
fn pick_refiner(offered: &[String], choice: &str) -> Option<String> {
    if let Ok(number) = choice.parse::<usize>() {
        if (1..=offered.len()).contains(&number) {
            return Some(offered[number - 1].clone());
        }
        return None;
    }
    offered
        .iter()
        .find(|name| name.eq_ignore_ascii_case(choice))
        .cloned()
}

/// Applies the same normalization the resolver uses for the equivalent
/// entity types; unknown refiners take the value verbatim.
fn normalize_refiner_value(refiner: &str, value: &str) -> String {
    match refiner {
        "beds" | "baths" => normalize_room_count(value),
        "MinPrice" | "MaxPrice" => normalize_price(value),
        "city" => capitalize_first(value),
        _ => value.to_string(),
    }
}

fn refiner_prompt(offered: &[String]) -> String {
    let numbered: Vec<String> = offered
        .iter()
        .enumerate()
        .map(|(index, name)| format!("{}. {}", index + 1, name))
        .collect();
    format!(
        "What would you like to refine by? {} (reply with a number or name, or *cancel* to skip)",
        numbered.join("  ")
    )
}

fn value_prompt(refiner: &str) -> String {
    format!("What value for *{}*? (or *cancel* to skip)", refiner)
}

fn prompt_for_sub_dialog(dialog: &SubDialog) -> TurnRequest {
    match dialog {
        SubDialog::SelectRefiner { offered } => TurnRequest::PromptText(refiner_prompt(offered)),
        SubDialog::RefineValue { refiner } => TurnRequest::PromptText(value_prompt(refiner)),
    }
}

/// The request a terminated dialog keeps reporting: the recorded outcome,
/// identical whether or not the session was persisted in between.
fn terminal_outcome(state: &SessionState, abandoned: bool) -> TurnRequest {
    if abandoned {
        TurnRequest::Completed(None)
    } else {
        TurnRequest::Completed(Some(state.selections.hits().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HestiaError, Result};
    use crate::nlu::{NluIntent, NluResponse};
    use crate::search::{SearchHit, SearchQuery, SearchResponse};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    // ------------------------------------------------------------------
    // Mock collaborators
    // ------------------------------------------------------------------

    struct MockNlu {
        responses: HashMap<String, NluResponse>,
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    impl MockNlu {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                fail: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with_intent(mut self, utterance: &str, intent: &str) -> Self {
            self.responses.insert(
                utterance.to_string(),
                NluResponse::intent_only(intent, 0.9),
            );
            self
        }

        fn with_response(mut self, utterance: &str, response: NluResponse) -> Self {
            self.responses.insert(utterance.to_string(), response);
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    #[async_trait]
    impl NluClient for MockNlu {
        async fn classify(&self, utterance: &str) -> Result<NluResponse> {
            self.calls.lock().unwrap().push(utterance.to_string());
            if self.fail {
                return Err(HestiaError::nlu("down"));
            }
            Ok(self
                .responses
                .get(utterance)
                .cloned()
                .unwrap_or_else(|| NluResponse::intent_only("None", 0.3)))
        }
    }

    struct MockSearch {
        responses: Mutex<VecDeque<Result<SearchResponse>>>,
        queries: Mutex<Vec<SearchQuery>>,
        refiners: Vec<String>,
    }

    impl MockSearch {
        fn new() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                queries: Mutex::new(Vec::new()),
                refiners: vec![
                    "beds".to_string(),
                    "baths".to_string(),
                    "city".to_string(),
                    "MinPrice".to_string(),
                    "MaxPrice".to_string(),
                ],
            }
        }

        fn queue_hits(self, hits: Vec<SearchHit>) -> Self {
            let total = hits.len();
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok(SearchResponse { hits, total }));
            self
        }

        fn queue_empty(self) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok(SearchResponse::empty()));
            self
        }

        fn queue_failure(self) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(HestiaError::search("backend unreachable")));
            self
        }

        fn last_query(&self) -> SearchQuery {
            self.queries.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl SearchClient for MockSearch {
        async fn execute(&self, query: &SearchQuery) -> Result<SearchResponse> {
            self.queries.lock().unwrap().push(query.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(SearchResponse::empty()))
        }

        fn top_refiners(&self) -> Vec<String> {
            self.refiners.clone()
        }
    }

    #[derive(Default)]
    struct MockPresenter {
        messages: Mutex<Vec<String>>,
        rendered: Mutex<Vec<(String, usize)>>,
    }

    impl MockPresenter {
        fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Presenter for MockPresenter {
        async fn render_results(&self, hits: &[SearchHit], caption: &str) {
            self.rendered
                .lock()
                .unwrap()
                .push((caption.to_string(), hits.len()));
        }

        async fn render_selections(&self, hits: &[SearchHit], caption: &str) {
            self.rendered
                .lock()
                .unwrap()
                .push((caption.to_string(), hits.len()));
        }

        async fn post_text(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    fn hits() -> Vec<SearchHit> {
        vec![
            SearchHit::new("1", "Craftsman on Maple St"),
            SearchHit::new("2", "Condo downtown"),
            SearchHit::new("3", "Lakeside cottage"),
        ]
    }

    struct Fixture {
        dialog: SearchDialog,
        search: Arc<MockSearch>,
        presenter: Arc<MockPresenter>,
        state: SessionState,
    }

    fn fixture(nlu: MockNlu, search: MockSearch, multi: bool) -> Fixture {
        let search = Arc::new(search);
        let presenter = Arc::new(MockPresenter::default());
        let dialog = SearchDialog::new(Arc::new(nlu), search.clone(), presenter.clone())
            .with_multiple_selection(multi);
        Fixture {
            dialog,
            search,
            presenter,
            state: SessionState::new(),
        }
    }

    /// Drives a fixture to `AwaitingResultAction` with one page of hits.
    async fn with_results(nlu: MockNlu, search: MockSearch, multi: bool) -> Fixture {
        let mut f = fixture(nlu, search, multi);
        f.dialog.start(&mut f.state);
        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("houses in seattle".into()))
            .await;
        assert_eq!(request, TurnRequest::AwaitInput);
        assert_eq!(f.state.phase, DialogPhase::AwaitingResultAction);
        f
    }

    // ------------------------------------------------------------------
    // Prompting and search execution
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_start_prompts_then_prompts_differently_after() {
        let mut f = fixture(MockNlu::new(), MockSearch::new().queue_empty(), true);

        let first = f.dialog.start(&mut f.state);
        assert_eq!(first, TurnRequest::PromptText(FIRST_PROMPT.to_string()));

        // zero hits -> retry confirm -> accept -> back to the query prompt
        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("anything".into()))
            .await;
        let again = f.dialog.take_turn(&mut f.state, TurnInput::Confirm(true)).await;
        match again {
            TurnRequest::PromptText(prompt) => {
                assert!(prompt.starts_with(NEXT_PROMPT));
                assert!(prompt.contains("*list*"));
            }
            other => panic!("expected text prompt, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_renders_results_and_instructions() {
        let f = with_results(MockNlu::new(), MockSearch::new().queue_hits(hits()), false).await;

        let rendered = f.presenter.rendered.lock().unwrap().clone();
        assert_eq!(rendered, vec![(RESULTS_CAPTION.to_string(), 3)]);
        assert_eq!(f.presenter.messages(), vec![SINGLE_INSTRUCTIONS.to_string()]);
    }

    #[tokio::test]
    async fn test_more_increments_page_and_keeps_refinements() {
        let nlu = MockNlu::new().with_response(
            "houses in seattle",
            NluResponse {
                top_scoring_intent: NluIntent {
                    intent: "house lookup".to_string(),
                    score: 0.95,
                },
                entities: vec![crate::nlu::NluEntity {
                    entity: "seattle".to_string(),
                    entity_type: "city".to_string(),
                    score: 0.9,
                }],
            },
        );
        let search = MockSearch::new().queue_hits(hits()).queue_hits(hits());
        let mut f = with_results(nlu, search, false).await;

        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("more".into()))
            .await;

        let query = f.search.last_query();
        assert_eq!(query.page, 2);
        assert_eq!(
            query.refinements,
            vec![("city".to_string(), vec!["Seattle".to_string()])]
        );
        assert_eq!(f.state.phase, DialogPhase::AwaitingResultAction);
    }

    #[tokio::test]
    async fn test_zero_hits_decline_completes_with_null() {
        let mut f = fixture(MockNlu::new(), MockSearch::new().queue_empty(), false);
        f.dialog.start(&mut f.state);

        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("nothing matches".into()))
            .await;
        assert_eq!(
            request,
            TurnRequest::PromptConfirm(NO_RESULTS_RETRY.to_string())
        );

        let done = f.dialog.take_turn(&mut f.state, TurnInput::Confirm(false)).await;
        assert_eq!(done, TurnRequest::Completed(None));
        assert!(f.state.is_terminal());
    }

    #[tokio::test]
    async fn test_zero_hits_accept_returns_to_query_with_refinements_intact() {
        let nlu = MockNlu::new().with_response(
            "two bedrooms",
            NluResponse {
                top_scoring_intent: NluIntent {
                    intent: "refinement".to_string(),
                    score: 0.9,
                },
                entities: vec![crate::nlu::NluEntity {
                    entity: "two".to_string(),
                    entity_type: "number of bedrooms".to_string(),
                    score: 0.9,
                }],
            },
        );
        let mut f = fixture(nlu, MockSearch::new().queue_empty(), false);
        f.dialog.start(&mut f.state);

        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("two bedrooms".into()))
            .await;
        f.dialog.take_turn(&mut f.state, TurnInput::Confirm(true)).await;

        assert_eq!(f.state.phase, DialogPhase::AwaitingQuery);
        assert_eq!(f.state.query.refinements.first_value("beds"), Some("2"));
    }

    #[tokio::test]
    async fn test_retry_confirm_exhaustion_matches_explicit_decline() {
        let mut f = fixture(MockNlu::new(), MockSearch::new().queue_empty(), false);
        f.dialog.start(&mut f.state);
        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("nothing".into()))
            .await;

        let done = f
            .dialog
            .take_turn(&mut f.state, TurnInput::ConfirmAborted)
            .await;
        assert_eq!(done, TurnRequest::Completed(None));
        assert!(f.state.is_terminal());
    }

    #[tokio::test]
    async fn test_search_failure_posts_fallback_and_parks_in_result_action() {
        let mut f = fixture(MockNlu::new(), MockSearch::new().queue_failure(), false);
        f.dialog.start(&mut f.state);

        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("anything".into()))
            .await;

        assert_eq!(request, TurnRequest::AwaitInput);
        assert_eq!(f.state.phase, DialogPhase::AwaitingResultAction);
        assert_eq!(f.presenter.messages(), vec![UNKNOWN_ACTION.to_string()]);
    }

    #[tokio::test]
    async fn test_nlu_failure_keeps_awaiting_query() {
        let mut f = fixture(MockNlu::new().failing(), MockSearch::new(), false);
        f.dialog.start(&mut f.state);

        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("hello".into()))
            .await;

        assert_eq!(request, TurnRequest::AwaitInput);
        assert_eq!(f.state.phase, DialogPhase::AwaitingQuery);
        assert_eq!(f.presenter.messages(), vec![NLU_UNAVAILABLE.to_string()]);
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_single_selection_completes_with_one_hit() {
        let mut f = with_results(MockNlu::new(), MockSearch::new().queue_hits(hits()), false).await;

        let done = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("2".into()))
            .await;

        match done {
            TurnRequest::Completed(Some(selected)) => {
                assert_eq!(selected.len(), 1);
                assert_eq!(selected[0].key, "2");
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(f.state.is_terminal());
    }

    #[tokio::test]
    async fn test_multi_selection_confirms_then_continues() {
        let mut f = with_results(MockNlu::new(), MockSearch::new().queue_hits(hits()), true).await;

        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("1".into()))
            .await;
        assert_eq!(
            request,
            TurnRequest::PromptConfirm(CONTINUE_SEARCHING.to_string())
        );
        assert!(f
            .presenter
            .messages()
            .iter()
            .any(|m| m.contains("was added to your list")));

        let next = f.dialog.take_turn(&mut f.state, TurnInput::Confirm(true)).await;
        assert!(matches!(next, TurnRequest::PromptText(_)));
        assert_eq!(f.state.phase, DialogPhase::AwaitingQuery);
        assert_eq!(f.state.selections.len(), 1);
    }

    #[tokio::test]
    async fn test_selecting_same_key_twice_keeps_one_entry() {
        let search = MockSearch::new().queue_hits(hits()).queue_hits(hits());
        let nlu = MockNlu::new().with_intent("houses in seattle", "house lookup");
        let mut f = with_results(nlu, search, true).await;

        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("3".into()))
            .await;
        f.dialog.take_turn(&mut f.state, TurnInput::Confirm(true)).await;
        // search again so a result page is showing, then pick the same key
        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("houses in seattle".into()))
            .await;
        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("3".into()))
            .await;

        assert_eq!(f.state.selections.len(), 1);
    }

    #[tokio::test]
    async fn test_continue_confirm_decline_completes_with_selections() {
        let mut f = with_results(MockNlu::new(), MockSearch::new().queue_hits(hits()), true).await;

        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("1".into()))
            .await;
        let done = f
            .dialog
            .take_turn(&mut f.state, TurnInput::ConfirmAborted)
            .await;

        match done {
            TurnRequest::Completed(Some(selected)) => assert_eq!(selected.len(), 1),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_selection_id_asks_for_clarification() {
        let mut f = with_results(MockNlu::new(), MockSearch::new().queue_hits(hits()), false).await;

        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("99".into()))
            .await;

        assert_eq!(request, TurnRequest::AwaitInput);
        assert_eq!(f.state.phase, DialogPhase::AwaitingResultAction);
        assert!(f.presenter.messages().contains(&UNKNOWN_ACTION.to_string()));
    }

    // ------------------------------------------------------------------
    // Result-page commands
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_again_resets_refinements_and_reprompts() {
        let nlu = MockNlu::new().with_response(
            "houses in seattle",
            NluResponse {
                top_scoring_intent: NluIntent {
                    intent: "house lookup".to_string(),
                    score: 0.95,
                },
                entities: vec![crate::nlu::NluEntity {
                    entity: "seattle".to_string(),
                    entity_type: "city".to_string(),
                    score: 0.9,
                }],
            },
        );
        let mut f = with_results(nlu, MockSearch::new().queue_hits(hits()), false).await;
        assert!(!f.state.query.refinements.is_empty());

        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("again".into()))
            .await;

        assert!(matches!(request, TurnRequest::PromptText(_)));
        assert!(f.state.query.refinements.is_empty());
        assert_eq!(f.state.query.page_number, 1);
        assert_eq!(f.state.phase, DialogPhase::AwaitingQuery);
    }

    #[tokio::test]
    async fn test_done_completes_with_accumulated_selections() {
        let search = MockSearch::new().queue_hits(hits()).queue_hits(hits());
        let mut f = with_results(MockNlu::new(), search, true).await;
        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("1".into()))
            .await;
        f.dialog.take_turn(&mut f.state, TurnInput::Confirm(true)).await;

        // search again to get back to a result page, then finish
        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("houses in seattle".into()))
            .await;
        assert_eq!(request, TurnRequest::AwaitInput);
        let done = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("done".into()))
            .await;

        match done {
            TurnRequest::Completed(Some(selected)) => assert_eq!(selected.len(), 1),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_new_query_while_results_showing_goes_through_nlu() {
        let nlu = MockNlu::new().with_intent("show me condos", "house lookup");
        let search = MockSearch::new().queue_hits(hits()).queue_hits(hits());
        let mut f = with_results(nlu, search, false).await;

        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("show me condos".into()))
            .await;

        assert_eq!(request, TurnRequest::AwaitInput);
        assert_eq!(f.search.queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_in_multi_mode_shows_selections_and_reprompts() {
        let mut f = with_results(MockNlu::new(), MockSearch::new().queue_hits(hits()), true).await;
        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("2".into()))
            .await;
        f.dialog.take_turn(&mut f.state, TurnInput::Confirm(true)).await;

        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("LIST".into()))
            .await;

        assert!(matches!(request, TurnRequest::PromptText(_)));
        let rendered = f.presenter.rendered.lock().unwrap().clone();
        assert!(rendered.contains(&(SELECTIONS_CAPTION.to_string(), 1)));
    }

    #[tokio::test]
    async fn test_list_with_nothing_added_says_so() {
        let mut f = with_results(MockNlu::new(), MockSearch::new().queue_hits(hits()), true).await;

        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("list".into()))
            .await;

        assert!(f.presenter.messages().contains(&NOTHING_ADDED.to_string()));
    }

    // ------------------------------------------------------------------
    // Bye / start over
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_bye_says_farewell_and_completes() {
        let nlu = MockNlu::new().with_intent("goodbye", "bye");
        let mut f = fixture(nlu, MockSearch::new(), true);
        f.dialog.start(&mut f.state);

        let done = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("goodbye".into()))
            .await;

        assert!(matches!(done, TurnRequest::Completed(Some(_))));
        assert!(f.presenter.messages().contains(&FAREWELL.to_string()));
        assert!(f.state.is_terminal());
    }

    #[tokio::test]
    async fn test_start_over_clears_query_and_reprompts() {
        let nlu = MockNlu::new()
            .with_intent("houses in seattle", "None")
            .with_intent("start over please", "start over");
        let mut f = with_results(nlu, MockSearch::new().queue_hits(hits()), false).await;
        assert!(!f.state.query.search_text.is_empty());

        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("start over please".into()))
            .await;

        assert!(matches!(request, TurnRequest::PromptText(_)));
        assert!(f.state.query.refinements.is_empty());
        assert!(f.state.query.search_text.is_empty());
        assert_eq!(f.state.phase, DialogPhase::AwaitingQuery);
    }

    // ------------------------------------------------------------------
    // Refine sub-flow
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_refine_flow_applies_value_and_reruns_search() {
        let search = MockSearch::new().queue_hits(hits()).queue_hits(hits());
        let mut f = with_results(MockNlu::new(), search, false).await;

        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("refine".into()))
            .await;
        match &request {
            TurnRequest::PromptText(prompt) => assert!(prompt.contains("refine by")),
            other => panic!("expected refiner prompt, got {other:?}"),
        }
        assert_eq!(f.state.phase, DialogPhase::InSubDialog);

        // pick by number, then supply a value in word form
        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("1".into()))
            .await;
        match &request {
            TurnRequest::PromptText(prompt) => assert!(prompt.contains("beds")),
            other => panic!("expected value prompt, got {other:?}"),
        }

        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("three".into()))
            .await;
        assert_eq!(request, TurnRequest::AwaitInput);
        assert_eq!(f.state.phase, DialogPhase::AwaitingResultAction);
        assert!(f.state.sub_dialogs.is_empty());
        assert_eq!(f.state.query.refinements.first_value("beds"), Some("3"));
        assert_eq!(f.search.queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_refine_pick_by_name_and_city_normalization() {
        let search = MockSearch::new().queue_hits(hits()).queue_hits(hits());
        let mut f = with_results(MockNlu::new(), search, false).await;

        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("refine".into()))
            .await;
        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("City".into()))
            .await;
        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("tacoma".into()))
            .await;

        assert_eq!(f.state.query.refinements.first_value("city"), Some("Tacoma"));
    }

    #[tokio::test]
    async fn test_refine_unknown_choice_reprompts_in_place() {
        let mut f = with_results(MockNlu::new(), MockSearch::new().queue_hits(hits()), false).await;

        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("refine".into()))
            .await;
        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("floorplan".into()))
            .await;

        match request {
            TurnRequest::PromptText(prompt) => assert!(prompt.contains("I don't know that one")),
            other => panic!("expected re-prompt, got {other:?}"),
        }
        assert_eq!(f.state.phase, DialogPhase::InSubDialog);
    }

    #[tokio::test]
    async fn test_refine_decline_reruns_search_unchanged() {
        let search = MockSearch::new().queue_hits(hits()).queue_hits(hits());
        let mut f = with_results(MockNlu::new(), search, false).await;

        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("refine".into()))
            .await;
        let request = f
            .dialog
            .take_turn(&mut f.state, TurnInput::Text("cancel".into()))
            .await;

        assert_eq!(request, TurnRequest::AwaitInput);
        assert_eq!(f.state.phase, DialogPhase::AwaitingResultAction);
        assert!(f.state.query.refinements.is_empty());
        assert_eq!(f.search.queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resume_reissues_the_pending_request() {
        let mut f = with_results(MockNlu::new(), MockSearch::new().queue_hits(hits()), false).await;
        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("refine".into()))
            .await;

        let json = serde_json::to_string(&f.state).unwrap();
        let mut restored: SessionState = serde_json::from_str(&json).unwrap();

        match f.dialog.resume(&mut restored) {
            TurnRequest::PromptText(prompt) => assert!(prompt.contains("refine by")),
            other => panic!("expected refiner prompt, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_abandoned_outcome_survives_persistence() {
        let mut f = fixture(MockNlu::new(), MockSearch::new().queue_empty(), false);
        f.dialog.start(&mut f.state);
        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("nothing matches".into()))
            .await;
        let done = f.dialog.take_turn(&mut f.state, TurnInput::Confirm(false)).await;
        assert_eq!(done, TurnRequest::Completed(None));

        // reload from storage: the null outcome must be reported, not an
        // empty selection list
        let json = serde_json::to_string(&f.state).unwrap();
        let mut restored: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(f.dialog.resume(&mut restored), TurnRequest::Completed(None));
    }

    #[tokio::test]
    async fn test_selection_outcome_survives_persistence() {
        let mut f = with_results(MockNlu::new(), MockSearch::new().queue_hits(hits()), false).await;
        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("2".into()))
            .await;

        let json = serde_json::to_string(&f.state).unwrap();
        let mut restored: SessionState = serde_json::from_str(&json).unwrap();

        match f.dialog.resume(&mut restored) {
            TurnRequest::Completed(Some(selected)) => {
                assert_eq!(selected.len(), 1);
                assert_eq!(selected[0].key, "2");
            }
            other => panic!("expected completed selections, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_state_survives_persistence_mid_subflow() {
        let search = MockSearch::new().queue_hits(hits()).queue_hits(hits());
        let mut f = with_results(MockNlu::new(), search, false).await;

        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("refine".into()))
            .await;
        f.dialog
            .take_turn(&mut f.state, TurnInput::Text("beds".into()))
            .await;

        // suspend + resume between turns: behavior must be identical
        let json = serde_json::to_string(&f.state).unwrap();
        let mut restored: SessionState = serde_json::from_str(&json).unwrap();

        let request = f
            .dialog
            .take_turn(&mut restored, TurnInput::Text("two".into()))
            .await;
        assert_eq!(request, TurnRequest::AwaitInput);
        assert_eq!(restored.query.refinements.first_value("beds"), Some("2"));
    }
}
