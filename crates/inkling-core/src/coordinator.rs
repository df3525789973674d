//! The generation lifecycle state machine.
//!
//! ## States
//!
//! ```text
//!                 REQUEST_CONTINUE               GENERATION_OK
//!   ┌──────┐ ─────────────────────▶ ┌────────────┐ ───────────▶ ┌────────┐
//!   │ idle │                        │ generating │              │ review │
//!   └──────┘ ◀──────┐               └────────────┘              └────────┘
//!      ▲            │ DISMISS          │      ▲                    │
//!      │            │                  │      │ RETRY /            │
//!      │         ┌───────┐ GENERATION_FAIL    │ REQUEST_CONTINUE   │
//!      │         │ error │ ◀───────────┘      │                    │
//!      │         └───────┘ ───────────────────┘                    │
//!      └───────────────────────────────────────────────────────────┘
//!                         ACCEPT / DISCARD / range lost
//! ```
//!
//! ## Learning: Owning the Async Call
//!
//! Handling an event is synchronous: [`GenerationCoordinator::handle`]
//! runs to completion against `&mut` the document and never awaits. The
//! client call is spawned onto the tokio runtime and its `JoinHandle`
//! lives inside the `generating` phase, so there can never be two.
//! [`GenerationCoordinator::next_completion`] awaits that handle and turns
//! the result into a `GenerationOk`/`GenerationFail` event carrying the
//! ticket it was started with; the caller feeds it back through `handle`.
//!
//! Awaiting `&mut JoinHandle` leaves the handle in place if the waiting
//! future is dropped, which makes `next_completion` safe to use inside
//! `tokio::select!`.

use inkling_ai::{
    ContentGenerationClient, Continuation, GenerationError, GenerationErrorKind,
    GenerationRequest, Source,
};
use inkling_buffer::{Mark, Transaction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::GenerationConfig;
use crate::document::{DocumentHost, DocumentSnapshot};
use crate::event::{CoordinatorEvent, EventBus};
use crate::mutator::{DocumentMutator, PendingRange};
use crate::tracker::{PendingRangeTracker, TrackOutcome};
use crate::{CoreError, CoreResult};

/// The lifecycle state. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    #[default]
    Idle,
    Generating,
    Review,
    Error,
}

impl GenerationState {
    /// Returns the lowercase state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::Idle => "idle",
            GenerationState::Generating => "generating",
            GenerationState::Review => "review",
            GenerationState::Error => "error",
        }
    }

    /// Returns true if a new generation may start from this state.
    pub fn accepts_request(&self) -> bool {
        matches!(self, GenerationState::Idle | GenerationState::Error)
    }
}

impl std::fmt::Display for GenerationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one client invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationId(Uuid);

impl GenerationId {
    /// Creates a new unique ticket.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GenerationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GenerationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why the coordinator is in `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The client call failed
    Generation(GenerationErrorKind),
    /// The suggestion couldn't be inserted
    Document,
    /// A suggestion couldn't be removed exactly
    Integrity,
}

impl ErrorKind {
    /// Returns true if RETRY is allowed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::Generation(kind) => kind.is_retryable(),
            ErrorKind::Document => true,
            ErrorKind::Integrity => false,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Generation(kind) => write!(f, "{}", kind),
            ErrorKind::Document => f.write_str("document"),
            ErrorKind::Integrity => f.write_str("integrity"),
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone)]
pub enum GenerationEvent {
    /// Start a generation anchored at `cursor_position`
    RequestContinue { cursor_position: usize },
    /// The client call identified by `ticket` succeeded
    GenerationOk {
        ticket: GenerationId,
        continuation: Continuation,
    },
    /// The client call identified by `ticket` failed
    GenerationFail {
        ticket: GenerationId,
        error: GenerationError,
    },
    /// Keep the suggestion
    Accept,
    /// Remove the suggestion
    Discard,
    /// Try the failed generation again
    Retry,
    /// Leave the error state
    Dismiss,
    /// The document was edited
    DocumentChanged { snapshot: DocumentSnapshot },
}

impl GenerationEvent {
    /// Returns the event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            GenerationEvent::RequestContinue { .. } => "REQUEST_CONTINUE",
            GenerationEvent::GenerationOk { .. } => "GENERATION_OK",
            GenerationEvent::GenerationFail { .. } => "GENERATION_FAIL",
            GenerationEvent::Accept => "ACCEPT",
            GenerationEvent::Discard => "DISCARD",
            GenerationEvent::Retry => "RETRY",
            GenerationEvent::Dismiss => "DISMISS",
            GenerationEvent::DocumentChanged { .. } => "DOCUMENT_CHANGED",
        }
    }
}

/// The data attached to the current state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationContext {
    /// Latest document state the coordinator was told about
    pub document_snapshot: Option<DocumentSnapshot>,
    /// The continuation under review; empty otherwise
    pub generated_text: String,
    /// Present only in `error`
    pub error_message: Option<String>,
    /// Present only in `error`
    pub error_kind: Option<ErrorKind>,
    /// Where the next or last generation is anchored
    pub cursor_position: usize,
    /// Present only in `review`
    pub pending_range: Option<PendingRange>,
}

/// What presentation observes: `{value, context}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub value: GenerationState,
    pub context: GenerationContext,
}

/// The effect of handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The state changed
    Transitioned {
        from: GenerationState,
        to: GenerationState,
    },
    /// The event was applied without changing state
    Unchanged,
    /// The event isn't valid in the current state, or is stale
    Ignored,
}

impl Outcome {
    /// Returns true if the event had no effect.
    pub fn is_ignored(&self) -> bool {
        matches!(self, Outcome::Ignored)
    }
}

type GenerationTask = JoinHandle<Result<Continuation, GenerationError>>;

/// The one outstanding client call.
struct InFlight {
    ticket: GenerationId,
    /// Taken once the result has been collected
    task: Option<GenerationTask>,
}

enum Phase {
    Idle,
    Generating(InFlight),
    Review,
    Error,
}

impl Phase {
    fn state(&self) -> GenerationState {
        match self {
            Phase::Idle => GenerationState::Idle,
            Phase::Generating(_) => GenerationState::Generating,
            Phase::Review => GenerationState::Review,
            Phase::Error => GenerationState::Error,
        }
    }
}

/// Serializes AI continuations against a user-editable document.
///
/// ## Example
///
/// ```ignore
/// let mut coordinator = GenerationCoordinator::new(client, &GenerationConfig::default());
/// coordinator.handle(GenerationEvent::RequestContinue { cursor_position: 0 }, &mut buffer)?;
/// coordinator.settle(&mut buffer).await?;
/// assert_eq!(coordinator.state(), GenerationState::Review);
/// ```
pub struct GenerationCoordinator {
    client: Arc<dyn ContentGenerationClient>,
    mutator: DocumentMutator,
    tracker: PendingRangeTracker,
    phase: Phase,

    document_snapshot: Option<DocumentSnapshot>,
    generated_text: String,
    error: Option<(ErrorKind, String)>,
    cursor_position: usize,

    context_chars: usize,
    events: EventBus,
}

impl GenerationCoordinator {
    /// Creates an idle coordinator.
    pub fn new(client: Arc<dyn ContentGenerationClient>, config: &GenerationConfig) -> Self {
        Self {
            client,
            mutator: DocumentMutator::new(config.separator.clone()),
            tracker: PendingRangeTracker::new(),
            phase: Phase::Idle,
            document_snapshot: None,
            generated_text: String::new(),
            error: None,
            cursor_position: 0,
            context_chars: config.context_chars,
            events: EventBus::new(),
        }
    }

    // ==================== State ====================

    /// Returns the current state.
    pub fn state(&self) -> GenerationState {
        self.phase.state()
    }

    /// Returns the state together with its context.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            value: self.state(),
            context: GenerationContext {
                document_snapshot: self.document_snapshot,
                generated_text: self.generated_text.clone(),
                error_message: self.error.as_ref().map(|(_, message)| message.clone()),
                error_kind: self.error.as_ref().map(|(kind, _)| *kind),
                cursor_position: self.cursor_position,
                pending_range: self.tracker.range().cloned(),
            },
        }
    }

    /// Returns the suggestion under review.
    pub fn pending_range(&self) -> Option<&PendingRange> {
        self.tracker.range()
    }

    /// Returns the continuation under review.
    pub fn generated_text(&self) -> &str {
        &self.generated_text
    }

    /// Returns the error message while in `error`.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|(_, message)| message.as_str())
    }

    /// Returns the error category while in `error`.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|(kind, _)| *kind)
    }

    /// Returns the generation anchor.
    pub fn cursor_position(&self) -> usize {
        self.cursor_position
    }

    /// Returns the ticket of the call in flight.
    pub fn current_ticket(&self) -> Option<GenerationId> {
        match &self.phase {
            Phase::Generating(flight) => Some(flight.ticket),
            _ => None,
        }
    }

    /// Returns true while a client result is still to be collected.
    pub fn is_awaiting_result(&self) -> bool {
        matches!(&self.phase, Phase::Generating(flight) if flight.task.is_some())
    }

    /// Returns the client's name.
    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    /// Returns the event bus.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribes to coordinator events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    // ==================== Events ====================

    /// Handles one event to completion.
    ///
    /// Events that aren't valid in the current state are ignored, not
    /// errors. The only error is a `REQUEST_CONTINUE` beyond the end of
    /// the document.
    ///
    /// Must be called from within a tokio runtime: starting a generation
    /// spawns the client call.
    pub fn handle<D: DocumentHost + ?Sized>(
        &mut self,
        event: GenerationEvent,
        doc: &mut D,
    ) -> CoreResult<Outcome> {
        tracing::debug!(state = %self.state(), event = event.name(), "Handling event");

        let outcome = match event {
            GenerationEvent::RequestContinue { cursor_position } => {
                self.on_request_continue(cursor_position, doc)?
            }
            GenerationEvent::GenerationOk {
                ticket,
                continuation,
            } => self.on_generation_ok(ticket, continuation, doc),
            GenerationEvent::GenerationFail { ticket, error } => {
                self.on_generation_fail(ticket, error)
            }
            GenerationEvent::Accept => self.on_accept(doc),
            GenerationEvent::Discard => self.on_discard(doc),
            GenerationEvent::Retry => self.on_retry(doc)?,
            GenerationEvent::Dismiss => self.on_dismiss(),
            GenerationEvent::DocumentChanged { snapshot } => {
                self.on_document_changed(snapshot, doc)
            }
        };

        self.debug_check_invariants();
        Ok(outcome)
    }

    /// Waits for the call in flight and returns its result as an event.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<GenerationEvent> {
        let Phase::Generating(flight) = &mut self.phase else {
            return None;
        };
        let ticket = flight.ticket;
        let task = flight.task.as_mut()?;
        let joined = task.await;
        flight.task = None;

        let result = joined.unwrap_or_else(|e| {
            Err(GenerationError::Unknown(format!(
                "the generation task failed: {e}"
            )))
        });

        Some(match result {
            Ok(continuation) => GenerationEvent::GenerationOk {
                ticket,
                continuation,
            },
            Err(error) => GenerationEvent::GenerationFail { ticket, error },
        })
    }

    /// Waits for the call in flight and applies its result.
    pub async fn settle<D: DocumentHost + ?Sized>(&mut self, doc: &mut D) -> CoreResult<Outcome> {
        match self.next_completion().await {
            Some(event) => self.handle(event, doc),
            None => Ok(Outcome::Ignored),
        }
    }

    // ==================== Handlers ====================

    fn on_request_continue<D: DocumentHost + ?Sized>(
        &mut self,
        cursor_position: usize,
        doc: &mut D,
    ) -> CoreResult<Outcome> {
        if !self.state().accepts_request() {
            tracing::debug!("Ignoring continue request while {}", self.state());
            return Ok(Outcome::Ignored);
        }

        let len = doc.len_chars();
        if cursor_position > len {
            return Err(CoreError::PositionOutOfBounds {
                position: cursor_position,
                len,
            });
        }

        self.tracker.anchor_at(cursor_position, doc.version());
        self.cursor_position = cursor_position;
        self.start_generation(&*doc)
    }

    fn on_generation_ok<D: DocumentHost + ?Sized>(
        &mut self,
        ticket: GenerationId,
        continuation: Continuation,
        doc: &mut D,
    ) -> Outcome {
        if !self.is_current(ticket) {
            return self.drop_stale(ticket);
        }
        self.sync_anchor(&*doc);

        if continuation.text.trim().is_empty() {
            return self.fail_generation(GenerationError::Unknown(
                "the AI service returned an empty continuation".to_string(),
            ));
        }

        if continuation.source == Source::Fallback {
            tracing::info!("Continuation came from the quota fallback");
            self.events.emit(CoordinatorEvent::FallbackUsed);
        }

        let anchor = self.cursor_position.min(doc.len_chars());
        match self.mutator.insert(doc, &continuation.text, anchor) {
            Ok(range) => {
                let (from, to) = (range.from(), range.to());
                self.tracker.track(range, doc.version());
                let outcome = self.transition(Phase::Review);
                self.generated_text = continuation.text;

                tracing::info!(from, to, "Suggestion ready for review");
                self.events
                    .emit(CoordinatorEvent::SuggestionInserted { from, to });
                outcome
            }
            Err(e) => {
                let message = format!("Could not insert the suggestion: {e}");
                tracing::warn!("{}", message);
                self.tracker.clear();
                self.events.emit(CoordinatorEvent::DocumentFailed {
                    message: message.clone(),
                });
                self.enter_error(ErrorKind::Document, message)
            }
        }
    }

    fn on_generation_fail(&mut self, ticket: GenerationId, error: GenerationError) -> Outcome {
        if !self.is_current(ticket) {
            return self.drop_stale(ticket);
        }
        self.fail_generation(error)
    }

    fn on_accept<D: DocumentHost + ?Sized>(&mut self, doc: &mut D) -> Outcome {
        if self.state() != GenerationState::Review {
            tracing::debug!("Ignoring accept while {}", self.state());
            return Outcome::Ignored;
        }
        if let Some(outcome) = self.sync_range(doc) {
            return outcome;
        }
        let Some(range) = self.tracker.take() else {
            return self.integrity_fault(doc, "no suggestion is tracked".to_string());
        };

        match self.mutator.finalize(doc, &range) {
            Ok(_) => {
                tracing::info!(%range, "Suggestion accepted");
                self.events.emit(CoordinatorEvent::SuggestionAccepted {
                    from: range.from(),
                    to: range.to(),
                });
                self.transition(Phase::Idle)
            }
            Err(e) => self.integrity_fault(doc, e.to_string()),
        }
    }

    fn on_discard<D: DocumentHost + ?Sized>(&mut self, doc: &mut D) -> Outcome {
        if self.state() != GenerationState::Review {
            tracing::debug!("Ignoring discard while {}", self.state());
            return Outcome::Ignored;
        }
        if let Some(outcome) = self.sync_range(doc) {
            return outcome;
        }
        let Some(range) = self.tracker.take() else {
            return self.integrity_fault(doc, "no suggestion is tracked".to_string());
        };

        match self.mutator.revert(doc, &range) {
            Ok(()) => {
                tracing::info!(%range, "Suggestion discarded");
                self.events
                    .emit(CoordinatorEvent::SuggestionDiscarded { implicit: false });
                self.transition(Phase::Idle)
            }
            Err(e) => self.integrity_fault(doc, e.to_string()),
        }
    }

    fn on_retry<D: DocumentHost + ?Sized>(&mut self, doc: &mut D) -> CoreResult<Outcome> {
        if self.state() != GenerationState::Error {
            tracing::debug!("Ignoring retry while {}", self.state());
            return Ok(Outcome::Ignored);
        }
        if let Some(kind) = self.error_kind().filter(|kind| !kind.is_retryable()) {
            tracing::debug!("Not retrying after a {} error", kind);
            return Ok(Outcome::Ignored);
        }

        self.sync_anchor(&*doc);
        if self.tracker.anchor().is_none() {
            self.cursor_position = self.cursor_position.min(doc.len_chars());
            self.tracker.anchor_at(self.cursor_position, doc.version());
        }
        self.start_generation(&*doc)
    }

    fn on_dismiss(&mut self) -> Outcome {
        if self.state() != GenerationState::Error {
            tracing::debug!("Ignoring dismiss while {}", self.state());
            return Outcome::Ignored;
        }
        self.tracker.clear();
        self.transition(Phase::Idle)
    }

    fn on_document_changed<D: DocumentHost + ?Sized>(
        &mut self,
        snapshot: DocumentSnapshot,
        doc: &mut D,
    ) -> Outcome {
        self.document_snapshot = Some(snapshot);

        match self.state() {
            GenerationState::Idle => Outcome::Unchanged,
            GenerationState::Generating | GenerationState::Error => {
                self.sync_anchor(&*doc);
                Outcome::Unchanged
            }
            GenerationState::Review => self.sync_range(doc).unwrap_or(Outcome::Unchanged),
        }
    }

    // ==================== Internals ====================

    fn start_generation<D: DocumentHost + ?Sized>(&mut self, doc: &D) -> CoreResult<Outcome> {
        let anchor = self.cursor_position;
        let context = doc.text_before(anchor, self.context_chars)?;
        let request = GenerationRequest::new(context, anchor);
        let ticket = GenerationId::new();
        let client = Arc::clone(&self.client);

        tracing::info!(%ticket, cursor = anchor, client = client.name(), "Starting generation");

        let task = tokio::spawn(async move { client.continue_text(request).await });
        Ok(self.transition(Phase::Generating(InFlight {
            ticket,
            task: Some(task),
        })))
    }

    fn is_current(&self, ticket: GenerationId) -> bool {
        self.current_ticket() == Some(ticket)
    }

    fn drop_stale(&self, ticket: GenerationId) -> Outcome {
        tracing::warn!(%ticket, "Dropping result of a superseded generation");
        self.events
            .emit(CoordinatorEvent::StaleResultDropped { ticket });
        Outcome::Ignored
    }

    fn fail_generation(&mut self, error: GenerationError) -> Outcome {
        let kind = error.kind();
        let message = error.to_string();
        tracing::warn!(%kind, "Generation failed: {}", message);
        self.events.emit(CoordinatorEvent::GenerationFailed {
            kind,
            message: message.clone(),
        });
        self.enter_error(ErrorKind::Generation(kind), message)
    }

    /// Moves the anchor through user edits.
    fn sync_anchor<D: DocumentHost + ?Sized>(&mut self, doc: &D) {
        if self.tracker.sync(doc) == TrackOutcome::Untrackable {
            tracing::warn!("Lost track of the generation anchor, clamped to the document");
        }
        if let Some(anchor) = self.tracker.anchor() {
            self.cursor_position = anchor;
        }
    }

    /// Moves the pending range through user edits.
    ///
    /// Returns the outcome if the range can't be kept.
    fn sync_range<D: DocumentHost + ?Sized>(&mut self, doc: &mut D) -> Option<Outcome> {
        match self.tracker.sync(&*doc) {
            TrackOutcome::Unchanged | TrackOutcome::Moved => None,
            TrackOutcome::RangeLost => {
                tracing::warn!("Suggestion text was deleted, treating it as discarded");
                self.events
                    .emit(CoordinatorEvent::SuggestionDiscarded { implicit: true });
                Some(self.transition(Phase::Idle))
            }
            TrackOutcome::Untrackable => Some(self.integrity_fault(
                doc,
                "the document can no longer locate the suggestion".to_string(),
            )),
        }
    }

    /// Drops every provisional mark and the tracked range, then enters
    /// `error`.
    fn integrity_fault<D: DocumentHost + ?Sized>(&mut self, doc: &mut D, message: String) -> Outcome {
        let len = doc.len_chars();
        if doc.has_mark(0..len, Mark::Provisional) {
            if let Err(e) = doc.apply(Transaction::new().remove_mark(0..len, Mark::Provisional)) {
                tracing::error!("Failed to clear provisional marks: {}", e);
            }
        }
        self.tracker.clear();

        tracing::error!("Integrity fault: {}", message);
        self.events.emit(CoordinatorEvent::IntegrityFault {
            message: message.clone(),
        });
        self.enter_error(ErrorKind::Integrity, message)
    }

    fn enter_error(&mut self, kind: ErrorKind, message: String) -> Outcome {
        let outcome = self.transition(Phase::Error);
        self.error = Some((kind, message));
        outcome
    }

    /// Switches phase and clears whatever the new state may not carry.
    fn transition(&mut self, next: Phase) -> Outcome {
        let from = self.state();
        self.phase = next;
        let to = self.state();

        if to != GenerationState::Error {
            self.error = None;
        }
        if to != GenerationState::Review {
            self.generated_text.clear();
        }

        if from == to {
            return Outcome::Unchanged;
        }
        tracing::debug!(%from, %to, "State changed");
        self.events
            .emit(CoordinatorEvent::StateChanged { from, to });
        Outcome::Transitioned { from, to }
    }

    fn debug_check_invariants(&self) {
        let state = self.state();
        debug_assert_eq!(
            self.tracker.range().is_some(),
            state == GenerationState::Review,
            "a pending range exists exactly in review"
        );
        debug_assert_eq!(
            self.error.is_some(),
            state == GenerationState::Error,
            "an error message exists exactly in error"
        );
        debug_assert_eq!(
            !self.generated_text.is_empty(),
            state == GenerationState::Review,
            "generated text exists exactly in review"
        );
    }
}
