//! One editing session.
//!
//! ## Learning: The Facade Pattern
//!
//! `Session` acts as a facade, providing a simple interface to
//! complex subsystems. A frontend only needs to talk to `Session`: it
//! types, deletes and moves the cursor, runs commands, and awaits
//! generation results. Every edit is reported to the coordinator as
//! `DOCUMENT_CHANGED` so a pending suggestion or anchor follows it.

use inkling_ai::{ContentGenerationClient, client_from_config};
use inkling_buffer::{Mark, Selection, TextBuffer};
use std::path::Path;
use std::sync::Arc;

use crate::command::{Command, CommandDispatcher};
use crate::config::Config;
use crate::coordinator::{
    GenerationCoordinator, GenerationEvent, GenerationState, Outcome, StateSnapshot,
};
use crate::document::DocumentHost;
use crate::event::CoordinatorEvent;
use crate::keymap::KeyPress;
use crate::{CoreError, CoreResult};

/// A document, its generation lifecycle, and the gestures that drive it.
///
/// ## Thread Safety
///
/// `Session` is designed to be owned by a single task. The only
/// concurrent work, the client call, runs on the tokio runtime and is
/// collected through [`Session::next_completion`].
pub struct Session {
    /// The document
    buffer: TextBuffer,

    /// Generation lifecycle
    coordinator: GenerationCoordinator,

    /// Gesture translation
    dispatcher: CommandDispatcher,

    /// Configuration the session was built from
    config: Config,
}

impl Session {
    /// Creates a session over an empty document.
    pub fn new(config: Config, client: Arc<dyn ContentGenerationClient>) -> Self {
        Self::with_buffer(
            config.clone(),
            client,
            TextBuffer::with_config(config.buffer.to_buffer_config()),
        )
    }

    /// Creates a session with the client selected by `config.ai`.
    pub fn from_config(config: Config) -> Self {
        let client = client_from_config(&config.ai);
        Self::new(config, client)
    }

    /// Creates a session over `text`, cursor at the end.
    pub fn with_text(
        config: Config,
        client: Arc<dyn ContentGenerationClient>,
        text: &str,
    ) -> Self {
        let buffer = TextBuffer::from_text(text, config.buffer.to_buffer_config());
        let mut session = Self::with_buffer(config, client, buffer);
        session.buffer.move_to_end();
        session
    }

    /// Creates a session over a file's content, cursor at the end.
    ///
    /// The file is only read; the session never writes it back.
    pub fn open(
        config: Config,
        client: Arc<dyn ContentGenerationClient>,
        path: impl AsRef<Path>,
    ) -> CoreResult<Self> {
        let buffer = TextBuffer::from_file(path, config.buffer.to_buffer_config())?;
        let mut session = Self::with_buffer(config, client, buffer);
        session.buffer.move_to_end();
        Ok(session)
    }

    fn with_buffer(
        config: Config,
        client: Arc<dyn ContentGenerationClient>,
        buffer: TextBuffer,
    ) -> Self {
        tracing::debug!(client = client.name(), "Creating session");
        Self {
            coordinator: GenerationCoordinator::new(client, &config.generation),
            dispatcher: CommandDispatcher::from_config(&config.keyboard),
            buffer,
            config,
        }
    }

    // ==================== Document ====================

    /// Returns the document text.
    pub fn text(&self) -> String {
        self.buffer.text().into_owned()
    }

    /// Returns the document.
    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    /// Returns the cursor position (the selection head).
    pub fn cursor(&self) -> usize {
        self.buffer.selection().head
    }

    /// Returns the spans currently marked provisional.
    pub fn provisional_spans(&self) -> Vec<std::ops::Range<usize>> {
        self.buffer
            .marks()
            .spans_of(Mark::Provisional)
            .map(|span| span.range.clone())
            .collect()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ==================== Text Editing ====================

    /// Types text at the cursor.
    pub fn insert_text(&mut self, text: &str) -> CoreResult<()> {
        self.buffer.insert_at_cursor(text)?;
        self.document_changed()
    }

    /// Deletes the selection or the character before the cursor.
    pub fn delete_backward(&mut self) -> CoreResult<()> {
        if self.buffer.delete_backward()?.is_some() {
            self.document_changed()?;
        }
        Ok(())
    }

    /// Deletes a character range.
    pub fn delete_range(&mut self, range: std::ops::Range<usize>) -> CoreResult<()> {
        self.buffer.delete(range)?;
        self.document_changed()
    }

    /// Moves the cursor.
    pub fn set_cursor(&mut self, pos: usize) -> CoreResult<()> {
        let len = self.buffer.len_chars();
        if pos > len {
            return Err(CoreError::PositionOutOfBounds { position: pos, len });
        }
        self.buffer.set_selection(Selection::cursor(pos))?;
        Ok(())
    }

    /// Undoes the last edit.
    pub fn undo(&mut self) -> CoreResult<()> {
        self.buffer.undo()?;
        self.document_changed()
    }

    /// Redoes the last undone edit.
    pub fn redo(&mut self) -> CoreResult<()> {
        self.buffer.redo()?;
        self.document_changed()
    }

    fn document_changed(&mut self) -> CoreResult<()> {
        let snapshot = self.buffer.snapshot();
        self.coordinator.handle(
            GenerationEvent::DocumentChanged { snapshot },
            &mut self.buffer,
        )?;
        Ok(())
    }

    // ==================== Generation ====================

    /// Returns the lifecycle state.
    pub fn state(&self) -> GenerationState {
        self.coordinator.state()
    }

    /// Returns the observable state and context.
    pub fn snapshot(&self) -> StateSnapshot {
        self.coordinator.snapshot()
    }

    /// Returns the coordinator.
    pub fn coordinator(&self) -> &GenerationCoordinator {
        &self.coordinator
    }

    /// Returns true while a generation result is outstanding.
    pub fn is_generating(&self) -> bool {
        self.coordinator.is_awaiting_result()
    }

    /// Runs a command at the cursor.
    ///
    /// Commands that aren't available in the current state are ignored.
    pub fn run_command(&mut self, command: Command) -> CoreResult<Outcome> {
        let cursor = self.cursor();
        self.run_command_at(command, cursor)
    }

    /// Runs a command, anchoring a continuation at `cursor`.
    pub fn run_command_at(&mut self, command: Command, cursor: usize) -> CoreResult<Outcome> {
        match self.dispatcher.translate(command, self.state(), cursor) {
            Some(event) => self.handle(event),
            None => Ok(Outcome::Ignored),
        }
    }

    /// Runs a command by its identifier, e.g. `"ai.accept"`.
    pub fn run_named(&mut self, id: &str) -> CoreResult<Outcome> {
        let command = Command::parse(id).ok_or_else(|| CoreError::CommandNotFound(id.into()))?;
        self.run_command(command)
    }

    /// Feeds a key press through the keymap.
    pub fn press(&mut self, key: KeyPress) -> CoreResult<Outcome> {
        let (state, cursor) = (self.state(), self.cursor());
        match self.dispatcher.dispatch_key(key, state, cursor) {
            Some(event) => self.handle(event),
            None => Ok(Outcome::Ignored),
        }
    }

    /// Returns the key sequences bound to `command`, e.g. `["Ctrl+Enter"]`.
    pub fn key_hints(&self, command: Command) -> Vec<String> {
        self.dispatcher
            .keymap()
            .bindings_for(command)
            .map(|binding| binding.key_string())
            .collect()
    }

    /// Feeds an event straight to the coordinator.
    pub fn handle(&mut self, event: GenerationEvent) -> CoreResult<Outcome> {
        self.coordinator.handle(event, &mut self.buffer)
    }

    /// Waits for the outstanding generation result.
    ///
    /// Safe to use in `tokio::select!`: if the wait is abandoned, the
    /// result is still there next time.
    pub async fn next_completion(&mut self) -> Option<GenerationEvent> {
        self.coordinator.next_completion().await
    }

    /// Waits for the outstanding generation result and applies it.
    pub async fn settle(&mut self) -> CoreResult<Outcome> {
        self.coordinator.settle(&mut self.buffer).await
    }

    /// Subscribes to coordinator events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CoordinatorEvent> {
        self.coordinator.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{Key, Modifiers};
    use inkling_ai::SubstituteClient;

    fn session(text: &str) -> Session {
        Session::with_text(Config::default(), Arc::new(SubstituteClient::new()), text)
    }

    #[tokio::test]
    async fn test_continue_and_accept_with_keys() {
        let mut session = session("It was late.");

        session
            .press(KeyPress::new(Key::Enter, Modifiers::CTRL))
            .unwrap();
        assert_eq!(session.state(), GenerationState::Generating);

        session.settle().await.unwrap();
        assert_eq!(session.state(), GenerationState::Review);
        let expected = format!(
            "It was late. {}",
            SubstituteClient::continuation_for("It was late.")
        );
        assert_eq!(session.text(), expected);
        assert_eq!(session.provisional_spans().len(), 1);

        session
            .press(KeyPress::new(Key::Tab, Modifiers::NONE))
            .unwrap();
        assert_eq!(session.state(), GenerationState::Idle);
        assert_eq!(session.text(), expected);
        assert!(session.provisional_spans().is_empty());
    }

    #[tokio::test]
    async fn test_typing_is_reported_to_the_coordinator() {
        let mut session = session("Hello");
        session.run_command(Command::Continue).unwrap();
        session.settle().await.unwrap();

        session.set_cursor(0).unwrap();
        session.insert_text(">> ").unwrap();

        let range = session.snapshot().context.pending_range.unwrap();
        assert_eq!(range.from(), 8);

        session.run_named("ai.discard").unwrap();
        assert_eq!(session.text(), ">> Hello");
    }

    #[tokio::test]
    async fn test_undo_of_the_suggestion_discards_it() {
        let mut session = session("Hello");
        session.run_command(Command::Continue).unwrap();
        session.settle().await.unwrap();

        session.undo().unwrap();
        assert_eq!(session.state(), GenerationState::Idle);
        assert_eq!(session.text(), "Hello");
    }

    #[test]
    fn test_unknown_command_name() {
        let mut session = session("");
        assert!(matches!(
            session.run_named("ai.nope"),
            Err(CoreError::CommandNotFound(_))
        ));
    }

    #[test]
    fn test_key_hints() {
        let session = session("");
        assert_eq!(session.key_hints(Command::Continue), vec!["Ctrl+Enter"]);
        assert_eq!(session.key_hints(Command::Retry), vec!["Ctrl+R"]);
    }

    #[test]
    fn test_cursor_bounds() {
        let mut session = session("abc");
        assert_eq!(session.cursor(), 3);
        assert!(session.set_cursor(4).is_err());
    }

    #[test]
    fn test_opened_file_starts_with_cursor_at_the_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.txt");
        std::fs::write(&path, "héllo").unwrap();

        let session = Session::open(
            Config::default(),
            Arc::new(SubstituteClient::new()),
            &path,
        )
        .unwrap();
        assert_eq!(session.text(), "héllo");
        assert_eq!(session.cursor(), 5);
    }
}
