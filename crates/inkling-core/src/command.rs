//! User gestures and the guard that turns them into coordinator events.
//!
//! ## Learning: The Command Pattern
//!
//! Commands encapsulate actions as values:
//! - A button, a key chord and a typed `:accept` all become the same value
//! - They can be parsed from config, listed, and checked before running
//!
//! The dispatcher is deliberately thin. Its one rule: a gesture that
//! isn't available in the current state does nothing. In particular,
//! "continue" is rejected unless the coordinator is idle or in error.

use crate::coordinator::{GenerationEvent, GenerationState};
use crate::config::KeyboardConfig;
use crate::keymap::{KeyPress, Keymap, KeymapResult};

/// Generation gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Ask for a continuation at the cursor
    Continue,
    /// Keep the suggestion
    Accept,
    /// Remove the suggestion
    Discard,
    /// Try the failed generation again
    Retry,
    /// Close the error
    Dismiss,
}

impl Command {
    /// Every command, in menu order.
    pub const ALL: [Command; 5] = [
        Command::Continue,
        Command::Accept,
        Command::Discard,
        Command::Retry,
        Command::Dismiss,
    ];

    /// Returns the command's display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Command::Continue => "Continue Writing",
            Command::Accept => "Accept Suggestion",
            Command::Discard => "Discard Suggestion",
            Command::Retry => "Retry",
            Command::Dismiss => "Dismiss Error",
        }
    }

    /// Returns the identifier used in config files.
    pub fn id(&self) -> &'static str {
        match self {
            Command::Continue => "ai.continue",
            Command::Accept => "ai.accept",
            Command::Discard => "ai.discard",
            Command::Retry => "ai.retry",
            Command::Dismiss => "ai.dismiss",
        }
    }

    /// Parses a command identifier.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.id() == s.trim())
    }

    /// States in which the gesture does something.
    pub fn states(&self) -> &'static [GenerationState] {
        match self {
            Command::Continue => &[GenerationState::Idle, GenerationState::Error],
            Command::Accept | Command::Discard => &[GenerationState::Review],
            Command::Retry | Command::Dismiss => &[GenerationState::Error],
        }
    }

    /// Returns true if the gesture is available in `state`.
    pub fn is_available(&self, state: GenerationState) -> bool {
        self.states().contains(&state)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Maps gestures to coordinator events.
pub struct CommandDispatcher {
    keymap: Keymap,
}

impl CommandDispatcher {
    /// Creates a dispatcher with the default key bindings.
    pub fn new() -> Self {
        Self {
            keymap: Keymap::new(),
        }
    }

    /// Creates a dispatcher with default plus user key bindings.
    pub fn from_config(config: &KeyboardConfig) -> Self {
        Self {
            keymap: Keymap::from_config(config),
        }
    }

    /// Returns the keymap.
    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    /// Translates a command, or rejects it.
    ///
    /// `cursor` is only used by [`Command::Continue`].
    pub fn translate(
        &self,
        command: Command,
        state: GenerationState,
        cursor: usize,
    ) -> Option<GenerationEvent> {
        if !command.is_available(state) {
            tracing::debug!(command = command.id(), %state, "Rejected command");
            return None;
        }

        Some(match command {
            Command::Continue => GenerationEvent::RequestContinue {
                cursor_position: cursor,
            },
            Command::Accept => GenerationEvent::Accept,
            Command::Discard => GenerationEvent::Discard,
            Command::Retry => GenerationEvent::Retry,
            Command::Dismiss => GenerationEvent::Dismiss,
        })
    }

    /// Feeds a key press through the keymap and translates a match.
    pub fn dispatch_key(
        &mut self,
        key: KeyPress,
        state: GenerationState,
        cursor: usize,
    ) -> Option<GenerationEvent> {
        match self.keymap.process(key, state) {
            KeymapResult::Match(command) => self.translate(command, state, cursor),
            KeymapResult::Pending | KeymapResult::NoMatch => None,
        }
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{Key, Modifiers};

    #[test]
    fn test_command_ids_roundtrip() {
        for cmd in Command::ALL {
            assert_eq!(Command::parse(cmd.id()), Some(cmd));
        }
        assert_eq!(Command::parse("editor.save"), None);
        assert_eq!(Command::Accept.display_name(), "Accept Suggestion");
    }

    #[test]
    fn test_continue_guard() {
        let dispatcher = CommandDispatcher::new();
        let allowed = [GenerationState::Idle, GenerationState::Error];

        for state in [
            GenerationState::Idle,
            GenerationState::Generating,
            GenerationState::Review,
            GenerationState::Error,
        ] {
            let event = dispatcher.translate(Command::Continue, state, 3);
            assert_eq!(event.is_some(), allowed.contains(&state), "{state}");
        }

        assert!(matches!(
            dispatcher.translate(Command::Continue, GenerationState::Idle, 3),
            Some(GenerationEvent::RequestContinue { cursor_position: 3 })
        ));
    }

    #[test]
    fn test_review_gestures_need_review() {
        let dispatcher = CommandDispatcher::new();
        assert!(
            dispatcher
                .translate(Command::Accept, GenerationState::Idle, 0)
                .is_none()
        );
        assert!(matches!(
            dispatcher.translate(Command::Discard, GenerationState::Review, 0),
            Some(GenerationEvent::Discard)
        ));
    }

    #[test]
    fn test_escape_depends_on_state() {
        let mut dispatcher = CommandDispatcher::new();
        let esc = KeyPress::new(Key::Escape, Modifiers::NONE);

        assert!(matches!(
            dispatcher.dispatch_key(esc.clone(), GenerationState::Review, 0),
            Some(GenerationEvent::Discard)
        ));
        assert!(matches!(
            dispatcher.dispatch_key(esc.clone(), GenerationState::Error, 0),
            Some(GenerationEvent::Dismiss)
        ));
        assert!(
            dispatcher
                .dispatch_key(esc, GenerationState::Idle, 0)
                .is_none()
        );
    }
}
