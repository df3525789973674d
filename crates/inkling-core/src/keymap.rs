//! Keyboard mapping and input handling.
//!
//! ## Learning: State Machines
//!
//! Key handling often involves state machines:
//! - Normal state: Process keys immediately
//! - Pending state: Waiting for more keys (e.g., `ctrl+k ctrl+a`)
//!
//! Bindings are also scoped to generation states, so the same key can
//! mean different things: `Escape` discards a suggestion in review and
//! dismisses an error in error.

use std::collections::HashMap;

use crate::command::Command;
use crate::config::KeyboardConfig;
use crate::coordinator::GenerationState;

/// Keyboard modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    /// Cmd, Win or Super
    pub meta: bool,
}

impl Modifiers {
    /// No modifiers pressed.
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    /// Ctrl modifier.
    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        alt: false,
        shift: false,
        meta: false,
    };

    /// Returns true if no modifiers are pressed.
    pub fn is_empty(&self) -> bool {
        !self.ctrl && !self.alt && !self.shift && !self.meta
    }

    /// Parses modifiers from a string like "ctrl+shift".
    pub fn parse(s: &str) -> Self {
        let mut mods = Modifiers::NONE;
        for part in s.split('+').map(|p| p.trim().to_lowercase()) {
            match part.as_str() {
                "ctrl" | "control" => mods.ctrl = true,
                "alt" | "option" => mods.alt = true,
                "shift" => mods.shift = true,
                "meta" | "cmd" | "win" | "super" => mods.meta = true,
                _ => {}
            }
        }
        mods
    }
}

impl std::fmt::Display for Modifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.alt {
            parts.push("Alt");
        }
        if self.shift {
            parts.push("Shift");
        }
        if self.meta {
            parts.push("Meta");
        }
        write!(f, "{}", parts.join("+"))
    }
}

/// A key code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Space,
    F(u8), // F1-F12
}

impl Key {
    /// Parses a key from a string.
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        match lower.as_str() {
            "enter" | "return" => Some(Key::Enter),
            "tab" => Some(Key::Tab),
            "backspace" | "bs" => Some(Key::Backspace),
            "escape" | "esc" => Some(Key::Escape),
            "space" => Some(Key::Space),
            _ if lower.starts_with('f') && lower.len() >= 2 && lower.len() <= 3 => {
                lower[1..].parse().ok().map(Key::F)
            }
            _ => {
                let mut chars = lower.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Key::Char(c)),
                    _ => None,
                }
            }
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{}", c.to_uppercase()),
            Key::Enter => write!(f, "Enter"),
            Key::Tab => write!(f, "Tab"),
            Key::Backspace => write!(f, "Backspace"),
            Key::Escape => write!(f, "Escape"),
            Key::Space => write!(f, "Space"),
            Key::F(n) => write!(f, "F{}", n),
        }
    }
}

/// A key press event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPress {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyPress {
    /// Creates a new key press.
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    /// Parses a single chord like "ctrl+enter".
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        // "ctrl++" binds the plus key
        let (mod_str, key_str) = match s.strip_suffix("++") {
            Some(mods) => (mods, "+"),
            None => match s.rsplit_once('+') {
                Some((mods, key)) => (mods, key),
                None => ("", s),
            },
        };

        let key = Key::parse(key_str)?;
        let modifiers = Modifiers::parse(mod_str);
        Some(Self { key, modifiers })
    }

    /// Parses a space-separated sequence like "ctrl+k ctrl+a".
    pub fn parse_sequence(s: &str) -> Option<Vec<Self>> {
        let keys: Option<Vec<_>> = s.split_whitespace().map(Self::parse).collect();
        keys.filter(|keys| !keys.is_empty())
    }
}

impl std::fmt::Display for KeyPress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.modifiers.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}+{}", self.modifiers, self.key)
        }
    }
}

/// A key binding maps a key sequence to a command.
#[derive(Debug, Clone)]
pub struct KeyBinding {
    /// The key sequence (may be multiple keys for chords).
    pub keys: Vec<KeyPress>,
    /// The command to execute.
    pub command: Command,
    /// State(s) in which this binding is active.
    pub states: Vec<GenerationState>,
}

impl KeyBinding {
    /// Creates a binding active wherever its command is available.
    pub fn simple(keys: Vec<KeyPress>, command: Command) -> Self {
        Self {
            keys,
            command,
            states: command.states().to_vec(),
        }
    }

    /// Returns the key sequence as a string.
    pub fn key_string(&self) -> String {
        self.keys
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Keyboard mapping configuration.
pub struct Keymap {
    /// All key bindings.
    bindings: Vec<KeyBinding>,
    /// Index by first key for fast lookup.
    by_key: HashMap<KeyPress, Vec<usize>>,
    /// Current pending keys (for multi-key sequences).
    pending: Vec<KeyPress>,
}

impl Keymap {
    /// Creates a new keymap with default bindings.
    pub fn new() -> Self {
        let mut keymap = Self {
            bindings: Vec::new(),
            by_key: HashMap::new(),
            pending: Vec::new(),
        };
        keymap.add_default_bindings();
        keymap.rebuild_index();
        keymap
    }

    /// Creates a keymap from configuration.
    ///
    /// User bindings are added after the defaults, in key-string order,
    /// so when two spellings name the same chord (`"Ctrl+J"` and
    /// `"ctrl+j"`) the one sorting last wins. Unparseable entries are
    /// skipped with a warning.
    pub fn from_config(config: &KeyboardConfig) -> Self {
        let mut keymap = Self::new();

        for (key_str, cmd_str) in &config.bindings {
            let Some(keys) = KeyPress::parse_sequence(key_str) else {
                tracing::warn!("Ignoring binding with unknown keys: {}", key_str);
                continue;
            };
            let Some(command) = Command::parse(cmd_str) else {
                tracing::warn!("Ignoring binding to unknown command: {}", cmd_str);
                continue;
            };
            keymap.bindings.push(KeyBinding::simple(keys, command));
        }

        keymap.rebuild_index();
        keymap
    }

    /// Adds default key bindings.
    fn add_default_bindings(&mut self) {
        use GenerationState::{Error, Idle, Review};

        let bindings = vec![
            (
                KeyPress::new(Key::Enter, Modifiers::CTRL),
                Command::Continue,
                vec![Idle, Error],
            ),
            (
                KeyPress::new(Key::Tab, Modifiers::NONE),
                Command::Accept,
                vec![Review],
            ),
            (
                KeyPress::new(Key::Escape, Modifiers::NONE),
                Command::Discard,
                vec![Review],
            ),
            (
                KeyPress::new(Key::Escape, Modifiers::NONE),
                Command::Dismiss,
                vec![Error],
            ),
            (
                KeyPress::new(Key::Char('r'), Modifiers::CTRL),
                Command::Retry,
                vec![Error],
            ),
        ];

        for (key, command, states) in bindings {
            self.bindings.push(KeyBinding {
                keys: vec![key],
                command,
                states,
            });
        }
    }

    /// Rebuilds the key index.
    fn rebuild_index(&mut self) {
        self.by_key.clear();
        for (i, binding) in self.bindings.iter().enumerate() {
            if let Some(first_key) = binding.keys.first() {
                self.by_key.entry(first_key.clone()).or_default().push(i);
            }
        }
    }

    /// Processes a key press.
    ///
    /// Later bindings win over earlier ones, so user bindings override
    /// defaults on the same keys.
    pub fn process(&mut self, key: KeyPress, state: GenerationState) -> KeymapResult {
        self.pending.push(key);

        let indices = match self.by_key.get(&self.pending[0]) {
            Some(v) => v.clone(),
            None => {
                self.pending.clear();
                return KeymapResult::NoMatch;
            }
        };

        let mut exact_match = None;
        let mut prefix_match = false;

        for i in indices {
            let binding = &self.bindings[i];

            if !binding.states.contains(&state) {
                continue;
            }

            if binding.keys == self.pending {
                exact_match = Some(binding.command);
            } else if binding.keys.len() > self.pending.len()
                && binding.keys[..self.pending.len()] == self.pending[..]
            {
                prefix_match = true;
            }
        }

        if let Some(command) = exact_match {
            self.pending.clear();
            return KeymapResult::Match(command);
        }

        if prefix_match {
            return KeymapResult::Pending;
        }

        self.pending.clear();
        KeymapResult::NoMatch
    }

    /// Returns true if waiting for more keys.
    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Returns all bindings.
    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }

    /// Returns the bindings for `command`, for help text.
    pub fn bindings_for(&self, command: Command) -> impl Iterator<Item = &KeyBinding> {
        self.bindings.iter().filter(move |b| b.command == command)
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of processing a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeymapResult {
    /// A command was matched.
    Match(Command),
    /// Waiting for more keys.
    Pending,
    /// No binding matches.
    NoMatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypress_parse() {
        let kp = KeyPress::parse("ctrl+enter").unwrap();
        assert_eq!(kp.key, Key::Enter);
        assert!(kp.modifiers.ctrl);

        let plus = KeyPress::parse("ctrl++").unwrap();
        assert_eq!(plus.key, Key::Char('+'));
        assert_eq!(KeyPress::parse("ctrl+nope"), None);
    }

    #[test]
    fn test_keypress_display() {
        let kp = KeyPress::new(Key::Char('r'), Modifiers::CTRL);
        assert_eq!(kp.to_string(), "Ctrl+R");
    }

    #[test]
    fn test_default_bindings() {
        let mut keymap = Keymap::new();
        let result = keymap.process(
            KeyPress::new(Key::Enter, Modifiers::CTRL),
            GenerationState::Idle,
        );
        assert_eq!(result, KeymapResult::Match(Command::Continue));

        let result = keymap.process(
            KeyPress::new(Key::Tab, Modifiers::NONE),
            GenerationState::Idle,
        );
        assert_eq!(result, KeymapResult::NoMatch);
    }

    #[test]
    fn test_user_sequence_binding() {
        let config = KeyboardConfig {
            bindings: [("ctrl+k a".to_string(), "ai.accept".to_string())].into(),
        };
        let mut keymap = Keymap::from_config(&config);

        let first = keymap.process(
            KeyPress::new(Key::Char('k'), Modifiers::CTRL),
            GenerationState::Review,
        );
        assert_eq!(first, KeymapResult::Pending);
        assert!(keymap.is_pending());

        let second = keymap.process(
            KeyPress::new(Key::Char('a'), Modifiers::NONE),
            GenerationState::Review,
        );
        assert_eq!(second, KeymapResult::Match(Command::Accept));
        assert!(!keymap.is_pending());
    }

    #[test]
    fn test_unknown_bindings_are_skipped() {
        let config = KeyboardConfig {
            bindings: [
                ("ctrl+j".to_string(), "editor.save".to_string()),
                ("hyper+".to_string(), "ai.continue".to_string()),
            ]
            .into(),
        };
        let keymap = Keymap::from_config(&config);
        assert_eq!(keymap.bindings().len(), Keymap::new().bindings().len());
    }

    #[test]
    fn test_same_chord_spelled_twice_resolves_by_key_order() {
        let config = KeyboardConfig {
            bindings: [
                ("ctrl+j".to_string(), "ai.accept".to_string()),
                ("Ctrl+J".to_string(), "ai.discard".to_string()),
            ]
            .into(),
        };

        for _ in 0..8 {
            let mut keymap = Keymap::from_config(&config);
            let result = keymap.process(
                KeyPress::new(Key::Char('j'), Modifiers::CTRL),
                GenerationState::Review,
            );
            assert_eq!(result, KeymapResult::Match(Command::Accept));
        }
    }
}
