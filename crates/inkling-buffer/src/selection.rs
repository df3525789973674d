//! Text selection handling.
//!
//! ## Learning: Anchor and Head
//!
//! A selection is stored as the point where it started (`anchor`) and the
//! point the user dragged to (`head`). Keeping both, instead of a
//! normalized `start..end`, preserves the direction: shift+left from a
//! backward selection extends it, from a forward one shrinks it.
//!
//! Offsets are character indices, so selections go stale on every edit
//! and are mapped through each [`StepMap`] like everything else.

use crate::mapping::{Assoc, Mapping, StepMap};
use serde::{Deserialize, Serialize};

/// A position in the text buffer (line and column).
///
/// Both line and column are 0-indexed. Only used for display; the buffer
/// itself works in character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// Line number (0-indexed)
    pub line: usize,
    /// Column number (0-indexed, in characters not bytes)
    pub column: usize,
}

impl Position {
    /// Creates a new position.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Position at the start of the document.
    pub const ZERO: Position = Position { line: 0, column: 0 };
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display as 1-indexed for user-facing output
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// A selection of text in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Selection {
    /// Where the selection started
    pub anchor: usize,
    /// Where the cursor currently is
    pub head: usize,
}

/// Represents the direction of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionDirection {
    /// Selection extends forward (cursor at end)
    Forward,
    /// Selection extends backward (cursor at start)
    Backward,
}

impl Selection {
    /// Creates a selection from anchor to head.
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    /// Creates a zero-width selection (cursor position).
    pub fn cursor(pos: usize) -> Self {
        Self {
            anchor: pos,
            head: pos,
        }
    }

    /// Returns the smaller end.
    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    /// Returns the larger end.
    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    /// Returns true if this is a zero-width selection (just a cursor).
    pub fn is_cursor(&self) -> bool {
        self.anchor == self.head
    }

    /// Returns the direction of the selection.
    pub fn direction(&self) -> SelectionDirection {
        if self.head >= self.anchor {
            SelectionDirection::Forward
        } else {
            SelectionDirection::Backward
        }
    }

    /// Returns a copy with both ends clamped to `len`.
    pub fn clamp(&self, len: usize) -> Self {
        Self {
            anchor: self.anchor.min(len),
            head: self.head.min(len),
        }
    }

    /// Maps both ends through one edit.
    ///
    /// Typing at the cursor pushes it forward, so both ends stick after
    /// inserted content.
    pub fn map(&self, step: &StepMap) -> Self {
        self.map_with(step, Assoc::After)
    }

    /// Maps both ends through one edit with an explicit side.
    pub fn map_with(&self, step: &StepMap, assoc: Assoc) -> Self {
        Self {
            anchor: step.map(self.anchor, assoc),
            head: step.map(self.head, assoc),
        }
    }

    /// Maps both ends through a series of edits.
    pub fn map_through(&self, mapping: &Mapping, assoc: Assoc) -> Self {
        Self {
            anchor: mapping.map(self.anchor, assoc),
            head: mapping.map(self.head, assoc),
        }
    }
}
