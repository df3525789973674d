//! Undo/redo history management.
//!
//! ## Learning: The Command Pattern
//!
//! Each text edit is stored as a command that can be:
//! - Executed (applied to the buffer)
//! - Undone (reversed)
//! - Redone (re-applied after undo)
//!
//! Edits are grouped per transaction, so one undo step reverses a whole
//! transaction. Consecutive single-character typing is coalesced into one
//! group when the caller asks for it.
//!
//! Only text is recorded. Marks are transient state owned by whoever put
//! them there, and undo never resurrects them.
//!
//! A transaction can also be taken back outside of undo (see
//! [`History::forget`]). Its group leaves the stack and the groups after
//! it are rebased, so that undo walks a history in which it never
//! happened.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ops::Range;

use crate::mapping::{Assoc, StepMap};
use crate::transaction::{Step, Version};

/// The type of edit operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditKind {
    /// Text was inserted
    Insert,
    /// Text was deleted
    Delete,
}

/// A single applied text edit.
///
/// ## Learning: Clone vs Copy
///
/// `Edit` implements `Clone` but not `Copy` because it contains
/// a `String`, which owns heap memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    /// What kind of edit this is
    pub kind: EditKind,
    /// Character position where the edit occurred
    pub position: usize,
    /// The text that was inserted or deleted
    pub content: String,
}

impl Edit {
    /// Creates an insert edit.
    pub fn insert(position: usize, content: impl Into<String>) -> Self {
        Self {
            kind: EditKind::Insert,
            position,
            content: content.into(),
        }
    }

    /// Creates a delete edit.
    pub fn delete(position: usize, content: impl Into<String>) -> Self {
        Self {
            kind: EditKind::Delete,
            position,
            content: content.into(),
        }
    }

    /// Number of characters this edit touches.
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    /// Returns true if the edit carries no text.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Returns the inverse of this edit (for undo).
    pub fn inverse(&self) -> Self {
        Self {
            kind: match self.kind {
                EditKind::Insert => EditKind::Delete,
                EditKind::Delete => EditKind::Insert,
            },
            position: self.position,
            content: self.content.clone(),
        }
    }

    /// Converts the edit back into a transaction step.
    pub fn to_step(&self) -> Step {
        match self.kind {
            EditKind::Insert => Step::Insert {
                pos: self.position,
                text: self.content.clone(),
            },
            EditKind::Delete => Step::Delete {
                range: self.position..self.position + self.len(),
            },
        }
    }

    /// Returns true if this edit can be coalesced with another.
    ///
    /// Two edits can be coalesced if:
    /// - They're the same kind
    /// - They're adjacent (next character for insert, same position for delete)
    /// - Neither is a newline
    pub fn can_coalesce(&self, other: &Edit) -> bool {
        if self.kind != other.kind {
            return false;
        }

        // Don't coalesce across newlines
        if self.content.contains('\n') || other.content.contains('\n') {
            return false;
        }

        match self.kind {
            EditKind::Insert => self.position + self.len() == other.position,
            EditKind::Delete => {
                // For backspace: other position + its length == this position
                // For forward delete: same position
                other.position + other.len() == self.position || self.position == other.position
            }
        }
    }

    /// Coalesces another edit into this one.
    pub fn coalesce(&mut self, other: Edit) {
        match self.kind {
            EditKind::Insert => {
                self.content.push_str(&other.content);
            }
            EditKind::Delete => {
                if other.position < self.position {
                    // Backspace: prepend
                    self.content = other.content + &self.content;
                    self.position = other.position;
                } else {
                    // Forward delete: append
                    self.content.push_str(&other.content);
                }
            }
        }
    }
}

/// The edits of one transaction, undone and redone together.
#[derive(Debug, Clone)]
pub struct EditGroup {
    /// The edits in application order
    pub edits: Vec<Edit>,
    /// Whether a following typing edit may merge into this group
    pub coalescable: bool,
    /// The version the group's transaction committed
    pub version: Version,
}

impl EditGroup {
    /// Creates a new edit group.
    pub fn new(edits: Vec<Edit>, coalescable: bool, version: Version) -> Self {
        Self {
            edits,
            coalescable,
            version,
        }
    }

    /// Returns the last edit in the group.
    pub fn last(&self) -> Option<&Edit> {
        self.edits.last()
    }

    /// Returns the steps that reverse this group, in application order.
    pub fn inverse_steps(&self) -> Vec<Step> {
        self.edits.iter().rev().map(|e| e.inverse().to_step()).collect()
    }

    /// Returns the steps that re-apply this group.
    pub fn steps(&self) -> Vec<Step> {
        self.edits.iter().map(Edit::to_step).collect()
    }
}

/// Manages undo/redo history.
///
/// ## Learning: VecDeque
///
/// We use `VecDeque` instead of `Vec` because we need efficient:
/// - Push to back (new edits)
/// - Pop from front (when at capacity)
/// - Pop from back (for undo)
#[derive(Debug, Clone)]
pub struct History {
    /// Stack of undoable edit groups
    undo_stack: VecDeque<EditGroup>,
    /// Stack of redoable edit groups
    redo_stack: Vec<EditGroup>,
    /// Maximum number of edit groups to keep
    max_size: usize,
}

impl History {
    /// Creates a new history with the given capacity.
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::with_capacity(max_size.min(1024)),
            redo_stack: Vec::new(),
            max_size,
        }
    }

    /// Records the edits of the transaction committed at `version`.
    ///
    /// Clears the redo stack (can't redo after new edit). When `coalesce`
    /// is set and both this and the previous group are a single
    /// adjacent typing edit, they merge into one undo step.
    pub fn push(&mut self, edits: Vec<Edit>, coalesce: bool, version: Version) {
        if edits.is_empty() {
            return;
        }

        // Clear redo stack - branching history not supported
        self.redo_stack.clear();

        if coalesce && edits.len() == 1 {
            if let Some(last_group) = self.undo_stack.back_mut() {
                if last_group.coalescable && last_group.edits.len() == 1 {
                    if let Some(last_edit) = last_group.edits.last_mut() {
                        if last_edit.can_coalesce(&edits[0]) {
                            if let Some(edit) = edits.into_iter().next() {
                                last_edit.coalesce(edit);
                            }
                            return;
                        }
                    }
                }
            }
        }

        self.undo_stack
            .push_back(EditGroup::new(edits, coalesce, version));

        // Enforce capacity
        while self.undo_stack.len() > self.max_size {
            self.undo_stack.pop_front();
        }
    }

    /// Pops the last group for undo and moves it to the redo stack.
    pub fn undo(&mut self) -> Option<EditGroup> {
        let mut group = self.undo_stack.pop_back()?;
        group.coalescable = false;
        self.redo_stack.push(group.clone());
        Some(group)
    }

    /// Pops the last undone group and moves it back to the undo stack.
    pub fn redo(&mut self) -> Option<EditGroup> {
        let group = self.redo_stack.pop()?;
        // Redone groups never absorb later typing
        self.undo_stack.push_back(group.clone());
        Some(group)
    }

    /// Drops the group committed at `version` as if its transaction had
    /// never been applied.
    ///
    /// Every later group is rewritten for a document without that
    /// transaction's text: edits made inside it disappear, edits around
    /// it shift. Only a group made of a single insertion can be taken back
    /// like this. For anything else, or a group that already fell off the
    /// stack, the whole history is cleared since the remaining groups
    /// would no longer line up with the document. The redo stack is
    /// always cleared.
    ///
    /// Returns true if the group was found and removed.
    pub fn forget(&mut self, version: Version) -> bool {
        self.redo_stack.clear();

        let Some(index) = self.undo_stack.iter().position(|g| g.version == version) else {
            self.undo_stack.clear();
            return false;
        };
        let mut span = match self.undo_stack[index].edits.as_slice() {
            [edit] if edit.kind == EditKind::Insert => edit.position..edit.position + edit.len(),
            _ => 0..0,
        };
        if span.is_empty() {
            self.undo_stack.clear();
            return false;
        }
        self.undo_stack.remove(index);

        for later in self.undo_stack.range_mut(index..) {
            later.edits = std::mem::take(&mut later.edits)
                .into_iter()
                .filter_map(|edit| rebase_over(edit, &mut span))
                .collect();
        }
        self.undo_stack.retain(|g| !g.edits.is_empty());
        true
    }

    /// Returns true if there are edits to undo.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Returns true if there are edits to redo.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Clears all history.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Returns the number of undo steps available.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Returns the number of redo steps available.
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

/// Rewrites `edit`, made while `span` held text that is being taken
/// back, for a document that never had that text. Moves `span` past the
/// edit.
fn rebase_over(edit: Edit, span: &mut Range<usize>) -> Option<Edit> {
    let (start, end) = (span.start, span.end);
    let outside = |pos: usize| {
        if pos <= start {
            pos
        } else if pos >= end {
            pos - (end - start)
        } else {
            start
        }
    };

    let (map, rebased) = match edit.kind {
        EditKind::Insert => {
            let map = StepMap::insertion(edit.position, edit.len());
            let inside = edit.position > start && edit.position < end;
            let rebased = (!inside).then(|| Edit {
                position: outside(edit.position),
                ..edit
            });
            (map, rebased)
        }
        EditKind::Delete => {
            let map = StepMap::deletion(edit.position, edit.len());
            let kept: String = edit
                .content
                .chars()
                .enumerate()
                .filter(|(i, _)| !(start..end).contains(&(edit.position + i)))
                .map(|(_, ch)| ch)
                .collect();
            let rebased = (!kept.is_empty()).then(|| Edit::delete(outside(edit.position), kept));
            (map, rebased)
        }
    };

    *span = match map.map_span(start, end) {
        Some((from, to)) => from..to,
        None => {
            let at = map.map(start, Assoc::After);
            at..at
        }
    };
    rebased
}
