//! Transactions: atomic batches of document changes.
//!
//! Every change to a [`TextBuffer`](crate::TextBuffer) goes through a
//! transaction. A transaction either applies completely or not at all,
//! bumps the document [`Version`] exactly once, and leaves one
//! [`StepMap`](crate::StepMap) per text step in the buffer's step log.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::mark::Mark;
use crate::selection::Selection;

/// Monotonic document version, bumped by every applied transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Version(u64);

impl Version {
    /// The version of a freshly created document.
    pub const INITIAL: Version = Version(0);

    /// Returns the version that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw counter.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// One requested change.
///
/// Positions are interpreted against the document as left by the
/// previous step of the same transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Insert `text` at `pos`
    Insert { pos: usize, text: String },
    /// Remove the characters in `range`
    Delete { range: Range<usize> },
    /// Apply `mark` over `range`
    AddMark { range: Range<usize>, mark: Mark },
    /// Strip `mark` from `range`
    RemoveMark { range: Range<usize>, mark: Mark },
}

/// A batch of steps applied atomically.
///
/// ## Example
///
/// ```
/// use inkling_buffer::{Mark, TextBuffer, Transaction};
///
/// let mut buffer = TextBuffer::from("Hello");
/// let tx = Transaction::new()
///     .insert(5, " there")
///     .add_mark(5..11, Mark::Provisional);
/// buffer.apply(tx).unwrap();
///
/// assert_eq!(buffer.text(), "Hello there");
/// assert!(buffer.marks().covers(5..11, Mark::Provisional));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    steps: Vec<Step>,
    selection: Option<Selection>,
    coalesce: bool,
    reverts: Option<Version>,
}

impl Transaction {
    /// Creates an empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an insertion.
    pub fn insert(mut self, pos: usize, text: impl Into<String>) -> Self {
        self.steps.push(Step::Insert {
            pos,
            text: text.into(),
        });
        self
    }

    /// Adds a deletion.
    pub fn delete(mut self, range: Range<usize>) -> Self {
        self.steps.push(Step::Delete { range });
        self
    }

    /// Adds a mark over a range.
    pub fn add_mark(mut self, range: Range<usize>, mark: Mark) -> Self {
        self.steps.push(Step::AddMark { range, mark });
        self
    }

    /// Removes a mark from a range.
    pub fn remove_mark(mut self, range: Range<usize>, mark: Mark) -> Self {
        self.steps.push(Step::RemoveMark { range, mark });
        self
    }

    /// Adds an arbitrary step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Sets the selection the document should have afterwards.
    ///
    /// Without this, the existing selection is mapped through the steps.
    pub fn select(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Lets a single typing edit merge into the previous undo step.
    pub fn coalescing(mut self) -> Self {
        self.coalesce = true;
        self
    }

    /// Takes back the transaction committed at `version`.
    ///
    /// Nothing new goes into the undo history. Instead the earlier
    /// transaction's undo step is dropped and every undo step recorded
    /// after it is rebased onto a document that never had it, so undo
    /// can't bring the taken-back text back.
    pub fn reverting(mut self, version: Version) -> Self {
        self.reverts = Some(version);
        self
    }

    /// Returns the steps.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Returns the explicit selection, if any.
    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Returns true if the transaction may coalesce into the previous undo step.
    pub fn is_coalescing(&self) -> bool {
        self.coalesce
    }

    /// Returns the version this transaction takes back, if any.
    pub fn reverts(&self) -> Option<Version> {
        self.reverts
    }

    /// Returns true if the transaction has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Vec<Step>, Option<Selection>, Recording) {
        let recording = match self.reverts {
            Some(version) => Recording::TakeBack(version),
            None => Recording::Undoable {
                coalesce: self.coalesce,
            },
        };
        (self.steps, self.selection, recording)
    }
}

/// How an applied transaction is recorded in the undo history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recording {
    /// A new undo step, possibly merged into the previous one
    Undoable { coalesce: bool },
    /// Drops the undo step of the given version
    TakeBack(Version),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_order() {
        let tx = Transaction::new()
            .insert(0, "ab")
            .delete(0..1)
            .coalescing();

        assert_eq!(tx.steps().len(), 2);
        assert!(matches!(tx.steps()[1], Step::Delete { .. }));
        assert!(tx.is_coalescing());
    }

    #[test]
    fn test_reverting_replaces_coalescing() {
        let tx = Transaction::new()
            .delete(0..1)
            .coalescing()
            .reverting(Version::INITIAL.next());

        assert_eq!(tx.reverts(), Some(Version(1)));
        let (_, _, recording) = tx.into_parts();
        assert_eq!(recording, Recording::TakeBack(Version(1)));
    }

    #[test]
    fn test_version_ordering() {
        let v = Version::INITIAL;
        assert!(v.next() > v);
        assert_eq!(v.next().to_string(), "v1");
    }
}
