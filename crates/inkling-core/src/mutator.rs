//! Inserting, confirming and removing suggestions.
//!
//! ## Learning: A Reversible Command Record
//!
//! Undoing a suggestion through the host's undo stack would also undo
//! whatever the user typed after it. Instead, [`DocumentMutator::insert`]
//! hands back a [`PendingRange`] that remembers exactly what it did: the
//! version right after the insertion, the span it created and the
//! selection before it. [`DocumentMutator::revert`] maps that span through
//! every later edit and deletes what it finds there, leaving edits outside
//! the span alone.
//!
//! The removal takes the insertion back out of the undo history as well,
//! so undo after a discard never brings the suggestion back. An accepted
//! suggestion keeps its undo step like any other edit.
//!
//! ```text
//! before:   The cat sat.|
//! insert:   The cat sat.[ It purred.]      <- provisional mark
//! typing:   Once, the cat sat.[ It purred.]
//! revert:   Once, the cat sat.|
//! ```

use inkling_buffer::{Assoc, BufferError, Mapping, Mark, Selection, StepMap, Transaction, Version};
use std::ops::Range;

use crate::document::DocumentHost;

/// The span an inserted suggestion currently occupies.
///
/// `from..to` is kept current by the
/// [`PendingRangeTracker`](crate::PendingRangeTracker); the revert record
/// stays as captured at insertion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRange {
    pub(crate) from: usize,
    pub(crate) to: usize,
    record: RevertRecord,
}

/// Everything needed to invert one insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RevertRecord {
    inserted_at: Version,
    from: usize,
    to: usize,
    selection_before: Selection,
}

impl PendingRange {
    /// Start of the span.
    pub fn from(&self) -> usize {
        self.from
    }

    /// End of the span (exclusive).
    pub fn to(&self) -> usize {
        self.to
    }

    /// Where the suggestion starts.
    pub fn insert_position(&self) -> usize {
        self.from
    }

    /// Length of the span in characters.
    pub fn len(&self) -> usize {
        self.to - self.from
    }

    /// Returns true if the span holds no characters.
    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    /// The span as a range.
    pub fn range(&self) -> Range<usize> {
        self.from..self.to
    }

    /// The document version produced by the insertion.
    pub fn inserted_at(&self) -> Version {
        self.record.inserted_at
    }
}

impl std::fmt::Display for PendingRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.from, self.to)
    }
}

/// Errors raised while changing the document on the coordinator's behalf.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutatorError {
    #[error("Cannot insert at {position}: the document has {len} characters")]
    InvalidPosition { position: usize, len: usize },

    #[error("Nothing to insert")]
    EmptyText,

    #[error("The suggestion can no longer be removed exactly: {0}")]
    RevertUnavailable(String),

    #[error("The document rejected the change: {0}")]
    Engine(String),
}

impl From<BufferError> for MutatorError {
    fn from(err: BufferError) -> Self {
        MutatorError::Engine(err.to_string())
    }
}

/// Applies the coordinator's changes to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMutator {
    separator: String,
}

impl DocumentMutator {
    /// Creates a mutator that puts `separator` before each suggestion.
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    /// Returns the separator.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Inserts `separator + text` at `position` and marks it provisional.
    ///
    /// The returned range covers the separator too, so that reverting
    /// removes everything the insertion added.
    pub fn insert<D: DocumentHost + ?Sized>(
        &self,
        doc: &mut D,
        text: &str,
        position: usize,
    ) -> Result<PendingRange, MutatorError> {
        let len = doc.len_chars();
        if position > len {
            return Err(MutatorError::InvalidPosition { position, len });
        }
        if text.is_empty() {
            return Err(MutatorError::EmptyText);
        }

        let content = format!("{}{}", self.separator, text);
        let to = position + content.chars().count();
        let selection_before = doc.selection();

        let inserted_at = doc.apply(
            Transaction::new()
                .insert(position, content)
                .add_mark(position..to, Mark::Provisional),
        )?;

        tracing::debug!(from = position, to, %inserted_at, "Inserted suggestion");

        Ok(PendingRange {
            from: position,
            to,
            record: RevertRecord {
                inserted_at,
                from: position,
                to,
                selection_before,
            },
        })
    }

    /// Removes the provisional mark from `range`, keeping the text.
    ///
    /// Returns false if there was no mark to remove. Calling it twice is
    /// harmless.
    pub fn finalize<D: DocumentHost + ?Sized>(
        &self,
        doc: &mut D,
        range: &PendingRange,
    ) -> Result<bool, MutatorError> {
        if !doc.has_mark(range.range(), Mark::Provisional) {
            return Ok(false);
        }
        doc.apply(Transaction::new().remove_mark(range.range(), Mark::Provisional))?;
        tracing::debug!(%range, "Finalized suggestion");
        Ok(true)
    }

    /// Removes the inserted suggestion and restores the selection.
    ///
    /// Fails with [`MutatorError::RevertUnavailable`] when the document
    /// can no longer say where the inserted text went: the edit log no
    /// longer reaches the insertion, the content was replaced wholesale,
    /// or the result disagrees with the tracked range.
    pub fn revert<D: DocumentHost + ?Sized>(
        &self,
        doc: &mut D,
        range: &PendingRange,
    ) -> Result<(), MutatorError> {
        let record = range.record;
        let since = doc.mapping_since(record.inserted_at).ok_or_else(|| {
            MutatorError::RevertUnavailable(format!(
                "the edit log no longer reaches {}",
                record.inserted_at
            ))
        })?;

        let (from, to) = since.map_span(record.from, record.to).ok_or_else(|| {
            MutatorError::RevertUnavailable("the inserted text no longer exists".to_string())
        })?;

        if (from, to) != (range.from, range.to) {
            return Err(MutatorError::RevertUnavailable(format!(
                "the edit log places the suggestion at {}..{}, expected {}",
                from, to, range
            )));
        }

        // The selection as it would be had the insertion never happened:
        // through the insertion, every later edit, then the removal.
        let mut restore = Mapping::new();
        restore.push(StepMap::insertion(record.from, record.to - record.from));
        restore.extend(&since);
        restore.push(StepMap::deletion(from, to - from));
        let selection = record
            .selection_before
            .map_through(&restore, Assoc::Before);

        doc.apply(
            Transaction::new()
                .delete(from..to)
                .select(selection)
                .reverting(record.inserted_at),
        )?;
        tracing::debug!(from, to, "Reverted suggestion");
        Ok(())
    }
}

impl Default for DocumentMutator {
    fn default() -> Self {
        Self::new(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkling_buffer::{BufferConfig, TextBuffer};

    #[test]
    fn test_insert_marks_span_with_separator() {
        let mut doc = TextBuffer::new();
        let range = DocumentMutator::default()
            .insert(&mut doc, "Hello world.", 0)
            .unwrap();

        assert_eq!(doc.text(), " Hello world.");
        assert_eq!((range.from(), range.to()), (0, 13));
        assert!(doc.marks().covers(0..13, Mark::Provisional));
    }

    #[test]
    fn test_insert_out_of_bounds() {
        let mut doc = TextBuffer::from("abc");
        assert_eq!(
            DocumentMutator::default().insert(&mut doc, "x", 4),
            Err(MutatorError::InvalidPosition { position: 4, len: 3 })
        );
        assert_eq!(doc.text(), "abc");
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut doc = TextBuffer::from("Start.");
        let mutator = DocumentMutator::default();
        let range = mutator.insert(&mut doc, "More.", 6).unwrap();

        assert!(mutator.finalize(&mut doc, &range).unwrap());
        let version = doc.version();
        assert!(!mutator.finalize(&mut doc, &range).unwrap());

        assert_eq!(doc.text(), "Start. More.");
        assert!(doc.marks().is_empty());
        assert_eq!(doc.version(), version);
    }

    #[test]
    fn test_revert_restores_text_and_selection() {
        let mut doc = TextBuffer::from("Start.");
        doc.set_selection(Selection::cursor(6)).unwrap();
        let mutator = DocumentMutator::default();
        let range = mutator.insert(&mut doc, "More.", 6).unwrap();

        mutator.revert(&mut doc, &range).unwrap();
        assert_eq!(doc.text(), "Start.");
        assert_eq!(doc.selection(), Selection::cursor(6));
        assert!(doc.marks().is_empty());
    }

    #[test]
    fn test_revert_keeps_edits_outside_span() {
        let mut doc = TextBuffer::from("cat sat.");
        doc.set_selection(Selection::cursor(8)).unwrap();
        let mutator = DocumentMutator::default();
        let mut range = mutator.insert(&mut doc, "It purred.", 8).unwrap();

        doc.insert(0, "The ").unwrap();
        range.from += 4;
        range.to += 4;

        mutator.revert(&mut doc, &range).unwrap();
        assert_eq!(doc.text(), "The cat sat.");
        assert_eq!(doc.selection(), Selection::cursor(12));
    }

    #[test]
    fn test_revert_unavailable_when_log_is_gone() {
        let config = BufferConfig {
            step_log_limit: 1,
            ..BufferConfig::default()
        };
        let mut doc = TextBuffer::from_text("abc", config);
        let mutator = DocumentMutator::default();
        let range = mutator.insert(&mut doc, "def", 3).unwrap();

        doc.insert(0, ">").unwrap();
        doc.insert(0, ">").unwrap();

        assert!(matches!(
            mutator.revert(&mut doc, &range),
            Err(MutatorError::RevertUnavailable(_))
        ));
    }

    #[test]
    fn test_revert_rejects_disagreeing_range() {
        let mut doc = TextBuffer::from("abc");
        let mutator = DocumentMutator::default();
        let mut range = mutator.insert(&mut doc, "def", 3).unwrap();
        range.to -= 1;

        assert!(matches!(
            mutator.revert(&mut doc, &range),
            Err(MutatorError::RevertUnavailable(_))
        ));
        assert_eq!(doc.text(), "abc def");
    }
}
