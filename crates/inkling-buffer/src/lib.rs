//! # Inkling Buffer
//!
//! The document engine: a rope-backed text buffer with inline marks,
//! a selection, undo/redo, and position mapping.
//!
//! ## Key Concepts for Learning Rust
//!
//! ### Ownership & Borrowing
//! - `TextBuffer` owns the rope, the marks and the history
//! - Methods like `text()` return borrowed data (`Cow<str>`)
//! - Mutations require `&mut self` (exclusive access)
//!
//! ### Transactions
//! - Every change is a [`Transaction`] that applies atomically
//! - Each transaction bumps the [`Version`] and logs its [`StepMap`]s
//! - [`TextBuffer::mapping_since`] translates offsets from older versions

mod buffer;
mod history;
mod mapping;
mod mark;
mod selection;
mod transaction;

pub use buffer::{BufferConfig, TextBuffer};
pub use history::{Edit, EditGroup, EditKind, History};
pub use mapping::{Assoc, MapResult, Mapping, StepMap};
pub use mark::{Mark, MarkSet, MarkSpan};
pub use selection::{Position, Selection, SelectionDirection};
pub use transaction::{Step, Transaction, Version};

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer operations
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("Invalid character index: {0}")]
    InvalidCharIndex(usize),

    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange { start: usize, end: usize },

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_buffer_creation() {
        let buffer = TextBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len_chars(), 0);
        assert_eq!(buffer.version(), Version::INITIAL);
    }

    #[test]
    fn test_buffer_from_string() {
        let buffer = TextBuffer::from("Hello, World!");
        assert_eq!(buffer.len_chars(), 13);
        assert_eq!(buffer.text(), "Hello, World!");
    }

    #[test]
    fn test_insert_and_delete() {
        let mut buffer = TextBuffer::new();
        buffer.insert(0, "Hello").unwrap();
        assert_eq!(buffer.text(), "Hello");

        buffer.insert(5, ", World!").unwrap();
        assert_eq!(buffer.text(), "Hello, World!");

        buffer.delete(5..7).unwrap();
        assert_eq!(buffer.text(), "HelloWorld!");
    }

    #[test]
    fn test_undo_redo() {
        let mut buffer = TextBuffer::new();
        buffer.insert(0, "Hello").unwrap();
        buffer
            .apply(Transaction::new().insert(5, " World"))
            .unwrap();

        assert_eq!(buffer.text(), "Hello World");

        buffer.undo().unwrap();
        assert_eq!(buffer.text(), "Hello");

        buffer.redo().unwrap();
        assert_eq!(buffer.text(), "Hello World");
    }

    #[test]
    fn test_reverting_transaction_leaves_no_undo_step() {
        let mut buffer = TextBuffer::new();
        buffer.insert(0, "Hello").unwrap();
        let inserted = buffer
            .apply(Transaction::new().insert(5, " World"))
            .unwrap();
        buffer.insert(0, "> ").unwrap();

        buffer
            .apply(Transaction::new().delete(7..13).reverting(inserted))
            .unwrap();
        assert_eq!(buffer.text(), "> Hello");

        buffer.undo().unwrap();
        assert_eq!(buffer.text(), "Hello");
        buffer.undo().unwrap();
        assert_eq!(buffer.text(), "");
        assert!(!buffer.can_undo());
    }

    #[test]
    fn test_invalid_transaction_changes_nothing() {
        let mut buffer = TextBuffer::from("abc");
        let tx = Transaction::new().insert(1, "x").delete(2..10);

        assert!(matches!(
            buffer.apply(tx),
            Err(BufferError::InvalidCharIndex(10))
        ));
        assert_eq!(buffer.text(), "abc");
        assert_eq!(buffer.version(), Version::INITIAL);
    }

    #[test]
    fn test_marks_follow_edits() {
        let mut buffer = TextBuffer::from("one two");
        buffer
            .apply(Transaction::new().add_mark(4..7, Mark::Provisional))
            .unwrap();

        buffer.insert(0, ">> ").unwrap();
        assert!(buffer.marks().covers(7..10, Mark::Provisional));

        // Typing right after the span stays unmarked
        buffer.insert(10, "!").unwrap();
        assert!(!buffer.has_mark(10..11, Mark::Provisional));
    }

    #[test]
    fn test_undo_does_not_restore_marks() {
        let mut buffer = TextBuffer::new();
        buffer
            .apply(
                Transaction::new()
                    .insert(0, "draft")
                    .add_mark(0..5, Mark::Provisional),
            )
            .unwrap();
        buffer.undo().unwrap();
        assert!(buffer.marks().is_empty());

        buffer.redo().unwrap();
        assert_eq!(buffer.text(), "draft");
        assert!(buffer.marks().is_empty());
    }

    #[test]
    fn test_mapping_since() {
        let mut buffer = TextBuffer::from("hello");
        let v0 = buffer.version();
        buffer.insert(0, "> ").unwrap();
        buffer.delete(6..7).unwrap();

        let mapping = buffer.mapping_since(v0).unwrap();
        assert_eq!(mapping.map(5, Assoc::Before), 6);
        assert!(buffer.mapping_since(buffer.version()).unwrap().is_empty());
    }

    #[test]
    fn test_step_log_is_bounded() {
        let config = BufferConfig {
            step_log_limit: 2,
            ..BufferConfig::default()
        };
        let mut buffer = TextBuffer::with_config(config);
        let v0 = buffer.version();
        for i in 0..3 {
            buffer.insert(i, "x").unwrap();
        }
        assert!(buffer.mapping_since(v0).is_none());
        assert!(buffer.mapping_since(v0.next()).is_some());
    }

    #[test]
    fn test_set_text_resets_mapping_floor() {
        let mut buffer = TextBuffer::from("before");
        let v0 = buffer.version();
        buffer.set_text("after");
        assert!(buffer.mapping_since(v0).is_none());
        assert!(!buffer.can_undo());
    }

    #[test]
    fn test_cursor_typing_and_backspace() {
        let mut buffer = TextBuffer::from("ac");
        buffer.set_selection(Selection::cursor(1)).unwrap();
        buffer.insert_at_cursor("b").unwrap();
        assert_eq!(buffer.text(), "abc");
        assert_eq!(buffer.selection(), Selection::cursor(2));

        buffer.delete_backward().unwrap();
        assert_eq!(buffer.text(), "ac");
        assert_eq!(buffer.selection(), Selection::cursor(1));

        buffer.move_to_end();
        assert_eq!(buffer.selection(), Selection::cursor(2));
    }

    #[test]
    fn test_position_conversion() {
        let buffer = TextBuffer::from("Line 1\nLine 2");
        assert_eq!(buffer.char_idx_to_position(8).unwrap(), Position::new(1, 1));
        assert!(buffer.char_idx_to_position(99).is_err());
    }

    fn edit_strategy() -> impl Strategy<Value = (bool, usize, usize, String)> {
        (any::<bool>(), 0usize..64, 0usize..8, "[a-z ]{0,6}")
    }

    proptest! {
        #[test]
        fn prop_undo_restores_text(
            initial in "[a-z \n]{0,40}",
            edits in prop::collection::vec(edit_strategy(), 1..12),
        ) {
            let mut buffer = TextBuffer::from(initial.as_str());
            let mut applied = 0;

            for (is_insert, pos, len, text) in edits {
                let total = buffer.len_chars();
                let pos = pos % (total + 1);
                let end = (pos + len).min(total);
                // Empty edits leave no undo step
                if (is_insert && text.is_empty()) || (!is_insert && end == pos) {
                    continue;
                }
                let tx = if is_insert {
                    Transaction::new().insert(pos, text)
                } else {
                    Transaction::new().delete(pos..end)
                };
                buffer.apply(tx).unwrap();
                applied += 1;
            }

            for _ in 0..applied {
                buffer.undo().unwrap();
            }
            prop_assert_eq!(buffer.text(), initial.as_str());
        }

        #[test]
        fn prop_marks_match_mapped_span(
            initial in "[a-z]{4,30}",
            pos in 0usize..40,
            len in 0usize..6,
            text in "[A-Z]{0,4}",
        ) {
            let mut buffer = TextBuffer::from(initial.as_str());
            let total = buffer.len_chars();
            let (from, to) = (1, total - 1);
            buffer.apply(Transaction::new().add_mark(from..to, Mark::Provisional)).unwrap();
            let v = buffer.version();

            let pos = pos % (total + 1);
            buffer
                .apply(Transaction::new().delete(pos..(pos + len).min(total)).insert(pos, text))
                .unwrap();

            let mapped = buffer.mapping_since(v).unwrap().map_span(from, to);
            let spans: Vec<_> = buffer
                .marks()
                .spans_of(Mark::Provisional)
                .map(|s| (s.range.start, s.range.end))
                .collect();
            match mapped {
                Some(span) => prop_assert_eq!(spans, vec![span]),
                None => prop_assert!(spans.is_empty()),
            }
        }
    }
}
