//! Core text buffer implementation using rope data structure.
//!
//! ## Why Rope?
//!
//! Traditional text editors use gap buffers or arrays, but ropes excel at:
//! - **Large files**: O(log n) insertions/deletions vs O(n) for arrays
//! - **Undo/Redo**: Efficient snapshots without full copies
//! - **Concurrent access**: Immutable chunks can be shared
//!
//! ## The Step Log
//!
//! Besides the text, the buffer keeps a bounded log of the position maps
//! of recent transactions, keyed by [`Version`]. Anyone holding an offset
//! from an older version can ask [`TextBuffer::mapping_since`] how to
//! translate it. When the log no longer reaches back that far, the answer
//! is `None` and the old offset can't be trusted anymore.

use ropey::Rope;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::ops::Range;
use std::path::Path;

use crate::history::{Edit, History};
use crate::mapping::{Mapping, StepMap};
use crate::mark::{Mark, MarkSet};
use crate::selection::{Position, Selection};
use crate::transaction::{Recording, Step, Transaction, Version};
use crate::{BufferError, BufferResult};

/// A rope-backed document with marks, selection, history and a step log.
///
/// # Thread Safety
///
/// `TextBuffer` is `Send` but not `Sync` - it can be moved between threads
/// but shouldn't be accessed from multiple threads simultaneously.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    /// The rope holding our text content
    rope: Rope,

    /// Marked spans (kept in sync with every edit)
    marks: MarkSet,

    /// Current selection
    selection: Selection,

    /// Edit history for undo/redo
    history: History,

    /// Current version
    version: Version,

    /// Position maps of recent transactions
    step_log: VecDeque<LogEntry>,

    /// Oldest version `mapping_since` can still answer for
    log_floor: Version,

    /// Whether the buffer changed since creation
    modified: bool,

    /// Buffer-specific settings
    config: BufferConfig,
}

#[derive(Debug, Clone)]
struct LogEntry {
    version: Version,
    maps: Vec<StepMap>,
}

/// Configuration for buffer behavior
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Maximum history entries to keep
    pub max_history: usize,

    /// Maximum number of transactions kept in the step log
    pub step_log_limit: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_history: 1000,
            step_log_limit: 10_000,
        }
    }
}

impl TextBuffer {
    /// Creates a new empty buffer.
    ///
    /// # Example
    /// ```
    /// use inkling_buffer::TextBuffer;
    ///
    /// let buffer = TextBuffer::new();
    /// assert!(buffer.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    /// Creates a buffer with custom configuration.
    pub fn with_config(config: BufferConfig) -> Self {
        Self {
            rope: Rope::new(),
            marks: MarkSet::new(),
            selection: Selection::default(),
            history: History::new(config.max_history),
            version: Version::INITIAL,
            step_log: VecDeque::new(),
            log_floor: Version::INITIAL,
            modified: false,
            config,
        }
    }

    /// Creates a buffer holding `text` with custom configuration.
    pub fn from_text(text: &str, config: BufferConfig) -> Self {
        let mut buffer = Self::with_config(config);
        buffer.rope = Rope::from_str(text);
        buffer
    }

    /// Loads a buffer from a file.
    ///
    /// The buffer keeps no link to the file; nothing is ever written back.
    pub fn from_file(path: impl AsRef<Path>, config: BufferConfig) -> BufferResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::from_text(&content, config))
    }

    // ==================== Text Access ====================

    /// Returns the entire text content as a `Cow<str>`.
    #[inline]
    pub fn text(&self) -> Cow<'_, str> {
        self.rope.slice(..).into()
    }

    /// Returns a slice of text by character range.
    pub fn slice(&self, range: Range<usize>) -> BufferResult<Cow<'_, str>> {
        self.check_range(&range, self.len_chars())?;
        Ok(self.rope.slice(range).into())
    }

    /// Returns up to `max_chars` characters ending at `end`.
    pub fn text_before(&self, end: usize, max_chars: usize) -> BufferResult<String> {
        let start = end.saturating_sub(max_chars);
        Ok(self.slice(start..end)?.into_owned())
    }

    // ==================== Measurements ====================

    /// Returns true if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Returns the number of characters in the buffer.
    #[inline]
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// Returns the number of lines in the buffer.
    #[inline]
    pub fn len_lines(&self) -> usize {
        self.rope.len_lines()
    }

    /// Converts a character index to a Position (line, column).
    pub fn char_idx_to_position(&self, char_idx: usize) -> BufferResult<Position> {
        if char_idx > self.len_chars() {
            return Err(BufferError::InvalidCharIndex(char_idx));
        }

        let line = self.rope.char_to_line(char_idx);
        let line_start = self.rope.line_to_char(line);
        Ok(Position::new(line, char_idx - line_start))
    }

    // ==================== State Queries ====================

    /// Returns the current document version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the current selection.
    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Returns the marked spans.
    pub fn marks(&self) -> &MarkSet {
        &self.marks
    }

    /// Returns true if the buffer changed since it was created.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Returns the buffer's configuration.
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Returns true if there are edits to undo.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Returns true if there are edits to redo.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Returns the composed position maps of every transaction applied
    /// after `version`.
    ///
    /// Returns `None` when `version` is older than the step log reaches
    /// (or newer than the document), i.e. when offsets from that version
    /// can no longer be translated reliably.
    pub fn mapping_since(&self, version: Version) -> Option<Mapping> {
        if version < self.log_floor || version > self.version {
            return None;
        }

        let mut mapping = Mapping::new();
        for entry in self.step_log.iter().filter(|e| e.version > version) {
            for map in &entry.maps {
                mapping.push(*map);
            }
        }
        Some(mapping)
    }

    // ==================== Transactions ====================

    /// Applies a transaction atomically.
    ///
    /// Every step is validated against the document as left by the
    /// previous steps before anything is changed. Text edits are
    /// recorded in the undo history, unless the transaction is
    /// [`reverting`](Transaction::reverting) an earlier one; marks and the
    /// selection are carried through each edit.
    pub fn apply(&mut self, tx: Transaction) -> BufferResult<Version> {
        let (steps, selection, recording) = tx.into_parts();
        let (edits, maps) = self.apply_steps(steps, selection)?;
        let version = self.commit(maps);
        match recording {
            Recording::Undoable { coalesce } => self.history.push(edits, coalesce, version),
            Recording::TakeBack(reverted) => {
                self.history.forget(reverted);
            }
        }
        Ok(version)
    }

    /// Replaces the whole content.
    ///
    /// Clears marks and history, and resets the step log so that no offset
    /// from before the replacement can be mapped.
    pub fn set_text(&mut self, text: &str) -> Version {
        self.rope = Rope::from_str(text);
        self.marks.clear();
        self.history.clear();
        self.selection = self.selection.clamp(self.len_chars());
        self.step_log.clear();
        self.modified = true;
        self.version = self.version.next();
        self.log_floor = self.version;
        self.version
    }

    // ==================== Mutations ====================

    /// Inserts text at a character index.
    ///
    /// # Learning: `&mut self`
    ///
    /// This method requires exclusive (mutable) access to the buffer.
    /// Rust's borrow checker ensures no other code can read or write
    /// the buffer while this method executes.
    pub fn insert(&mut self, char_idx: usize, text: &str) -> BufferResult<Version> {
        self.apply(Transaction::new().insert(char_idx, text).coalescing())
    }

    /// Deletes text in a character range.
    pub fn delete(&mut self, range: Range<usize>) -> BufferResult<Version> {
        self.apply(Transaction::new().delete(range).coalescing())
    }

    /// Replaces text in a range with new text, as one undo step.
    pub fn replace(&mut self, range: Range<usize>, text: &str) -> BufferResult<Version> {
        let start = range.start;
        self.apply(Transaction::new().delete(range).insert(start, text))
    }

    /// Types text at the cursor, replacing the selection if there is one.
    pub fn insert_at_cursor(&mut self, text: &str) -> BufferResult<Version> {
        let sel = self.selection;
        if sel.is_cursor() {
            self.insert(sel.head, text)
        } else {
            self.replace(sel.from()..sel.to(), text)
        }
    }

    /// Deletes the selection or the character before the cursor.
    pub fn delete_backward(&mut self) -> BufferResult<Option<Version>> {
        let sel = self.selection;
        if !sel.is_cursor() {
            return self.delete(sel.from()..sel.to()).map(Some);
        }
        if sel.head == 0 {
            return Ok(None);
        }
        self.delete(sel.head - 1..sel.head).map(Some)
    }

    /// Moves the selection without changing text.
    pub fn set_selection(&mut self, selection: Selection) -> BufferResult<()> {
        if selection.to() > self.len_chars() {
            return Err(BufferError::InvalidCharIndex(selection.to()));
        }
        self.selection = selection;
        Ok(())
    }

    /// Collapses the selection to a cursor at the end of the document.
    pub fn move_to_end(&mut self) {
        self.selection = Selection::cursor(self.len_chars());
    }

    // ==================== Undo/Redo ====================

    /// Undoes the last transaction.
    ///
    /// # Learning: State Management
    ///
    /// Each transaction's edits are stored as a group. Undo pops the group
    /// and applies the inverse edits in reverse order; redo re-applies
    /// them. Neither is recorded as a new history entry, but both go
    /// through the step log like any other change.
    pub fn undo(&mut self) -> BufferResult<Version> {
        let group = self.history.undo().ok_or(BufferError::NothingToUndo)?;
        let (_, maps) = self.apply_steps(group.inverse_steps(), None)?;
        Ok(self.commit(maps))
    }

    /// Redoes the last undone transaction.
    pub fn redo(&mut self) -> BufferResult<Version> {
        let group = self.history.redo().ok_or(BufferError::NothingToRedo)?;
        let (_, maps) = self.apply_steps(group.steps(), None)?;
        Ok(self.commit(maps))
    }

    // ==================== Internals ====================

    fn check_range(&self, range: &Range<usize>, len: usize) -> BufferResult<()> {
        if range.start > range.end {
            return Err(BufferError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        if range.end > len {
            return Err(BufferError::InvalidCharIndex(range.end));
        }
        Ok(())
    }

    /// Checks every step against the length the document will have when
    /// that step runs.
    fn validate(&self, steps: &[Step], selection: Option<Selection>) -> BufferResult<()> {
        let mut len = self.len_chars();
        for step in steps {
            match step {
                Step::Insert { pos, text } => {
                    if *pos > len {
                        return Err(BufferError::InvalidCharIndex(*pos));
                    }
                    len += text.chars().count();
                }
                Step::Delete { range } => {
                    self.check_range(range, len)?;
                    len -= range.len();
                }
                Step::AddMark { range, .. } | Step::RemoveMark { range, .. } => {
                    self.check_range(range, len)?;
                }
            }
        }
        if let Some(sel) = selection {
            if sel.to() > len {
                return Err(BufferError::InvalidCharIndex(sel.to()));
            }
        }
        Ok(())
    }

    fn apply_steps(
        &mut self,
        steps: Vec<Step>,
        selection: Option<Selection>,
    ) -> BufferResult<(Vec<Edit>, Vec<StepMap>)> {
        self.validate(&steps, selection)?;

        let mut edits = Vec::new();
        let mut maps = Vec::new();

        for step in steps {
            match step {
                Step::Insert { pos, text } => {
                    if text.is_empty() {
                        continue;
                    }
                    let map = StepMap::insertion(pos, text.chars().count());
                    self.rope.insert(pos, &text);
                    self.carry(&map);
                    maps.push(map);
                    edits.push(Edit::insert(pos, text));
                }
                Step::Delete { range } => {
                    if range.is_empty() {
                        continue;
                    }
                    let content: String = self.rope.slice(range.clone()).into();
                    let map = StepMap::deletion(range.start, range.len());
                    self.rope.remove(range.clone());
                    self.carry(&map);
                    maps.push(map);
                    edits.push(Edit::delete(range.start, content));
                }
                Step::AddMark { range, mark } => {
                    self.marks.add(range, mark);
                }
                Step::RemoveMark { range, mark } => {
                    self.marks.remove(range, mark);
                }
            }
        }

        if let Some(sel) = selection {
            self.selection = sel;
        }
        if !edits.is_empty() {
            self.modified = true;
        }

        Ok((edits, maps))
    }

    /// Carries marks and selection through one edit.
    fn carry(&mut self, map: &StepMap) {
        self.marks.map(map);
        self.selection = self.selection.map(map);
    }

    fn commit(&mut self, maps: Vec<StepMap>) -> Version {
        self.version = self.version.next();
        self.step_log.push_back(LogEntry {
            version: self.version,
            maps,
        });

        while self.step_log.len() > self.config.step_log_limit {
            if let Some(dropped) = self.step_log.pop_front() {
                self.log_floor = dropped.version;
            }
        }

        self.version
    }

    /// Returns true if any part of `range` carries `mark`.
    pub fn has_mark(&self, range: Range<usize>, mark: Mark) -> bool {
        self.marks.intersects(range, mark)
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TextBuffer {
    fn from(s: &str) -> Self {
        Self::from_text(s, BufferConfig::default())
    }
}

impl From<String> for TextBuffer {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}
