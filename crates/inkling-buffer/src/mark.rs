//! Inline marks over text spans.
//!
//! Marks are attributes attached to a character range rather than to the
//! characters themselves, so every edit has to carry them along. The buffer
//! maps each span through every [`StepMap`] it applies.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::mapping::StepMap;

/// An attribute that can cover a span of text.
///
/// Only one kind exists: text that was proposed by an assistant and has
/// not yet been confirmed by the author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    /// Unconfirmed, machine-written text.
    Provisional,
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mark::Provisional => write!(f, "provisional"),
        }
    }
}

/// A mark applied over a character range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSpan {
    pub range: Range<usize>,
    pub mark: Mark,
}

/// The set of marked spans in a document.
///
/// Spans of the same mark never overlap or touch; adding a mark over an
/// adjacent or overlapping span merges them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkSet {
    spans: Vec<MarkSpan>,
}

impl MarkSet {
    /// Creates an empty mark set.
    pub fn new() -> Self {
        Self { spans: Vec::new() }
    }

    /// Returns every span, ordered by start.
    pub fn spans(&self) -> &[MarkSpan] {
        &self.spans
    }

    /// Returns true if no text is marked.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Returns the spans carrying `mark`.
    pub fn spans_of(&self, mark: Mark) -> impl Iterator<Item = &MarkSpan> {
        self.spans.iter().filter(move |s| s.mark == mark)
    }

    /// Returns true if any part of `range` carries `mark`.
    pub fn intersects(&self, range: Range<usize>, mark: Mark) -> bool {
        self.spans_of(mark)
            .any(|s| s.range.start < range.end && range.start < s.range.end)
    }

    /// Returns true if every character of `range` carries `mark`.
    pub fn covers(&self, range: Range<usize>, mark: Mark) -> bool {
        self.spans_of(mark)
            .any(|s| s.range.start <= range.start && range.end <= s.range.end)
    }

    /// Adds `mark` over `range`.
    ///
    /// Returns the sub-ranges that were not marked before (what an undo
    /// must remove again).
    pub fn add(&mut self, range: Range<usize>, mark: Mark) -> Vec<Range<usize>> {
        if range.is_empty() {
            return Vec::new();
        }

        // Work out which parts were previously unmarked
        let mut fresh = Vec::new();
        let mut cursor = range.start;
        for span in self.spans_of(mark) {
            if span.range.end <= cursor || span.range.start >= range.end {
                continue;
            }
            if span.range.start > cursor {
                fresh.push(cursor..span.range.start);
            }
            cursor = cursor.max(span.range.end);
        }
        if cursor < range.end {
            fresh.push(cursor..range.end);
        }

        // Merge everything overlapping or touching into one span
        let mut merged = range;
        self.spans.retain(|s| {
            let touches = s.mark == mark
                && s.range.start <= merged.end
                && merged.start <= s.range.end;
            if touches {
                merged = merged.start.min(s.range.start)..merged.end.max(s.range.end);
            }
            !touches
        });
        self.spans.push(MarkSpan {
            range: merged,
            mark,
        });
        self.sort();

        fresh
    }

    /// Removes `mark` from `range`, splitting spans as needed.
    ///
    /// Returns the sub-ranges that actually lost the mark.
    pub fn remove(&mut self, range: Range<usize>, mark: Mark) -> Vec<Range<usize>> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.spans.len());

        for span in self.spans.drain(..) {
            let overlaps = span.mark == mark
                && span.range.start < range.end
                && range.start < span.range.end;
            if !overlaps {
                kept.push(span);
                continue;
            }

            removed.push(span.range.start.max(range.start)..span.range.end.min(range.end));
            if span.range.start < range.start {
                kept.push(MarkSpan {
                    range: span.range.start..range.start,
                    mark,
                });
            }
            if range.end < span.range.end {
                kept.push(MarkSpan {
                    range: range.end..span.range.end,
                    mark,
                });
            }
        }

        self.spans = kept;
        self.sort();
        removed
    }

    /// Carries every span through one edit, dropping spans whose text was
    /// removed entirely.
    pub fn map(&mut self, step: &StepMap) {
        self.spans = self
            .spans
            .drain(..)
            .filter_map(|span| {
                step.map_span(span.range.start, span.range.end)
                    .map(|(from, to)| MarkSpan {
                        range: from..to,
                        mark: span.mark,
                    })
            })
            .collect();
    }

    /// Removes every span.
    pub fn clear(&mut self) {
        self.spans.clear();
    }

    fn sort(&mut self) {
        self.spans.sort_by_key(|s| (s.range.start, s.range.end));
    }
}
