//! Keeping stored offsets in step with the document.
//!
//! The tracker holds at most one thing:
//!
//! - an **anchor** while a generation is in flight or has failed, so the
//!   result (or a retry) lands where the user asked for it even if they
//!   kept typing in the meantime
//! - the **pending range** while a suggestion is under review
//!
//! Both are stored together with the document version they are valid
//! for. [`PendingRangeTracker::sync`] brings them up to the current
//! version through [`DocumentHost::mapping_since`].

use inkling_buffer::{Assoc, Version};

use crate::document::DocumentHost;
use crate::mutator::PendingRange;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Tracked {
    #[default]
    Nothing,
    Anchor {
        pos: usize,
        version: Version,
    },
    Range {
        range: PendingRange,
        version: Version,
    },
}

/// What a [`PendingRangeTracker::sync`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// The tracked offsets are unaffected
    Unchanged,
    /// The tracked offsets moved to follow edits
    Moved,
    /// Every character of the tracked range was deleted; tracking stopped
    RangeLost,
    /// The document can't map from the tracked version any more
    Untrackable,
}

/// Tracks the generation anchor or the pending suggestion span.
#[derive(Debug, Clone, Default)]
pub struct PendingRangeTracker {
    tracked: Tracked,
}

impl PendingRangeTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking an anchor position.
    pub fn anchor_at(&mut self, pos: usize, version: Version) {
        self.tracked = Tracked::Anchor { pos, version };
    }

    /// Starts tracking a pending range, replacing any anchor.
    pub fn track(&mut self, range: PendingRange, version: Version) {
        self.tracked = Tracked::Range { range, version };
    }

    /// Stops tracking anything.
    pub fn clear(&mut self) {
        self.tracked = Tracked::Nothing;
    }

    /// Stops tracking and hands back the pending range, if any.
    pub fn take(&mut self) -> Option<PendingRange> {
        match std::mem::take(&mut self.tracked) {
            Tracked::Range { range, .. } => Some(range),
            other => {
                self.tracked = other;
                None
            }
        }
    }

    /// Returns the tracked anchor, if any.
    pub fn anchor(&self) -> Option<usize> {
        match self.tracked {
            Tracked::Anchor { pos, .. } => Some(pos),
            _ => None,
        }
    }

    /// Returns the tracked range, if any.
    pub fn range(&self) -> Option<&PendingRange> {
        match &self.tracked {
            Tracked::Range { range, .. } => Some(range),
            _ => None,
        }
    }

    /// Returns true if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.tracked == Tracked::Nothing
    }

    /// Maps the tracked offsets through every edit since they were
    /// recorded.
    ///
    /// Anchors stick to the left of text typed exactly on them. A range
    /// excludes text inserted at either edge and includes text inserted
    /// strictly inside it.
    ///
    /// When the document can no longer map from the tracked version, an
    /// anchor is clamped to the document and kept, while a range is kept
    /// unchanged; both report [`TrackOutcome::Untrackable`].
    pub fn sync<D: DocumentHost + ?Sized>(&mut self, doc: &D) -> TrackOutcome {
        let current = doc.version();

        match &mut self.tracked {
            Tracked::Nothing => TrackOutcome::Unchanged,

            Tracked::Anchor { pos, version } => {
                if *version == current {
                    return TrackOutcome::Unchanged;
                }
                let Some(mapping) = doc.mapping_since(*version) else {
                    *pos = (*pos).min(doc.len_chars());
                    *version = current;
                    return TrackOutcome::Untrackable;
                };
                let mapped = mapping.map(*pos, Assoc::Before);
                let moved = mapped != *pos;
                *pos = mapped;
                *version = current;
                if moved {
                    TrackOutcome::Moved
                } else {
                    TrackOutcome::Unchanged
                }
            }

            Tracked::Range { range, version } => {
                if *version == current {
                    return TrackOutcome::Unchanged;
                }
                let Some(mapping) = doc.mapping_since(*version) else {
                    return TrackOutcome::Untrackable;
                };
                match mapping.map_span(range.from, range.to) {
                    Some((from, to)) => {
                        let moved = (from, to) != (range.from, range.to);
                        range.from = from;
                        range.to = to;
                        *version = current;
                        if moved {
                            TrackOutcome::Moved
                        } else {
                            TrackOutcome::Unchanged
                        }
                    }
                    None => {
                        tracing::debug!(%range, "Pending range deleted");
                        self.tracked = Tracked::Nothing;
                        TrackOutcome::RangeLost
                    }
                }
            }
        }
    }
}
