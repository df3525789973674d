//! Position mapping through edits.
//!
//! ## Learning: Why Offsets Go Stale
//!
//! An offset like `42` only means something for one version of the text.
//! Insert three characters at `10` and the content that used to live at
//! `42` now lives at `45`. Anything that remembers an offset across edits
//! (a selection, a highlighted span, a pending suggestion) has to be
//! translated through every edit in between.
//!
//! Each text edit produces a [`StepMap`]: "at `pos`, `deleted` characters
//! were replaced by `inserted` characters". A [`Mapping`] is an ordered
//! list of step maps, so translating through a whole series of edits is
//! just a fold.

use serde::{Deserialize, Serialize};

/// Which side a position sticks to when content is inserted exactly on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assoc {
    /// Stay to the left of inserted content.
    Before,
    /// Move to the right of inserted content.
    After,
}

/// Result of mapping a single position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
    /// The position in the new coordinate space.
    pub pos: usize,
    /// True if the position sat strictly inside deleted content.
    pub deleted: bool,
}

/// The positional footprint of one text edit.
///
/// A pure insertion has `deleted == 0`, a pure deletion has `inserted == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMap {
    /// Where the edit starts (in the old coordinate space)
    pub pos: usize,
    /// Number of characters removed
    pub deleted: usize,
    /// Number of characters added
    pub inserted: usize,
}

impl StepMap {
    /// Step map for inserting `len` characters at `pos`.
    pub fn insertion(pos: usize, len: usize) -> Self {
        Self {
            pos,
            deleted: 0,
            inserted: len,
        }
    }

    /// Step map for deleting `len` characters starting at `pos`.
    pub fn deletion(pos: usize, len: usize) -> Self {
        Self {
            pos,
            deleted: len,
            inserted: 0,
        }
    }

    /// Returns true if this edit changes nothing positionally.
    pub fn is_identity(&self) -> bool {
        self.deleted == 0 && self.inserted == 0
    }

    /// Maps a position, returning only the new offset.
    #[inline]
    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_result(pos, assoc).pos
    }

    /// Maps a position through this edit.
    ///
    /// Positions on the boundary of a replaced range never count as
    /// deleted: the start boundary stays at the start, the end boundary
    /// lands after the inserted content. `assoc` decides the side only
    /// for pure insertions and for positions inside the replaced range.
    pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        let start = self.pos;
        let end = self.pos + self.deleted;

        if pos < start {
            return MapResult {
                pos,
                deleted: false,
            };
        }
        if pos > end {
            return MapResult {
                pos: pos - self.deleted + self.inserted,
                deleted: false,
            };
        }

        let side = if self.deleted == 0 {
            assoc
        } else if pos == start {
            Assoc::Before
        } else if pos == end {
            Assoc::After
        } else {
            assoc
        };

        MapResult {
            pos: match side {
                Assoc::Before => start,
                Assoc::After => start + self.inserted,
            },
            deleted: pos > start && pos < end,
        }
    }

    /// Maps a non-empty span `[from, to)` through this edit.
    ///
    /// Content inserted exactly at either edge stays outside the span.
    /// Returns `None` when the span's entire content was removed or the
    /// span collapsed to nothing.
    pub fn map_span(&self, from: usize, to: usize) -> Option<(usize, usize)> {
        if self.deleted > 0 && self.pos <= from && to <= self.pos + self.deleted {
            return None;
        }

        let from = self.map(from, Assoc::After);
        let to = self.map(to, Assoc::Before);
        (from < to).then_some((from, to))
    }
}

/// An ordered series of step maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    /// Creates an empty (identity) mapping.
    pub fn new() -> Self {
        Self { maps: Vec::new() }
    }

    /// Appends a step map.
    pub fn push(&mut self, map: StepMap) {
        if !map.is_identity() {
            self.maps.push(map);
        }
    }

    /// Appends every map of another mapping.
    pub fn extend(&mut self, other: &Mapping) {
        self.maps.extend(other.maps.iter().copied());
    }

    /// Returns the individual step maps.
    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    /// Returns true if no edit is recorded.
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Maps a position through every step.
    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.maps.iter().fold(pos, |pos, map| map.map(pos, assoc))
    }

    /// Maps a position, reporting whether any step deleted it.
    pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut result = MapResult {
            pos,
            deleted: false,
        };
        for map in &self.maps {
            let step = map.map_result(result.pos, assoc);
            result = MapResult {
                pos: step.pos,
                deleted: result.deleted || step.deleted,
            };
        }
        result
    }

    /// Maps a span through every step. See [`StepMap::map_span`].
    pub fn map_span(&self, from: usize, to: usize) -> Option<(usize, usize)> {
        self.maps
            .iter()
            .try_fold((from, to), |(from, to), map| map.map_span(from, to))
    }
}

impl From<Vec<StepMap>> for Mapping {
    fn from(maps: Vec<StepMap>) -> Self {
        let mut mapping = Mapping::new();
        for map in maps {
            mapping.push(map);
        }
        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_before_shifts() {
        let map = StepMap::insertion(2, 3);
        assert_eq!(map.map(5, Assoc::Before), 8);
        assert_eq!(map.map(1, Assoc::After), 1);
    }

    #[test]
    fn test_insertion_at_position_respects_assoc() {
        let map = StepMap::insertion(4, 2);
        assert_eq!(map.map(4, Assoc::Before), 4);
        assert_eq!(map.map(4, Assoc::After), 6);
    }

    #[test]
    fn test_deletion_collapses_inner_positions() {
        let map = StepMap::deletion(2, 4);
        let inner = map.map_result(4, Assoc::After);
        assert_eq!(inner.pos, 2);
        assert!(inner.deleted);

        let edge = map.map_result(6, Assoc::Before);
        assert_eq!(edge.pos, 2);
        assert!(!edge.deleted);

        assert_eq!(map.map(9, Assoc::Before), 5);
    }

    #[test]
    fn test_span_keeps_edge_insertions_outside() {
        // Span [3, 7)
        assert_eq!(StepMap::insertion(3, 2).map_span(3, 7), Some((5, 9)));
        assert_eq!(StepMap::insertion(7, 2).map_span(3, 7), Some((3, 7)));
        assert_eq!(StepMap::insertion(5, 2).map_span(3, 7), Some((3, 9)));
    }

    #[test]
    fn test_span_lost_when_fully_deleted() {
        assert_eq!(StepMap::deletion(3, 4).map_span(3, 7), None);
        assert_eq!(StepMap::deletion(0, 10).map_span(3, 7), None);
        assert_eq!(StepMap::deletion(2, 3).map_span(3, 7), Some((2, 4)));
    }

    #[test]
    fn test_replacement_of_whole_span_is_lost() {
        let replace = StepMap {
            pos: 3,
            deleted: 4,
            inserted: 1,
        };
        assert_eq!(replace.map_span(3, 7), None);
    }

    #[test]
    fn test_mapping_folds_in_order() {
        let mapping = Mapping::from(vec![StepMap::insertion(0, 5), StepMap::deletion(0, 2)]);
        assert_eq!(mapping.map(10, Assoc::Before), 13);
        assert_eq!(mapping.map_span(1, 4), Some((4, 7)));
    }

    #[test]
    fn test_identity_maps_are_skipped() {
        let mut mapping = Mapping::new();
        mapping.push(StepMap::insertion(3, 0));
        assert!(mapping.is_empty());
    }
}
