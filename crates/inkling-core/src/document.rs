//! The document contract the generation core depends on.
//!
//! ## Learning: Traits at the Seam
//!
//! The coordinator never names `TextBuffer` directly. It works against
//! [`DocumentHost`], the narrow set of queries and the one mutation entry
//! point it needs from a rich-text engine. Tests and other frontends can
//! bring their own host; `TextBuffer` is the one we ship.

use inkling_buffer::{BufferResult, Mapping, Mark, Selection, TextBuffer, Transaction, Version};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// An opaque reference to one state of the document.
///
/// It names the version rather than copying the content: the host owns
/// the text, the core only needs to know which state it last saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub version: Version,
    pub len: usize,
}

impl std::fmt::Display for DocumentSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} chars)", self.version, self.len)
    }
}

/// What the generation core needs from a document engine.
pub trait DocumentHost {
    /// Current version; bumps once per applied transaction.
    fn version(&self) -> Version;

    /// Document length in characters.
    fn len_chars(&self) -> usize;

    /// Up to `max_chars` characters ending at `end`.
    fn text_before(&self, end: usize, max_chars: usize) -> BufferResult<String>;

    /// Current selection.
    fn selection(&self) -> Selection;

    /// Applies a transaction atomically.
    fn apply(&mut self, tx: Transaction) -> BufferResult<Version>;

    /// Position maps for every change after `version`, if still known.
    fn mapping_since(&self, version: Version) -> Option<Mapping>;

    /// Returns true if any part of `range` carries `mark`.
    fn has_mark(&self, range: Range<usize>, mark: Mark) -> bool;

    /// Returns a snapshot of the current state.
    fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            version: self.version(),
            len: self.len_chars(),
        }
    }
}

impl DocumentHost for TextBuffer {
    fn version(&self) -> Version {
        TextBuffer::version(self)
    }

    fn len_chars(&self) -> usize {
        TextBuffer::len_chars(self)
    }

    fn text_before(&self, end: usize, max_chars: usize) -> BufferResult<String> {
        TextBuffer::text_before(self, end, max_chars)
    }

    fn selection(&self) -> Selection {
        TextBuffer::selection(self)
    }

    fn apply(&mut self, tx: Transaction) -> BufferResult<Version> {
        TextBuffer::apply(self, tx)
    }

    fn mapping_since(&self, version: Version) -> Option<Mapping> {
        TextBuffer::mapping_since(self, version)
    }

    fn has_mark(&self, range: Range<usize>, mark: Mark) -> bool {
        TextBuffer::has_mark(self, range, mark)
    }
}
