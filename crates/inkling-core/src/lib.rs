//! # Inkling Core
//!
//! The generation lifecycle: asking for a continuation, showing it in the
//! document as a provisional suggestion, and keeping or removing it.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Session                              │
//! │  ┌──────────────────┐  ┌────────────────────────────────────┐│
//! │  │ CommandDispatcher│─▶│       GenerationCoordinator        ││
//! │  │   (Keymap)       │  │  ┌──────────────┐ ┌──────────────┐ ││
//! │  └──────────────────┘  │  │DocumentMutator│ │ RangeTracker │ ││
//! │                        │  └──────┬───────┘ └──────┬───────┘ ││
//! │                        └─────────┼────────────────┼─────────┘│
//! │  ┌───────────────────────────────▼────────────────▼─────────┐│
//! │  │                 TextBuffer (DocumentHost)                 ││
//! │  └──────────────────────────────────────────────────────────┘│
//! └──────────────────────────────────────────────────────────────┘
//!                 │ ContentGenerationClient (async)
//!                 ▼
//!           AI service / substitute
//! ```
//!
//! ## Learning: Module Organization
//!
//! Rust modules map to files:
//! - `mod foo;` looks for `foo.rs` or `foo/mod.rs`
//! - `pub use` re-exports items for cleaner public APIs

pub mod command;
pub mod config;
pub mod coordinator;
pub mod document;
pub mod event;
pub mod keymap;
pub mod mutator;
pub mod session;
pub mod tracker;

pub use command::{Command, CommandDispatcher};
pub use config::{BufferSettings, Config, ConfigError, GenerationConfig, KeyboardConfig};
pub use coordinator::{
    ErrorKind, GenerationContext, GenerationCoordinator, GenerationEvent, GenerationId,
    GenerationState, Outcome, StateSnapshot,
};
pub use document::{DocumentHost, DocumentSnapshot};
pub use event::{CoordinatorEvent, EventBus, EventHandler};
pub use keymap::{Key, KeyBinding, KeyPress, Keymap, KeymapResult, Modifiers};
pub use mutator::{DocumentMutator, MutatorError, PendingRange};
pub use session::Session;
pub use tracker::{PendingRangeTracker, TrackOutcome};

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Position {position} is outside the document ({len} characters)")]
    PositionOutOfBounds { position: usize, len: usize },

    #[error("Buffer error: {0}")]
    Buffer(#[from] inkling_buffer::BufferError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Command not found: {0}")]
    CommandNotFound(String),
}
