//! Notifications from the generation coordinator.
//!
//! ## Learning: Observer Pattern in Rust
//!
//! Rust's ownership model makes traditional observer patterns tricky.
//! We use `tokio::sync::broadcast` for a safe, async-friendly event bus.
//!
//! Key differences from OOP observers:
//! - No object references to manage
//! - Events are values, not callbacks
//! - Subscribers receive copies (Clone)
//! - No lifetime complexity

use inkling_ai::GenerationErrorKind;
use tokio::sync::broadcast;

use crate::coordinator::{ErrorKind, GenerationId, GenerationState};

/// Things presentation and diagnostics may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// The lifecycle moved from one state to another
    StateChanged {
        from: GenerationState,
        to: GenerationState,
    },

    // Suggestion events
    /// A suggestion was inserted and marked provisional
    SuggestionInserted { from: usize, to: usize },
    /// The suggestion was kept
    SuggestionAccepted { from: usize, to: usize },
    /// The suggestion was removed; `implicit` when the user deleted it
    SuggestionDiscarded { implicit: bool },

    // Failures
    /// The client call failed
    GenerationFailed {
        kind: GenerationErrorKind,
        message: String,
    },
    /// The document couldn't be changed as requested
    DocumentFailed { message: String },
    /// A suggestion couldn't be removed exactly
    IntegrityFault { message: String },

    // Diagnostics
    /// The service was out of quota and a fallback client answered
    FallbackUsed,
    /// A result arrived for a generation that is no longer current
    StaleResultDropped { ticket: GenerationId },
}

impl CoordinatorEvent {
    /// Returns the error category if this event reports a failure.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            CoordinatorEvent::GenerationFailed { kind, .. } => Some(ErrorKind::Generation(*kind)),
            CoordinatorEvent::DocumentFailed { .. } => Some(ErrorKind::Document),
            CoordinatorEvent::IntegrityFault { .. } => Some(ErrorKind::Integrity),
            _ => None,
        }
    }
}

/// Event bus for broadcasting coordinator events.
///
/// ## Design
///
/// Using a broadcast channel allows:
/// - Multiple subscribers (UI, logging, tests)
/// - Async reception
/// - No direct coupling between components
/// - Lagged receivers don't block senders
pub struct EventBus {
    sender: broadcast::Sender<CoordinatorEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    pub fn new() -> Self {
        // Capacity of 256 events in the buffer
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Emits an event to all subscribers.
    pub fn emit(&self, event: CoordinatorEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribes to events.
    ///
    /// Returns a receiver that will get all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Helper for processing events asynchronously.
///
/// ## Example
///
/// ```ignore
/// let mut handler = EventHandler::new(session.subscribe());
///
/// tokio::spawn(async move {
///     while let Some(event) = handler.next().await {
///         if let CoordinatorEvent::IntegrityFault { message } = event {
///             eprintln!("{message}");
///         }
///     }
/// });
/// ```
pub struct EventHandler {
    receiver: broadcast::Receiver<CoordinatorEvent>,
}

impl EventHandler {
    /// Creates a new event handler.
    pub fn new(receiver: broadcast::Receiver<CoordinatorEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event.
    pub async fn next(&mut self) -> Option<CoordinatorEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns every event already queued, without waiting.
    pub fn drain(&mut self) -> Vec<CoordinatorEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                }
                Err(_) => return events,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(CoordinatorEvent::FallbackUsed);

        let event = rx.recv().await.unwrap();
        assert_eq!(event, CoordinatorEvent::FallbackUsed);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(CoordinatorEvent::SuggestionDiscarded { implicit: true });

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[test]
    fn test_drain_collects_queued_events() {
        let bus = EventBus::new();
        let mut handler = EventHandler::new(bus.subscribe());

        bus.emit(CoordinatorEvent::FallbackUsed);
        bus.emit(CoordinatorEvent::IntegrityFault {
            message: "lost".into(),
        });

        let events = handler.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].error_kind(), Some(ErrorKind::Integrity));
        assert!(handler.drain().is_empty());
    }
}
