//! # Inkling AI
//!
//! Clients that turn the text before the cursor into a continuation.
//!
//! ## The Contract
//!
//! A [`ContentGenerationClient`] receives a bounded slice of context and
//! the cursor offset it was taken from, and resolves to a [`Continuation`]
//! or a typed [`GenerationError`]. Clients never touch the document.
//!
//! ## Learning: `async_trait`
//!
//! The coordinator stores its client as `Arc<dyn ContentGenerationClient>`
//! so tests and configuration can swap implementations at runtime.
//! Native `async fn` in traits isn't object safe yet, so the trait goes
//! through `#[async_trait]`, which boxes the returned future.
//!
//! ## Implementations
//!
//! - [`HttpClient`]: an OpenAI-compatible chat completions endpoint
//! - [`SubstituteClient`]: a deterministic stand-in, no network
//! - [`FallbackClient`]: a primary client that falls back to a substitute
//!   when the service reports an exhausted quota

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod config;
mod fallback;
mod http;
mod substitute;

pub use config::{AiConfig, client_from_config};
pub use fallback::FallbackClient;
pub use http::HttpClient;
pub use substitute::SubstituteClient;

/// What a client is asked to continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Text immediately before the cursor, possibly truncated at the front
    pub context: String,
    /// Character offset the context ends at
    pub cursor_position: usize,
}

impl GenerationRequest {
    /// Creates a new request.
    pub fn new(context: impl Into<String>, cursor_position: usize) -> Self {
        Self {
            context: context.into(),
            cursor_position,
        }
    }
}

/// Where a continuation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// The configured AI service
    Service,
    /// The local stand-in
    Substitute,
    /// A secondary client answering because the service ran out of quota
    Fallback,
}

/// A successful generation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continuation {
    pub text: String,
    pub source: Source,
}

impl Continuation {
    /// A continuation produced by the AI service.
    pub fn from_service(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: Source::Service,
        }
    }

    /// A continuation produced by the substitute.
    pub fn from_substitute(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: Source::Substitute,
        }
    }
}

/// Error categories, for callers that only care about the class of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationErrorKind {
    Auth,
    RateLimit,
    ServiceUnavailable,
    Network,
    Unknown,
}

impl GenerationErrorKind {
    /// Returns false only for failures the user must fix outside the editor.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GenerationErrorKind::Auth)
    }
}

impl std::fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GenerationErrorKind::Auth => "auth",
            GenerationErrorKind::RateLimit => "rate_limit",
            GenerationErrorKind::ServiceUnavailable => "service_unavailable",
            GenerationErrorKind::Network => "network",
            GenerationErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Errors a generation call can fail with.
///
/// Every variant carries a message fit for showing to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("The AI service rejected the credentials: {0}")]
    Auth(String),

    #[error("The AI service is rate limiting requests: {message}")]
    RateLimit {
        message: String,
        /// The account ran out of quota, as opposed to sending too fast
        quota_exhausted: bool,
    },

    #[error("The AI service is unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Could not reach the AI service: {0}")]
    Network(String),

    #[error("Generation failed: {0}")]
    Unknown(String),
}

impl GenerationError {
    /// Returns the error's category.
    pub fn kind(&self) -> GenerationErrorKind {
        match self {
            GenerationError::Auth(_) => GenerationErrorKind::Auth,
            GenerationError::RateLimit { .. } => GenerationErrorKind::RateLimit,
            GenerationError::ServiceUnavailable(_) => GenerationErrorKind::ServiceUnavailable,
            GenerationError::Network(_) => GenerationErrorKind::Network,
            GenerationError::Unknown(_) => GenerationErrorKind::Unknown,
        }
    }

    /// Returns true if asking again can succeed without reconfiguration.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Returns true if the account is out of quota.
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimit {
                quota_exhausted: true,
                ..
            }
        )
    }
}

/// Something that can continue a piece of text.
#[async_trait]
pub trait ContentGenerationClient: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Produces a continuation for the request.
    async fn continue_text(
        &self,
        request: GenerationRequest,
    ) -> Result<Continuation, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_is_terminal() {
        assert!(!GenerationError::Auth("bad key".into()).is_retryable());
        assert!(GenerationError::Network("timeout".into()).is_retryable());
        assert!(
            GenerationError::RateLimit {
                message: "slow down".into(),
                quota_exhausted: false
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_messages_are_human_readable() {
        let err = GenerationError::ServiceUnavailable("503".into());
        assert_eq!(err.to_string(), "The AI service is unavailable: 503");
        assert_eq!(err.kind().to_string(), "service_unavailable");
    }

    #[test]
    fn test_quota_detection() {
        let quota = GenerationError::RateLimit {
            message: "insufficient_quota".into(),
            quota_exhausted: true,
        };
        assert!(quota.is_quota_exhausted());
        assert!(!GenerationError::Unknown("x".into()).is_quota_exhausted());
    }
}
