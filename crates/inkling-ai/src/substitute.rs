//! A local stand-in for the AI service.
//!
//! Used when no credential is configured, when explicitly requested, and
//! as the quota fallback. It's deterministic: the same context always
//! yields the same continuation, which keeps demos and tests repeatable.

use async_trait::async_trait;
use std::time::Duration;

use crate::{ContentGenerationClient, Continuation, GenerationError, GenerationRequest};

const CANNED: &[&str] = &[
    "The rest of the afternoon passed quietly, as if the house itself were listening.",
    "It was only later that the full weight of the decision became clear.",
    "Nobody said anything for a while, and the silence said enough.",
    "There were still a dozen questions left, but they could wait until morning.",
    "In the end, the simplest explanation turned out to be the right one.",
    "Outside, the rain had started again, softer this time.",
];

/// Deterministic continuation source.
#[derive(Debug, Clone, Default)]
pub struct SubstituteClient {
    latency: Duration,
}

impl SubstituteClient {
    /// Creates a substitute that answers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artificial delay before each answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Picks the continuation for a context.
    pub fn continuation_for(context: &str) -> &'static str {
        // FNV-1a, stable across runs and platforms
        let hash = context
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
                (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
            });
        CANNED[(hash % CANNED.len() as u64) as usize]
    }
}

#[async_trait]
impl ContentGenerationClient for SubstituteClient {
    fn name(&self) -> &str {
        "substitute"
    }

    async fn continue_text(
        &self,
        request: GenerationRequest,
    ) -> Result<Continuation, GenerationError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(Continuation::from_substitute(Self::continuation_for(
            &request.context,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Source;

    #[tokio::test]
    async fn test_substitute_is_deterministic() {
        let client = SubstituteClient::new();
        let a = client
            .continue_text(GenerationRequest::new("Once upon a time", 16))
            .await
            .unwrap();
        let b = client
            .continue_text(GenerationRequest::new("Once upon a time", 16))
            .await
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(a.source, Source::Substitute);
        assert!(!a.text.trim().is_empty());
    }

    #[test]
    fn test_empty_context_still_answers() {
        assert!(CANNED.contains(&SubstituteClient::continuation_for("")));
    }
}
