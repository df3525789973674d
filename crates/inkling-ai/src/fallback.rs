//! Quota fallback.
//!
//! When the service says the account is out of quota, asking again won't
//! help. [`FallbackClient`] answers those requests from a secondary client
//! instead and tags the reply [`Source::Fallback`]; every other failure
//! passes through unchanged.

use async_trait::async_trait;
use std::sync::Arc;

use crate::{ContentGenerationClient, Continuation, GenerationError, GenerationRequest, Source};

/// A primary client backed by a secondary one for quota failures.
pub struct FallbackClient {
    primary: Arc<dyn ContentGenerationClient>,
    secondary: Arc<dyn ContentGenerationClient>,
}

impl FallbackClient {
    /// Creates a fallback pair.
    pub fn new(
        primary: Arc<dyn ContentGenerationClient>,
        secondary: Arc<dyn ContentGenerationClient>,
    ) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl ContentGenerationClient for FallbackClient {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn continue_text(
        &self,
        request: GenerationRequest,
    ) -> Result<Continuation, GenerationError> {
        match self.primary.continue_text(request.clone()).await {
            Err(err) if err.is_quota_exhausted() => {
                tracing::warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    "Quota exhausted, answering from fallback: {}",
                    err
                );
                let continuation = self.secondary.continue_text(request).await?;
                Ok(Continuation {
                    source: Source::Fallback,
                    ..continuation
                })
            }
            other => other,
        }
    }
}
