//! Continuations from an OpenAI-compatible chat completions endpoint.
//!
//! ## Learning: JSON over HTTP
//!
//! ```json
//! // Request
//! {"model": "...", "messages": [{"role": "system", "content": "..."}, ...], "max_tokens": 60}
//!
//! // Response
//! {"choices": [{"message": {"role": "assistant", "content": "..."}}]}
//! ```
//!
//! Status codes are mapped onto [`GenerationError`] variants so the
//! coordinator can decide what is retryable without knowing HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{ContentGenerationClient, Continuation, GenerationError, GenerationRequest};

const SYSTEM_PROMPT: &str = "You continue the user's text. Reply with the next one or two \
sentences only, in the same voice and language. Do not repeat the given text and do not \
add commentary.";

/// Client for a chat completions API.
pub struct HttpClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl HttpClient {
    /// Creates a client.
    ///
    /// Fails only if the underlying HTTP client can't be built (e.g. no TLS
    /// backend).
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("inkling/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenerationError::Unknown(format!("could not build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 60,
            temperature: 0.7,
        })
    }

    /// Sets the completion length limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Returns the configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ContentGenerationClient for HttpClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn continue_text(
        &self,
        request: GenerationRequest,
    ) -> Result<Continuation, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &request.context,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        tracing::debug!(
            model = %self.model,
            context_chars = request.context.chars().count(),
            "Requesting continuation"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(transport_error)?;

        if !(200..300).contains(&status) {
            return Err(classify_status(status, &text));
        }

        parse_reply(&text).map(Continuation::from_service)
    }
}

/// Maps a transport-level failure.
fn transport_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        GenerationError::Network(err.to_string())
    } else if err.is_decode() || err.is_body() {
        GenerationError::Unknown(format!("unreadable response: {err}"))
    } else {
        GenerationError::Unknown(err.to_string())
    }
}

/// Maps a non-success HTTP status and its body onto an error.
pub(crate) fn classify_status(status: u16, body: &str) -> GenerationError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let message = detail
        .as_ref()
        .map(|d| d.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP {status}"));

    match status {
        401 | 403 => GenerationError::Auth(message),
        429 => {
            let quota_exhausted = detail.as_ref().is_some_and(|d| {
                d.code.as_deref() == Some("insufficient_quota")
                    || d.kind.as_deref() == Some("insufficient_quota")
            });
            GenerationError::RateLimit {
                message,
                quota_exhausted,
            }
        }
        500..=599 => GenerationError::ServiceUnavailable(message),
        _ => GenerationError::Unknown(message),
    }
}

/// Extracts the continuation text from a successful response body.
pub(crate) fn parse_reply(body: &str) -> Result<String, GenerationError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::Unknown(format!("unexpected response shape: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| GenerationError::Unknown("the response contained no text".to_string()))
}
