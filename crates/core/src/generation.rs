//! The seam between summary orchestration and a generative model backend.
//!
//! Backends implement [`SummaryGenerator`]; the core only ever sees text or an explicit
//! [`GenerationError`]. Nothing here retries or substitutes placeholder text.

use crate::prompt::PromptPayload;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("model backend unavailable: {0}")]
    Unavailable(String),
    #[error("model backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
    #[error("model returned no content")]
    EmptyResponse,
    #[error("model did not respond within {0:?}")]
    Timeout(Duration),
}

/// A generative model that turns a prompt into summary text.
#[async_trait::async_trait]
pub trait SummaryGenerator: Send + Sync {
    /// Short backend identifier used in logs.
    fn name(&self) -> &str;

    /// Generate summary text for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] if the backend cannot produce text. Implementations must not
    /// return error descriptions as if they were summaries.
    async fn generate(&self, prompt: &PromptPayload) -> Result<String, GenerationError>;
}
