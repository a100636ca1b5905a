//! # EHR Simulator LLM client
//!
//! Concrete [`SummaryGenerator`](ehrsim_core::SummaryGenerator) backed by an Ollama server's
//! OpenAI-compatible chat completion endpoint.
//!
//! Sampling is pinned for reproducibility (temperature 0, top-k 1). Transport and response
//! failures are reported as [`LlmError`] and surface in the core as
//! [`GenerationError`](ehrsim_core::GenerationError); error text is never returned as a summary.

pub mod ollama;

pub use ollama::{LlmConfig, OllamaClient, SamplingOptions};

use ehrsim_core::GenerationError;
use std::time::Duration;

/// Errors returned by the LLM client.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("invalid LLM configuration: {0}")]
    InvalidConfig(String),
    #[error("model server unreachable: {0}")]
    Unavailable(String),
    #[error("model request timed out")]
    Timeout,
    #[error("model server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse model response: {0}")]
    Parse(String),
    #[error("model response contained no text")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if let Some(status) = err.status() {
            LlmError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            LlmError::Unavailable(err.to_string())
        }
    }
}

impl LlmError {
    /// Convert into the core's generation error. `timeout` is the client timeout that applied
    /// to the failed request.
    pub fn into_generation_error(self, timeout: Duration) -> GenerationError {
        match self {
            LlmError::InvalidConfig(msg) | LlmError::Unavailable(msg) => {
                GenerationError::Unavailable(msg)
            }
            LlmError::Timeout => GenerationError::Timeout(timeout),
            LlmError::Status { status, body } => GenerationError::Status { status, body },
            LlmError::Parse(msg) => GenerationError::MalformedResponse(msg),
            LlmError::EmptyResponse => GenerationError::EmptyResponse,
        }
    }
}
