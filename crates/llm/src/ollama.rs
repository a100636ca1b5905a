//! Ollama chat completion client.

use crate::LlmError;
use ehrsim_core::prompt::PromptPayload;
use ehrsim_core::{GenerationError, SummaryGenerator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default OpenAI-compatible endpoint of a local Ollama server.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/v1/chat/completions";

/// Default model tag.
pub const DEFAULT_OLLAMA_MODEL: &str = "gemma3:27b";

/// Sampling options sent with every request.
///
/// Defaults favour reproducible output over variety.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub repeat_penalty: f32,
    pub top_k: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            repeat_penalty: 1.1,
            top_k: 1,
        }
    }
}

/// Client configuration resolved at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub url: String,
    pub model: String,
    pub timeout: Duration,
    pub options: SamplingOptions,
}

impl LlmConfig {
    /// Build a configuration from optional environment values, falling back to the defaults for
    /// unset or blank values.
    pub fn from_env_values(url: Option<String>, model: Option<String>, timeout: Duration) -> Self {
        let non_blank = |v: Option<String>| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        Self {
            url: non_blank(url).unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model: non_blank(model).unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            timeout,
            options: SamplingOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub options: SamplingOptions,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// HTTP client for one Ollama endpoint and model.
#[derive(Clone)]
pub struct OllamaClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidConfig`] if the URL is not an http(s) URL or the HTTP client
    /// cannot be built.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let parsed = reqwest::Url::parse(&config.url)
            .map_err(|e| LlmError::InvalidConfig(format!("invalid URL '{}': {e}", config.url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LlmError::InvalidConfig(format!(
                "URL must use http or https, got: {}",
                parsed.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30).min(config.timeout))
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(url = %config.url, model = %config.model, "LLM client created");
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Request body for `prompt`: system instructions then user content, non-streaming.
    pub fn build_request(&self, prompt: &PromptPayload) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: prompt.system_instructions.clone(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: prompt.user_content.clone(),
                },
            ],
            stream: false,
            options: self.config.options,
        }
    }

    /// Extract the generated text from a response body.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Parse`] if the body has no `choices[0].message.content`, or
    /// [`LlmError::EmptyResponse`] if that content is blank.
    pub fn parse_response(body: &str) -> Result<String, LlmError> {
        let response: ChatCompletionResponse =
            serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;
        let content = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Parse("response has no choices".into()))?;

        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(content.trim().to_string())
    }

    /// Send one chat completion request.
    pub async fn chat(&self, prompt: &PromptPayload) -> Result<String, LlmError> {
        let request = self.build_request(prompt);
        let started = std::time::Instant::now();

        let response = self
            .client
            .post(&self.config.url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "model server returned an error");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = Self::parse_response(&body)?;
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = text.len(),
            "model response received"
        );
        Ok(text)
    }
}

#[async_trait::async_trait]
impl SummaryGenerator for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &PromptPayload) -> Result<String, GenerationError> {
        self.chat(prompt)
            .await
            .map_err(|e| e.into_generation_error(self.config.timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use ehrsim_core::prompt::compose;
    use ehrsim_core::SummaryType;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    fn config(url: &str) -> LlmConfig {
        LlmConfig::from_env_values(Some(url.into()), None, Duration::from_secs(5))
    }

    fn prompt() -> PromptPayload {
        compose(SummaryType::Historical, "Patient: Ana Silva", None, None)
    }

    /// Serve `router` on an ephemeral local port and return the chat completion URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("mock server");
        });
        format!("http://{addr}/v1/chat/completions")
    }

    #[test]
    fn config_defaults_apply_for_blank_values() {
        let cfg = LlmConfig::from_env_values(Some("  ".into()), None, Duration::from_secs(120));
        assert_eq!(cfg.url, DEFAULT_OLLAMA_URL);
        assert_eq!(cfg.model, DEFAULT_OLLAMA_MODEL);
        assert_eq!(cfg.options, SamplingOptions::default());
    }

    #[test]
    fn rejects_non_http_urls() {
        let err = OllamaClient::new(config("ftp://models.local/chat")).err();
        assert!(matches!(err, Some(LlmError::InvalidConfig(_))));
        assert!(OllamaClient::new(config("not a url")).is_err());
    }

    #[test]
    fn request_body_has_system_then_user_and_pinned_sampling() {
        let client = OllamaClient::new(config(DEFAULT_OLLAMA_URL)).expect("client");
        let body = serde_json::to_value(client.build_request(&prompt())).expect("serialise");

        assert_eq!(body["model"], "gemma3:27b");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Patient Data: Patient: Ana Silva");
        assert_eq!(body["options"]["temperature"], 0.0);
        assert_eq!(body["options"]["top_k"], 1);
    }

    #[test]
    fn parses_first_choice_content() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": " Summary text. "}}]});
        assert_eq!(
            OllamaClient::parse_response(&body.to_string()).expect("parse"),
            "Summary text."
        );
    }

    #[test]
    fn malformed_or_empty_responses_are_errors() {
        assert!(matches!(
            OllamaClient::parse_response("{\"choices\": []}"),
            Err(LlmError::Parse(_))
        ));
        assert!(matches!(
            OllamaClient::parse_response("<html>"),
            Err(LlmError::Parse(_))
        ));
        let blank = json!({"choices": [{"message": {"role": "assistant", "content": "  "}}]});
        assert!(matches!(
            OllamaClient::parse_response(&blank.to_string()),
            Err(LlmError::EmptyResponse)
        ));
    }

    #[test]
    fn timeouts_map_to_generation_timeouts() {
        let err = LlmError::Timeout.into_generation_error(Duration::from_secs(9));
        assert!(matches!(err, GenerationError::Timeout(d) if d == Duration::from_secs(9)));
    }

    #[tokio::test]
    async fn generates_against_a_chat_endpoint() {
        let received: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let captured = received.clone();
        let router = Router::new().route(
            "/v1/chat/completions",
            post(move |Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().expect("capture lock") = Some(body);
                    Json(json!({
                        "choices": [{"message": {"role": "assistant", "content": "Generated summary."}}]
                    }))
                }
            }),
        );
        let url = serve(router).await;

        let client = OllamaClient::new(config(&url)).expect("client");
        let text = client.generate(&prompt()).await.expect("generate");

        assert_eq!(text, "Generated summary.");
        let body = received
            .lock()
            .expect("capture lock")
            .clone()
            .expect("request captured");
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[tokio::test]
    async fn http_errors_are_not_returned_as_text() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::NOT_FOUND, "model 'gemma3:27b' not found") }),
        );
        let url = serve(router).await;

        let client = OllamaClient::new(config(&url)).expect("client");
        let err = client.generate(&prompt()).await.expect_err("404 is a failure");
        assert!(matches!(
            err,
            GenerationError::Status { status: 404, ref body } if body.contains("not found")
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let client =
            OllamaClient::new(config(&format!("http://{addr}/v1/chat/completions"))).expect("client");
        let err = client.generate(&prompt()).await.expect_err("connection refused");
        assert!(matches!(err, GenerationError::Unavailable(_)));
    }
}
