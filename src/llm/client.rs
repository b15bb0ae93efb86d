use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::types::{ChatMessage, ChatRequest, ChatResponse};
use crate::config::{OpenAiConfig, RequestConfig};
use crate::error::{AnalysisError, AnalysisResult, AppError, AppResult};

/// Client for an OpenAI-compatible chat completions endpoint.
///
/// Each call makes exactly one HTTP attempt. Every failure is reported as
/// one of the [`AnalysisError`] kinds; the client itself never logs errors,
/// leaving that to whoever decides what to do about them.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    json_mode: bool,
    request_config: RequestConfig,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(config: &OpenAiConfig, request_config: RequestConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(|e| AppError::Config {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            json_mode: config.json_mode,
            request_config,
        })
    }

    /// Send one chat completion request and return the text of the first choice.
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> AnalysisResult<String> {
        self.send(messages, self.json_mode).await
    }

    /// Like [`complete`](Self::complete), but never asks for JSON output.
    pub async fn complete_text(&self, messages: Vec<ChatMessage>) -> AnalysisResult<String> {
        self.send(messages, false).await
    }

    async fn send(&self, messages: Vec<ChatMessage>, json_mode: bool) -> AnalysisResult<String> {
        let request = ChatRequest::new(&self.model, messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_json_mode(json_mode);

        let start = Instant::now();
        let response = self.execute_request(&request).await?;

        let content = response
            .first_content()
            .map(str::to_string)
            .ok_or_else(|| AnalysisError::parse("Provider returned no completion choices"))?;

        info!(
            model = %self.model,
            latency_ms = start.elapsed().as_millis(),
            total_tokens = response.usage.as_ref().and_then(|u| u.total_tokens),
            "Chat completion succeeded"
        );

        Ok(content)
    }

    async fn execute_request(&self, request: &ChatRequest) -> AnalysisResult<ChatResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Calling chat completions"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_body));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AnalysisError::Timeout {
                    timeout_ms: self.request_config.timeout_ms,
                }
            } else {
                AnalysisError::parse(format!("Failed to read response body: {}", e))
            }
        })?;

        serde_json::from_str(&body)
            .map_err(|e| AnalysisError::parse(format!("Failed to parse response: {}", e)))
    }

    fn transport_error(&self, e: reqwest::Error) -> AnalysisError {
        if e.is_timeout() {
            AnalysisError::Timeout {
                timeout_ms: self.request_config.timeout_ms,
            }
        } else if e.is_connect() {
            AnalysisError::RateLimit {
                status: None,
                message: format!("Provider unreachable: {}", e),
            }
        } else {
            AnalysisError::RateLimit {
                status: None,
                message: format!("Request failed: {}", e),
            }
        }
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Map a non-success HTTP status to an analysis error kind.
fn status_error(status: StatusCode, body: String) -> AnalysisError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AnalysisError::Auth {
            status: status.as_u16(),
            message: body,
        },
        StatusCode::TOO_MANY_REQUESTS => AnalysisError::RateLimit {
            status: Some(status.as_u16()),
            message: body,
        },
        s if s.is_server_error() => AnalysisError::RateLimit {
            status: Some(s.as_u16()),
            message: body,
        },
        s => AnalysisError::parse(format!("Provider rejected request ({}): {}", s.as_u16(), body)),
    }
}
