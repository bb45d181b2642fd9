//! OpenAI-compatible chat completions (blocking)

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::retry::{RetryConfig, with_retry};
use super::{
    CompletionRequest, JSON_SYSTEM_PROMPT, LlmProvider, ProviderError, SUMMARY_SYSTEM_PROMPT, Stage,
    http_client,
};
use crate::infra::config::OpenAiConfig;

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    overview_model: String,
    detail_model: String,
    retry: RetryConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl OpenAiProvider {
    pub fn new(cfg: &OpenAiConfig, timeout: Duration, retry: RetryConfig) -> Result<Self, ProviderError> {
        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::NotConfigured(
                    "OpenAI API key missing (set OPENAI_API_KEY or openai.api_key)".to_string(),
                )
            })?;

        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            overview_model: cfg.overview_model.clone(),
            detail_model: cfg.detail_model.clone(),
            retry,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        let system = if request.stage.wants_json() {
            JSON_SYSTEM_PROMPT
        } else {
            SUMMARY_SYSTEM_PROMPT
        };

        ChatRequest {
            model: self.model(request.stage),
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: &request.prompt },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request
                .stage
                .wants_json()
                .then_some(ResponseFormat { kind: "json_object" }),
        }
    }

    fn send(&self, body: &ChatRequest<'_>) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .map_err(ProviderError::from_transport)?;

        let status = response.status();
        let text = response.text().map_err(ProviderError::from_transport)?;

        if !status.is_success() {
            return Err(parse_error_response(status.as_u16(), &text));
        }

        parse_chat_response(&text)
    }
}

impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self, stage: Stage) -> &str {
        match stage {
            Stage::Summary | Stage::Overview => &self.overview_model,
            Stage::Detail => &self.detail_model,
        }
    }

    #[instrument(skip_all, fields(stage = request.stage.as_str(), model = self.model(request.stage)))]
    fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = self.build_request(request);
        debug!(prompt_chars = request.prompt.len(), "sending chat completion");
        with_retry(&self.retry, "openai.chat", || self.send(&body))
    }
}

/// Pull the assistant text out of a chat completion body
fn parse_chat_response(body: &str) -> Result<String, ProviderError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| ProviderError::InvalidResponse("response has no message content".to_string()))
}

/// Map an error body to a typed error, preferring OpenAI's error codes
fn parse_error_response(status: u16, body: &str) -> ProviderError {
    if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
        let error = error_response.error;
        let message = error.message;

        return match error.code.as_deref() {
            Some("rate_limit_exceeded") => ProviderError::RateLimited { retry_after_ms: None },
            Some("context_length_exceeded") => ProviderError::ContextLengthExceeded(message),
            Some("invalid_api_key") => ProviderError::Authentication(message),
            Some("insufficient_quota") => ProviderError::QuotaExceeded(message),
            Some("model_not_found") => ProviderError::ModelNotFound(message),
            _ => ProviderError::from_http_status(status, &message),
        };
    }

    ProviderError::from_http_status(status, body)
}
