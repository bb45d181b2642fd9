//! Ollama (local) provider using the non-streaming /api/generate endpoint

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::retry::{RetryConfig, with_retry};
use super::{CompletionRequest, JSON_SYSTEM_PROMPT, LlmProvider, ProviderError, SUMMARY_SYSTEM_PROMPT, Stage, http_client};
use crate::infra::config::OllamaConfig;

/// Ollama provider for local models. One model serves every stage.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    retry: RetryConfig,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'static str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorResponse {
    error: String,
}

impl OllamaProvider {
    pub fn new(cfg: &OllamaConfig, timeout: Duration, retry: RetryConfig) -> Result<Self, ProviderError> {
        if cfg.model.trim().is_empty() {
            return Err(ProviderError::NotConfigured("ollama.model is empty".to_string()));
        }

        Ok(Self {
            client: http_client(timeout)?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            retry,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn build_request<'a>(&'a self, request: &'a CompletionRequest) -> GenerateRequest<'a> {
        let json = request.stage.wants_json();

        GenerateRequest {
            model: &self.model,
            system: if json { JSON_SYSTEM_PROMPT } else { SUMMARY_SYSTEM_PROMPT },
            prompt: &request.prompt,
            stream: false,
            format: json.then_some("json"),
            options: GenerateOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
            },
        }
    }

    fn send(&self, body: &GenerateRequest<'_>) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(self.generate_url())
            .json(body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    ProviderError::Network(format!("cannot reach Ollama at {}: {e}", self.base_url))
                } else {
                    ProviderError::from_transport(e)
                }
            })?;

        let status = response.status();
        let text = response.text().map_err(ProviderError::from_transport)?;

        if !status.is_success() {
            let message = serde_json::from_str::<OllamaErrorResponse>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            return Err(ProviderError::from_http_status(status.as_u16(), &message));
        }

        parse_generate_response(&text)
    }
}

impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self, _stage: Stage) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(stage = request.stage.as_str(), model = %self.model))]
    fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = self.build_request(request);
        debug!(prompt_chars = request.prompt.len(), "sending generate request");
        with_retry(&self.retry, "ollama.generate", || self.send(&body))
    }
}

fn parse_generate_response(body: &str) -> Result<String, ProviderError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    Ok(parsed.response.trim().to_string())
}
