//! LLM provider abstraction.
//!
//! Every provider turns a single prompt into reply text. Shaping the reply
//! into the result schema happens in `core::reply`, so providers stay thin
//! HTTP adapters.

pub mod error;
pub mod ollama;
pub mod openai;
pub mod retry;

pub use error::ProviderError;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use retry::{RetryConfig, with_retry};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::infra::config::Config;

/// Which backend answers the prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions
    #[default]
    #[value(name = "openai")]
    OpenAi,
    /// Local Ollama server
    Ollama,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(format!("unknown provider '{other}' (expected openai or ollama)")),
        }
    }
}

/// Pipeline stage a request belongs to. Providers may route stages to
/// different models and only JSON stages ask for JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Short prose summary of one large file
    Summary,
    /// Cheap first pass: summary + primary technologies
    Overview,
    /// Expensive second pass over the selected files
    Detail,
}

impl Stage {
    pub fn wants_json(self) -> bool {
        !matches!(self, Stage::Summary)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Summary => "summary",
            Stage::Overview => "overview",
            Stage::Detail => "detail",
        }
    }
}

/// A single prompt to send
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub stage: Stage,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// System prompt for the JSON stages
pub const JSON_SYSTEM_PROMPT: &str = "You are a senior software engineer reviewing a source repository. \
Reply with a single JSON object that follows the requested schema and nothing else.";

/// System prompt for per-file summaries
pub const SUMMARY_SYSTEM_PROMPT: &str = "You summarize source files for a code reviewer in plain prose.";

/// Text-generation backend
pub trait LlmProvider: Send + Sync {
    /// Short provider id ("openai", "ollama")
    fn name(&self) -> &str;

    /// Model that serves `stage`
    fn model(&self, stage: Stage) -> &str;

    /// Send one prompt and return the reply text
    fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

/// Shared blocking HTTP client settings
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client, ProviderError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("repolens/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("failed to build HTTP client: {e}")))
}

/// Construct the provider selected in `cfg.llm.provider`
pub fn build_provider(cfg: &Config) -> Result<Box<dyn LlmProvider>, ProviderError> {
    let timeout = Duration::from_secs(cfg.llm.timeout_secs.max(1));
    let retry = RetryConfig::with_max_retries(cfg.llm.max_retries);

    let provider: Box<dyn LlmProvider> = match cfg.llm.provider {
        ProviderKind::OpenAi => Box::new(OpenAiProvider::new(&cfg.openai, timeout, retry)?),
        ProviderKind::Ollama => Box::new(OllamaProvider::new(&cfg.ollama, timeout, retry)?),
    };

    tracing::info!(
        provider = provider.name(),
        overview_model = provider.model(Stage::Overview),
        detail_model = provider.model(Stage::Detail),
        "LLM provider ready"
    );
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert_eq!(" ollama ".parse::<ProviderKind>(), Ok(ProviderKind::Ollama));
        assert!("claude".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn provider_kind_serde_names() {
        assert_eq!(serde_json::to_string(&ProviderKind::OpenAi).unwrap(), "\"openai\"");
        let k: ProviderKind = serde_json::from_str("\"ollama\"").unwrap();
        assert_eq!(k, ProviderKind::Ollama);
    }

    #[test]
    fn openai_requires_api_key() {
        let cfg = Config::default();
        let err = build_provider(&cfg).err().expect("missing key must fail");
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn ollama_builds_without_credentials() {
        let mut cfg = Config::default();
        cfg.llm.provider = ProviderKind::Ollama;
        let provider = build_provider(&cfg).expect("ollama provider");
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.model(Stage::Detail), "llama3.1:8b");
    }

    #[test]
    fn only_summary_stage_is_prose() {
        assert!(!Stage::Summary.wants_json());
        assert!(Stage::Overview.wants_json());
        assert!(Stage::Detail.wants_json());
    }
}
