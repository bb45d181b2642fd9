use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cli::{AppContext, InitArgs};
use crate::llm::ProviderKind;

/// Config file names probed in the working directory, first hit wins
pub const CONFIG_FILES: [&str; 4] = ["repolens.toml", "repolens.yaml", "repolens.json", ".repolens.toml"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// File discovery rules
    pub scan: ScanConfig,

    /// Ranking and prompt reduction limits
    pub selection: SelectionConfig,

    /// Provider-independent LLM settings
    pub llm: LlmConfig,

    /// OpenAI-compatible chat endpoint
    pub openai: OpenAiConfig,

    /// Local Ollama server
    pub ollama: OllamaConfig,

    /// GitHub REST metadata
    pub github: GitHubConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig
{
    /// Files larger than this many bytes are skipped
    pub max_file_size: u64,

    /// Directory names pruned at any depth
    pub skip_dirs: Vec<String>,

    /// Extra glob patterns matched against repo-relative paths
    pub ignore_patterns: Vec<String>,

    pub include_hidden: bool,
    pub respect_gitignore: bool,

    /// History depth for network clones; 0 clones everything
    pub clone_depth: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig
{
    /// Files sent to the detailed stage
    pub max_analysis_files: usize,

    /// Character cap for non-source files and summary inputs
    pub max_file_content_chars: usize,

    /// Meaningful lines kept per source file
    pub key_lines: usize,

    /// File summaries included in the overview prompt
    pub overview_files: usize,

    /// Files listed per category in the overview's file structure
    pub files_per_category: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig
{
    pub provider: ProviderKind,
    pub temperature: f32,
    pub summary_max_tokens: u32,
    pub overview_max_tokens: u32,
    pub detail_max_tokens: u32,

    /// Token ceiling for the detailed prompt
    pub max_prompt_tokens: usize,

    /// tiktoken model or encoding used for estimates
    pub token_encoding: String,

    pub timeout_secs: u64,
    pub max_retries: u32,

    /// Spend one Summary-stage call per large file in the overview
    pub summarize_large_files: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig
{
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub overview_model: String,
    pub detail_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig
{
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig
{
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub api_base: String,
    pub fetch_metadata: bool,
}

impl Default for ScanConfig
{
    fn default() -> Self
    {
        Self {
            max_file_size: 100_000,
            skip_dirs: [".git", "node_modules", "__pycache__", ".venv", "venv", "dist", "build"]
                .into_iter()
                .map(String::from)
                .collect(),
            ignore_patterns: vec!["**/*.min.js".to_string(), "**/package-lock.json".to_string()],
            include_hidden: true,
            respect_gitignore: true,
            clone_depth: 1,
        }
    }
}

impl Default for SelectionConfig
{
    fn default() -> Self
    {
        Self {
            max_analysis_files: 10,
            max_file_content_chars: 2000,
            key_lines: 50,
            overview_files: 10,
            files_per_category: 10,
        }
    }
}

impl Default for LlmConfig
{
    fn default() -> Self
    {
        Self {
            provider: ProviderKind::OpenAi,
            temperature: 0.1,
            summary_max_tokens: 100,
            overview_max_tokens: 300,
            detail_max_tokens: 1500,
            max_prompt_tokens: 12_000,
            token_encoding: "o200k_base".to_string(),
            timeout_secs: 120,
            max_retries: 2,
            summarize_large_files: false,
        }
    }
}

impl Default for OpenAiConfig
{
    fn default() -> Self
    {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            overview_model: "gpt-4.1-mini".to_string(),
            detail_model: "gpt-4.1".to_string(),
        }
    }
}

impl Default for OllamaConfig
{
    fn default() -> Self
    {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1:8b".to_string(),
        }
    }
}

impl Default for GitHubConfig
{
    fn default() -> Self
    {
        Self {
            token: None,
            api_base: "https://api.github.com".to_string(),
            fetch_metadata: true,
        }
    }
}

impl Config
{
    /// Overlay the conventional, unprefixed environment variables.
    /// `lookup` is injected so tests do not touch the process environment.
    pub fn apply_env_overrides<F>(
        &mut self,
        lookup: F,
    ) where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY")
        {
            self.openai.api_key = Some(key);
        }
        if let Some(url) = non_empty("OPENAI_BASE_URL")
        {
            self.openai.base_url = url;
        }
        if let Some(token) = non_empty("GITHUB_TOKEN")
        {
            self.github.token = Some(token);
        }
        if let Some(url) = non_empty("OLLAMA_BASE_URL")
        {
            self.ollama.base_url = url;
        }
        if let Some(model) = non_empty("OLLAMA_MODEL")
        {
            self.ollama.model = model;
        }
        if let Some(provider) = non_empty("LLM_PROVIDER")
        {
            match provider.parse::<ProviderKind>()
            {
                Ok(kind) => self.llm.provider = kind,
                Err(e) => tracing::warn!("ignoring LLM_PROVIDER: {e}"),
            }
        }
    }

    /// Use one model for every stage of the selected provider
    pub fn override_model(
        &mut self,
        model: &str,
    )
    {
        self.openai.overview_model = model.to_string();
        self.openai.detail_model = model.to_string();
        self.ollama.model = model.to_string();
    }
}

/// Load configuration from the current directory and the environment
pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

/// Load configuration with `dir` as the place to look for config files
pub fn load_config_from(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    if let Some(path) = find_config_file(dir)
    {
        debug!(path = %path.display(), "loading config file");
        builder = builder.add_source(config::File::from(path));
    }

    // REPOLENS_LLM__PROVIDER=ollama → llm.provider
    builder = builder.add_source(
        config::Environment::with_prefix("REPOLENS")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let mut parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    parsed.apply_env_overrides(|key| std::env::var(key).ok());

    Ok(parsed)
}

fn find_config_file(dir: &Path) -> Option<PathBuf>
{
    CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("repolens.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!("DRY RUN: Would write {}:\n{}", config_path.display(), toml_string);
        }
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn defaults_match_documented_limits()
    {
        let cfg = Config::default();
        assert_eq!(cfg.scan.max_file_size, 100_000);
        assert_eq!(cfg.selection.max_analysis_files, 10);
        assert_eq!(cfg.selection.key_lines, 50);
        assert_eq!(cfg.llm.provider, ProviderKind::OpenAi);
        assert!(
            cfg.scan
                .skip_dirs
                .iter()
                .any(|d| d == "node_modules")
        );
    }

    #[test]
    fn partial_file_keeps_defaults() -> Result<()>
    {
        let tmp = TempDir::new()?;
        std::fs::write(
            tmp.path()
                .join("repolens.toml"),
            "[llm]\nprovider = \"ollama\"\n\n[selection]\nmax_analysis_files = 4\n",
        )?;

        let cfg = load_config_from(tmp.path())?;
        assert_eq!(cfg.llm.provider, ProviderKind::Ollama);
        assert_eq!(cfg.selection.max_analysis_files, 4);
        assert_eq!(cfg.selection.key_lines, 50);
        assert_eq!(cfg.ollama.model, "llama3.1:8b");
        Ok(())
    }

    #[test]
    fn default_config_round_trips_through_toml() -> Result<()>
    {
        let text = toml::to_string_pretty(&Config::default())?;
        assert!(!text.contains("api_key"));
        let back: Config = toml::from_str(&text)?;
        assert_eq!(back.openai.detail_model, "gpt-4.1");
        Ok(())
    }

    #[test]
    fn conventional_env_vars_override()
    {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-test"),
            ("GITHUB_TOKEN", "ghp-test"),
            ("LLM_PROVIDER", "ollama"),
            ("OLLAMA_MODEL", "qwen2.5-coder"),
            ("OPENAI_BASE_URL", "  "),
        ]);

        let mut cfg = Config::default();
        cfg.apply_env_overrides(|k| {
            env.get(k)
                .map(|v| v.to_string())
        });

        assert_eq!(cfg.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.github.token.as_deref(), Some("ghp-test"));
        assert_eq!(cfg.llm.provider, ProviderKind::Ollama);
        assert_eq!(cfg.ollama.model, "qwen2.5-coder");
        // Blank values are ignored
        assert_eq!(cfg.openai.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let ctx = AppContext { quiet: true, no_color: true, dry_run: false };

        init(InitArgs { path: tmp.path().to_path_buf(), force: false }, &ctx)?;
        assert!(
            tmp.path()
                .join("repolens.toml")
                .is_file()
        );

        let again = init(InitArgs { path: tmp.path().to_path_buf(), force: false }, &ctx);
        assert!(again.is_err());

        init(InitArgs { path: tmp.path().to_path_buf(), force: true }, &ctx)?;
        Ok(())
    }
}
