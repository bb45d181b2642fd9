//! **repolens** - CLI that clones a repository, samples its files, and asks an LLM
//! for a structured quality and technology assessment.
//!
//! Gitignore-aware scanning with parallel reads, heuristic file ranking, and a
//! two-stage (overview, then detailed) prompt pipeline with lenient JSON parsing.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core pipeline - fetch, classify, select, prompt, parse, report
pub mod core {
    /// Repository checkout (git2) and GitHub metadata (REST)
    pub mod fetch;
    pub use fetch::{Checkout, FetchError, GitHubClient, GitHubSlug, RepoSource};

    /// Extension/size/directory filtering and language + category tagging
    pub mod classify;
    pub use classify::{
        CodeFile, FileCategory, Language, ScanOptions, ScanStats, scan_repository, scan_with_stats,
    };

    /// Priority scoring, bounded selection, and content reduction
    pub mod select;
    pub use select::{
        extract_key_content, priority_score, reduce_for_prompt, select_important, truncate_chars,
    };

    /// Token counting and prompt fitting (tiktoken + moka cache)
    pub mod budget;
    pub use budget::{Section, TokenCounter};

    /// Prompt templates for the summary, overview, and detail stages
    pub mod prompt;

    /// JSON-contract parsing of provider replies with fallbacks
    pub mod reply;
    pub use reply::{DetailReply, OverviewReply, extract_json_object};

    /// Result schema shared by all providers
    pub mod model;
    pub use model::{
        AnalysisMetadata, CodeInsight, InsightCategory, RepoInfo, RepositoryAnalysis, Severity,
        TechnologyStack,
    };

    /// Two-stage LLM orchestration
    pub mod analyzer;
    pub use analyzer::{AnalyzerSettings, PromptPlanner, RepoAnalyzer};

    /// `analyze` command: checkout → metadata → scan → analyze → report
    pub mod pipeline;
    pub use pipeline::{analyze_repository, run as analyze_run};

    /// `scan` command: offline classification and selection report
    pub mod scan;
    pub use scan::run as scan_run;

    /// Text, Markdown, and JSON renderers
    pub mod report;
}

/// LLM provider clients (OpenAI-compatible chat, Ollama generate)
pub mod llm;

/// Infrastructure - Configuration, I/O, and walking
pub mod infra {
    /// Layered configuration (file → REPOLENS_* env → well-known env → CLI)
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Lossy file reads and output writing
    pub mod io;
    pub use io::{read_file_lossy, write_output};

    /// Gitignore-aware directory walking with skip-dir pruning
    pub mod walk;
    pub use walk::FileWalker;

    /// tracing-subscriber setup
    pub mod logging;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use crate::core::{analyze_repository, analyze_run, scan_run};
pub use infra::{Config, FileWalker, load_config};
pub use llm::{LlmProvider, ProviderKind};

// Core types for external consumers
pub use crate::core::model::{CodeInsight, RepositoryAnalysis, TechnologyStack};
