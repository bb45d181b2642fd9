use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::llm::ProviderKind;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

impl AppContext {
    /// Color is on unless disabled by flag or the NO_COLOR convention
    pub fn color(&self) -> bool {
        !self.no_color && std::env::var_os("NO_COLOR").is_none()
    }
}

#[derive(Parser)]
#[command(name = "repolens")]
#[command(
    about = "Clone a repository, sample its files, and get an LLM-backed quality and technology assessment"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress spinners and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be sent without calling the LLM provider
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the two-stage LLM analysis on a repository
    Analyze(AnalyzeArgs),

    /// Classify files and show the ranked selection without calling an LLM
    Scan(ScanArgs),

    /// Initialize a repolens.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Colored console tables
    Text,
    /// Pretty-printed JSON
    Json,
    /// Markdown document
    Markdown,
}

#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Repository URL (https, ssh, owner/repo shorthand) or a local directory
    pub repo: String,

    /// LLM provider to use (overrides config)
    #[arg(short, long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Model for both stages (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Maximum number of files sent to the detailed stage
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Ask the provider to summarize large files for the overview stage
    #[arg(long)]
    pub summarize_large: bool,

    /// Skip the GitHub metadata request
    #[arg(long)]
    pub no_metadata: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Repository URL or a local directory
    #[arg(default_value = ".")]
    pub repo: String,

    /// Number of ranked files to show
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Emit JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
