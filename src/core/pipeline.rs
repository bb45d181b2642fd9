use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tracing::{info, instrument, warn};

use crate::cli::{AnalyzeArgs, AppContext};
use crate::core::analyzer::{AnalyzerSettings, PromptPlanner, RepoAnalyzer, plain_summary};
use crate::core::classify::{CodeFile, ScanOptions, ScanStats, scan_with_stats};
use crate::core::fetch::{self, Checkout, GitHubClient, GitHubSlug, RepoSource};
use crate::core::model::{RepoInfo, RepositoryAnalysis};
use crate::core::report;
use crate::core::select::priority_score;
use crate::infra::config::{Config, load_config};
use crate::infra::io::{expand_path, write_output};
use crate::llm::{LlmProvider, build_provider};

/// Everything gathered before the first provider call
pub struct Prepared {
    pub source: RepoSource,
    /// Keeps a cloned tree alive until analysis is done
    pub checkout: Checkout,
    pub info: RepoInfo,
    pub files: Vec<CodeFile>,
    pub stats: ScanStats,
}

/// Spinner on stderr, hidden under `--quiet`
pub(crate) fn spinner(quiet: bool, msg: &str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Parse a repository argument, expanding `~` and `$VAR` for local paths
pub fn parse_source(arg: &str) -> Result<RepoSource> {
    if arg.starts_with('~') || arg.starts_with('$') {
        let expanded = expand_path(arg.as_ref())?;
        if expanded.is_dir() {
            return Ok(RepoSource::parse(&expanded.to_string_lossy())?);
        }
    }
    Ok(RepoSource::parse(arg)?)
}

/// Metadata is best effort: any failure is logged and yields defaults
fn repo_metadata(slug: &GitHubSlug, cfg: &Config) -> RepoInfo {
    let client = match GitHubClient::new(&cfg.github) {
        Ok(c) => c,
        Err(e) => {
            warn!("GitHub client unavailable: {e}");
            return RepoInfo::default();
        }
    };
    client.repo_info(slug).unwrap_or_else(|e| {
        warn!("could not fetch metadata for {slug}: {e}");
        RepoInfo::default()
    })
}

/// Checkout, metadata, scan
#[instrument(skip_all, fields(source = %source.display_url()))]
pub fn prepare(source: RepoSource, cfg: &Config, quiet: bool) -> Result<Prepared> {
    let pb = spinner(quiet, &format!("Fetching {}", source.display_url()));
    let checkout = fetch::checkout(&source, cfg.scan.clone_depth)
        .with_context(|| format!("Failed to fetch {}", source.display_url()))?;

    let info = match source.slug() {
        Some(slug) if cfg.github.fetch_metadata => {
            pb.set_message(format!("Fetching metadata for {slug}"));
            repo_metadata(slug, cfg)
        }
        _ => RepoInfo::default(),
    };

    pb.set_message("Scanning files".to_string());
    let (files, stats) = scan_with_stats(checkout.root(), &ScanOptions::from_config(&cfg.scan))
        .with_context(|| format!("Failed to scan {}", checkout.root().display()))?;
    pb.finish_and_clear();

    info!(files = files.len(), "found analyzable files");
    Ok(Prepared {
        source,
        checkout,
        info,
        files,
        stats,
    })
}

/// Library entry point: fetch, scan, and run both stages with `provider`
pub fn analyze_repository(
    source: RepoSource,
    cfg: &Config,
    provider: &dyn LlmProvider,
) -> Result<RepositoryAnalysis> {
    let prepared = prepare(source, cfg, true)?;
    let analyzer = RepoAnalyzer::new(provider, AnalyzerSettings::from_config(cfg))?;
    Ok(analyzer.analyze(&prepared.source.display_url(), &prepared.info, &prepared.files))
}

/// CLI flags win over every config layer
pub fn apply_overrides(cfg: &mut Config, args: &AnalyzeArgs) {
    if let Some(provider) = args.provider {
        cfg.llm.provider = provider;
    }
    if let Some(model) = &args.model {
        cfg.override_model(model);
    }
    if let Some(n) = args.max_files {
        cfg.selection.max_analysis_files = n;
    }
    if args.summarize_large {
        cfg.llm.summarize_large_files = true;
    }
    if args.no_metadata {
        cfg.github.fetch_metadata = false;
    }
}

/// What `--dry-run` prints: prompts, selection, and token estimates
pub fn dry_run_report(prepared: &Prepared, cfg: &Config) -> Result<String> {
    let planner = PromptPlanner::new(AnalyzerSettings::from_config(cfg))?;
    let files = &prepared.files;
    let repo_url = prepared.source.display_url();

    let summaries: Vec<String> = planner
        .overview_candidates(files)
        .into_iter()
        .map(plain_summary)
        .collect();
    let overview = planner.overview_prompt(&repo_url, &prepared.info, files, &summaries);
    let detail = planner.detail_prompt("<overview summary>", files);

    let mut out = String::new();
    out.push_str(&format!("DRY RUN: no requests will be sent to {}\n", cfg.llm.provider));
    out.push_str(&format!("Repository: {repo_url}\n"));
    out.push_str(&format!(
        "Files: {} scanned ({} bytes), {} skipped as too large\n\n",
        prepared.stats.total_files, prepared.stats.total_bytes, prepared.stats.skipped_large
    ));

    out.push_str("Detail selection (score, path):\n");
    for path in &detail.files {
        let score = files
            .iter()
            .find(|f| &f.path == path)
            .map(priority_score)
            .unwrap_or_default();
        out.push_str(&format!("  {score:>4}  {path}\n"));
    }
    if detail.files.is_empty() {
        out.push_str("  (none)\n");
    }

    out.push_str(&format!(
        "\nOverview prompt (~{} tokens, max reply {}):\n{overview}\n",
        planner.count_tokens(&overview),
        cfg.llm.overview_max_tokens
    ));
    out.push_str(&format!(
        "\nDetail prompt (~{} tokens of {} allowed, max reply {}):\n{}\n",
        planner.count_tokens(&detail.prompt),
        cfg.llm.max_prompt_tokens,
        cfg.llm.detail_max_tokens,
        detail.prompt
    ));
    Ok(out)
}

/// `analyze` command
pub fn run(args: AnalyzeArgs, ctx: &AppContext) -> Result<()> {
    let mut cfg = load_config()?;
    apply_overrides(&mut cfg, &args);

    let source = parse_source(&args.repo)?;
    let prepared = prepare(source, &cfg, ctx.quiet)?;

    if ctx.dry_run {
        if !ctx.quiet {
            println!("{}", dry_run_report(&prepared, &cfg)?);
        }
        return Ok(());
    }

    let provider = build_provider(&cfg).context("Failed to set up LLM provider")?;
    let analyzer = RepoAnalyzer::new(provider.as_ref(), AnalyzerSettings::from_config(&cfg))?;

    let pb = spinner(
        ctx.quiet,
        &format!("Analyzing {} files with {}", prepared.files.len(), provider.name()),
    );
    let analysis = analyzer.analyze(&prepared.source.display_url(), &prepared.info, &prepared.files);
    pb.finish_and_clear();

    let color = ctx.color() && args.output.is_none();
    let rendered = report::render(&analysis, args.format, color)?;

    match &args.output {
        Some(path) => {
            let written = write_output(path, &rendered)?;
            if !ctx.quiet {
                let mark = if ctx.color() { "✓".green().to_string() } else { "✓".to_string() };
                eprintln!("{mark} Report written to {}", written.display());
            }
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
