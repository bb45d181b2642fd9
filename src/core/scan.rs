use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::{AppContext, ScanArgs};
use crate::core::classify::{CodeFile, FileCategory, ScanStats};
use crate::core::pipeline::{parse_source, prepare};
use crate::core::select::{priority_score, select_important};
use crate::infra::config::load_config;

#[derive(Debug, Serialize, Tabled)]
pub struct RankedFile {
    #[tabled(rename = "Score")]
    pub score: u32,
    #[tabled(rename = "Path")]
    pub path: String,
    #[tabled(rename = "Category")]
    pub category: FileCategory,
    #[tabled(rename = "Language")]
    pub language: String,
    #[tabled(rename = "Bytes")]
    pub size: usize,
}

/// Offline view of what `analyze` would look at
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub repo: String,
    pub stats: ScanStats,
    pub selection: Vec<RankedFile>,
}

impl ScanReport {
    pub fn build(repo: String, files: &[CodeFile], stats: ScanStats, max: usize) -> Self {
        let selection = select_important(files, max)
            .into_iter()
            .map(|f| RankedFile {
                score: priority_score(f),
                path: f.path.clone(),
                category: f.category,
                language: f.language.to_string(),
                size: f.size,
            })
            .collect();
        Self { repo, stats, selection }
    }

    pub fn render_text(&self, color: bool) -> String {
        #[derive(Tabled)]
        struct CountRow {
            #[tabled(rename = "Kind")]
            kind: String,
            #[tabled(rename = "Files")]
            files: usize,
        }

        let heading = |s: &str| if color { s.bold().cyan().to_string() } else { s.to_string() };

        let categories: Vec<CountRow> = FileCategory::ALL
            .iter()
            .filter_map(|c| {
                self.stats.by_category.get(c).map(|n| CountRow {
                    kind: c.to_string(),
                    files: *n,
                })
            })
            .collect();
        let languages: Vec<CountRow> = self
            .stats
            .by_language
            .iter()
            .map(|(l, n)| CountRow {
                kind: l.to_string(),
                files: *n,
            })
            .collect();

        let mut out = format!(
            "{}\n{} files, {} bytes ({} skipped as too large)\n\n",
            heading(self.repo.as_str()),
            self.stats.total_files,
            self.stats.total_bytes,
            self.stats.skipped_large
        );

        if self.stats.total_files == 0 {
            out.push_str("No analyzable files found.\n");
            return out;
        }

        out.push_str(&format!("{}\n{}\n\n", heading("Categories"), Table::new(categories).with(Style::rounded())));
        out.push_str(&format!("{}\n{}\n\n", heading("Languages"), Table::new(languages).with(Style::rounded())));
        out.push_str(&format!(
            "{}\n{}\n",
            heading("Selected for analysis"),
            Table::new(&self.selection).with(Style::rounded())
        ));
        out
    }
}

/// `scan` command
pub fn run(args: ScanArgs, ctx: &AppContext) -> Result<()> {
    let mut cfg = load_config()?;
    // scan is offline apart from cloning
    cfg.github.fetch_metadata = false;
    let max = args.max_files.unwrap_or(cfg.selection.max_analysis_files);

    let source = parse_source(&args.repo)?;
    let prepared = prepare(source, &cfg, ctx.quiet)?;

    let report = ScanReport::build(prepared.source.display_url(), &prepared.files, prepared.stats, max);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialize scan report")?);
    } else {
        print!("{}", report.render_text(ctx.color()));
    }
    Ok(())
}
