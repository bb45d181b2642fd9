use std::fmt::Write as _;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::ReportFormat;
use crate::core::model::{RepositoryAnalysis, Severity};

/// Insights shown in the console report
const TOP_INSIGHTS: usize = 5;

pub fn render(analysis: &RepositoryAnalysis, format: ReportFormat, color: bool) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(analysis, color)),
        ReportFormat::Markdown => Ok(render_markdown(analysis)),
        ReportFormat::Json => render_json(analysis),
    }
}

pub fn render_json(analysis: &RepositoryAnalysis) -> Result<String> {
    serde_json::to_string_pretty(analysis).context("Failed to serialize analysis")
}

#[derive(Tabled)]
struct TechRow {
    #[tabled(rename = "Category")]
    category: &'static str,
    #[tabled(rename = "Technologies")]
    technologies: String,
}

#[derive(Tabled)]
struct ScoreRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Score")]
    score: String,
}

fn tech_rows(a: &RepositoryAnalysis) -> Vec<TechRow> {
    let t = &a.tech_stack;
    [
        ("Languages", &t.languages),
        ("Frameworks", &t.frameworks),
        ("Libraries", &t.libraries),
        ("Tools", &t.tools),
        ("Databases", &t.databases),
    ]
    .into_iter()
    .map(|(category, items)| TechRow {
        category,
        technologies: if items.is_empty() { "-".to_string() } else { items.join(", ") },
    })
    .collect()
}

fn score_rows(a: &RepositoryAnalysis) -> Vec<ScoreRow> {
    [
        ("Documentation", a.documentation_score),
        ("Code Quality", a.code_quality_score),
        ("Maintainability", a.maintainability_score),
    ]
    .into_iter()
    .map(|(metric, score)| ScoreRow {
        metric,
        score: format!("{score:.2}"),
    })
    .collect()
}

fn heading(text: &str, color: bool) -> String {
    if color { text.bold().cyan().to_string() } else { text.to_string() }
}

fn severity_tag(severity: Severity, color: bool) -> String {
    let tag = format!("[{}]", severity.as_str().to_uppercase());
    if !color {
        return tag;
    }
    match severity {
        Severity::Critical => tag.bold().red().to_string(),
        Severity::High => tag.red().to_string(),
        Severity::Medium => tag.yellow().to_string(),
        Severity::Low | Severity::Unknown => tag.blue().to_string(),
    }
}

/// Console report: summary, tables, top insights, recommendations
pub fn render_text(a: &RepositoryAnalysis, color: bool) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", heading("Repository Analysis", color));
    let _ = writeln!(out, "{}\n", a.repo_url);

    let _ = writeln!(out, "{}", heading("Summary", color));
    let _ = writeln!(out, "{}\n", a.summary);

    let _ = writeln!(out, "{}", heading("Technology Stack", color));
    let _ = writeln!(out, "{}\n", Table::new(tech_rows(a)).with(Style::rounded()));

    let _ = writeln!(out, "{}", heading("Quality Scores", color));
    let _ = writeln!(out, "{}\n", Table::new(score_rows(a)).with(Style::rounded()));

    if !a.insights.is_empty() {
        let _ = writeln!(out, "{}", heading("Key Insights", color));
        for (i, insight) in a.insights_by_severity().into_iter().take(TOP_INSIGHTS).enumerate() {
            let _ = write!(out, "{}. {} {}", i + 1, severity_tag(insight.severity, color), insight.description);
            if let Some(loc) = insight.location() {
                let _ = write!(out, " ({loc})");
            }
            out.push('\n');
            if !insight.suggestion.is_empty() {
                let _ = writeln!(out, "   -> {}", insight.suggestion);
            }
        }
        out.push('\n');
    }

    if !a.recommendations.is_empty() {
        let _ = writeln!(out, "{}", heading("Recommendations", color));
        for (i, rec) in a.recommendations.iter().enumerate() {
            let _ = writeln!(out, "{}. {rec}", i + 1);
        }
        out.push('\n');
    }

    let m = &a.metadata;
    let footer = format!(
        "{} files scanned, {} analyzed, ~{} prompt tokens via {} ({} / {})",
        m.files_scanned, m.files_analyzed, m.prompt_tokens, m.provider, m.overview_model, m.detail_model
    );
    let _ = writeln!(out, "{}", if color { footer.dimmed().to_string() } else { footer });

    out
}

fn md_escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

/// Markdown report with every insight
pub fn render_markdown(a: &RepositoryAnalysis) -> String {
    let mut out = String::new();
    let title = a.metadata.repo.full_name.as_deref().unwrap_or(&a.repo_url);

    let _ = writeln!(out, "# Repository analysis: {title}\n");
    let _ = writeln!(out, "{}\n", a.summary);

    let _ = writeln!(out, "## Technology stack\n");
    let _ = writeln!(out, "| Category | Technologies |\n|---|---|");
    for row in tech_rows(a) {
        let _ = writeln!(out, "| {} | {} |", row.category, md_escape_cell(&row.technologies));
    }

    let _ = writeln!(out, "\n## Quality scores\n");
    let _ = writeln!(out, "| Metric | Score |\n|---|---|");
    for row in score_rows(a) {
        let _ = writeln!(out, "| {} | {} |", row.metric, row.score);
    }

    if !a.insights.is_empty() {
        let _ = writeln!(out, "\n## Insights\n");
        for insight in a.insights_by_severity() {
            let _ = write!(
                out,
                "- **{}** ({}) {}",
                insight.severity.as_str().to_uppercase(),
                insight.category,
                insight.description
            );
            if let Some(loc) = insight.location() {
                let _ = write!(out, " `{loc}`");
            }
            out.push('\n');
            if !insight.suggestion.is_empty() {
                let _ = writeln!(out, "  - Suggestion: {}", insight.suggestion);
            }
        }
    }

    if !a.recommendations.is_empty() {
        let _ = writeln!(out, "\n## Recommendations\n");
        for (i, rec) in a.recommendations.iter().enumerate() {
            let _ = writeln!(out, "{}. {rec}", i + 1);
        }
    }

    if !a.trending_comparisons.is_empty() {
        let _ = writeln!(out, "\n## Trend comparisons\n");
        for t in &a.trending_comparisons {
            let _ = writeln!(out, "- {t}");
        }
    }

    let m = &a.metadata;
    let _ = writeln!(
        out,
        "\n---\n_Generated {} by {} ({} / {}); {} of {} files analyzed._",
        m.generated_at.to_rfc3339(),
        m.provider,
        m.overview_model,
        m.detail_model,
        m.files_analyzed,
        m.files_scanned
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{AnalysisMetadata, CodeInsight, InsightCategory, RepoInfo, TechnologyStack};
    use chrono::{TimeZone, Utc};

    fn insight(severity: Severity, description: &str) -> CodeInsight {
        CodeInsight {
            category: InsightCategory::Improvement,
            severity,
            description: description.into(),
            file_path: Some("src/lib.rs".into()),
            line_number: Some(7),
            suggestion: format!("fix {description}"),
        }
    }

    fn sample() -> RepositoryAnalysis {
        RepositoryAnalysis {
            repo_url: "https://github.com/acme/widgets".into(),
            summary: "Widget service".into(),
            tech_stack: TechnologyStack {
                languages: vec!["Rust".into()],
                frameworks: vec!["axum".into()],
                ..TechnologyStack::default()
            },
            insights: vec![
                insight(Severity::Low, "l1"),
                insight(Severity::Critical, "c1"),
                insight(Severity::Medium, "m1"),
                insight(Severity::Low, "l2"),
                insight(Severity::High, "h1"),
                insight(Severity::Unknown, "u1"),
            ],
            documentation_score: 0.456,
            code_quality_score: 0.8,
            maintainability_score: 1.0,
            trending_comparisons: vec![],
            recommendations: vec!["Add CI".into(), "Write docs".into()],
            metadata: AnalysisMetadata {
                provider: "openai".into(),
                overview_model: "gpt-4.1-mini".into(),
                detail_model: "gpt-4.1".into(),
                files_scanned: 12,
                files_analyzed: 5,
                prompt_tokens: 1234,
                generated_at: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
                repo: RepoInfo {
                    full_name: Some("acme/widgets".into()),
                    ..RepoInfo::default()
                },
            },
        }
    }

    #[test]
    fn text_report_orders_and_limits_insights() {
        let out = render_text(&sample(), false);
        assert!(out.contains("Widget service"));
        assert!(out.contains("0.46"));
        assert!(out.contains("1.00"));
        assert!(out.contains("axum"));

        let c = out.find("1. [CRITICAL] c1").unwrap();
        let h = out.find("2. [HIGH] h1").unwrap();
        let m = out.find("3. [MEDIUM] m1").unwrap();
        assert!(c < h && h < m);
        assert!(out.contains("4. [LOW] l1 (src/lib.rs:7)"));
        assert!(out.contains("5. [LOW] l2"));
        assert!(!out.contains("u1"));
        assert!(out.contains("   -> fix c1"));
        assert!(out.contains("2. Write docs"));
        // no ANSI escapes without color
        assert!(!out.contains('\u{1b}'));
    }

    #[test]
    fn colored_report_has_escapes() {
        assert!(render_text(&sample(), true).contains('\u{1b}'));
    }

    #[test]
    fn markdown_lists_everything() {
        let md = render_markdown(&sample());
        assert!(md.starts_with("# Repository analysis: acme/widgets"));
        assert!(md.contains("| Languages | Rust |"));
        assert!(md.contains("| Databases | - |"));
        assert!(md.contains("| Documentation | 0.46 |"));
        assert!(md.contains("- **UNKNOWN** (improvement) u1 `src/lib.rs:7`"));
        assert!(md.contains("2025-01-02T03:04:05+00:00"));
        assert!(!md.contains("Trend comparisons"));
    }

    #[test]
    fn json_round_trips() {
        let a = sample();
        let json = render(&a, ReportFormat::Json, true).unwrap();
        let back: RepositoryAnalysis = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
        assert!(json.contains("\"severity\": \"critical\""));
    }
}
