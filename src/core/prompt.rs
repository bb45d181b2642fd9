//! Prompt templates for each stage

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::core::budget::Section;
use crate::core::classify::{CodeFile, FileCategory};
use crate::core::model::RepoInfo;
use crate::core::select::truncate_chars;

const DETAIL_SCHEMA: &str = r#"{
  "tech_stack": {"languages": [], "frameworks": [], "libraries": [], "tools": [], "databases": []},
  "insights": [
    {"category": "bug|improvement|architecture|performance|security", "severity": "low|medium|high|critical",
     "description": "what is wrong", "file_path": "path/to/file", "line_number": null, "suggestion": "how to fix it"}
  ],
  "documentation_score": 0.75,
  "code_quality_score": 0.85,
  "maintainability_score": 0.80,
  "trending_comparisons": ["how the stack compares with current practice"],
  "recommendations": ["actionable recommendation"]
}"#;

/// Stage 0: one large file → 2-3 sentences
pub fn summary_prompt(file: &CodeFile, max_chars: usize) -> String {
    format!(
        "Summarize this {} file in 2-3 sentences:\n{}",
        file.language,
        truncate_chars(&file.content, max_chars)
    )
}

/// Repository facts plus the file layout grouped by category
pub fn overview_context(
    info: &RepoInfo,
    files: &[CodeFile],
    summaries: &[String],
    per_category: usize,
    max_summaries: usize,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Repository: {}", info.name.as_deref().unwrap_or("Unknown"));
    let _ = writeln!(
        out,
        "Description: {}",
        info.description.as_deref().unwrap_or("No description")
    );
    let _ = writeln!(out, "Language: {}", info.language.as_deref().unwrap_or("Multiple"));
    let _ = writeln!(out, "Stars: {}", info.stargazers_count);
    let _ = writeln!(out, "Forks: {}", info.forks_count);
    if !info.topics.is_empty() {
        let _ = writeln!(out, "Topics: {}", info.topics.join(", "));
    }

    let mut groups: BTreeMap<FileCategory, Vec<&CodeFile>> = BTreeMap::new();
    for f in files {
        groups.entry(f.category).or_default().push(f);
    }

    out.push_str("\nFile Structure:\n");
    if groups.is_empty() {
        out.push_str("  (no analyzable files)\n");
    }
    for (category, group) in &groups {
        let _ = writeln!(out, "{} files ({}):", category, group.len());
        for f in group.iter().take(per_category) {
            let _ = writeln!(out, "  - {} ({}, {} bytes)", f.path, f.language, f.size);
        }
    }

    if !summaries.is_empty() {
        out.push_str("\nFiles:\n");
        for s in summaries.iter().take(max_summaries) {
            let _ = writeln!(out, "{s}");
        }
    }

    out
}

/// Stage 1: summary and primary technologies
pub fn overview_prompt(repo_url: &str, context: &str) -> String {
    format!(
        "Analyze this repository: {repo_url}\n{context}\n\
         Provide a brief overview as JSON:\n\
         {{\"summary\": \"brief description\", \"primary_tech\": [\"main technologies\"]}}"
    )
}

/// Stage 2 instructions and the reply schema. Never trimmed.
pub fn detail_instructions() -> String {
    format!(
        "Analyze these key files and provide analysis as JSON with exactly this shape:\n\
         {DETAIL_SCHEMA}\n\
         Scores are between 0 and 1.\n\n"
    )
}

/// Stage-1 summary leading the file list; trimmed first when over budget
pub fn detail_summary(summary: &str) -> Section {
    Section::new("summary", format!("Repository: {summary}\n\nKey Files:\n"))
}

/// One reduced file in the stage-2 prompt
pub fn detail_file_section(path: &str, content: &str) -> Section {
    Section::new(path, format!("\n{path}:\n{content}\n---\n"))
}

pub fn join_sections(sections: &[Section]) -> String {
    sections.iter().map(|s| s.text.as_str()).collect()
}
