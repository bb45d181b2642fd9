//! File classification and repository scanning.
//!
//! Walks a checkout, keeps files with a known extension under the size cap,
//! reads them in parallel, and tags each with a language and a category.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::infra::config::ScanConfig;
use crate::infra::io::read_file_lossy;
use crate::infra::walk::FileWalker;

/// Broad role a file plays in the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    SourceCode,
    Documentation,
    Configuration,
    Test,
    Asset,
}

impl FileCategory {
    pub const ALL: [FileCategory; 5] = [
        FileCategory::SourceCode,
        FileCategory::Documentation,
        FileCategory::Configuration,
        FileCategory::Test,
        FileCategory::Asset,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileCategory::SourceCode => "source_code",
            FileCategory::Documentation => "documentation",
            FileCategory::Configuration => "configuration",
            FileCategory::Test => "test",
            FileCategory::Asset => "asset",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Languages (and document formats) the scanner recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Cpp,
    C,
    Go,
    Rust,
    Ruby,
    Php,
    Markdown,
    Text,
    Json,
    Yaml,
    Toml,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Markdown => "markdown",
            Language::Text => "text",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Toml => "toml",
        }
    }

    /// Extension lookup (case-sensitive, without the dot)
    pub fn from_extension(ext: &str) -> Option<(Language, FileCategory)> {
        use FileCategory::*;
        let hit = match ext {
            "py" => (Language::Python, SourceCode),
            "js" | "jsx" | "mjs" | "cjs" => (Language::JavaScript, SourceCode),
            "ts" | "tsx" => (Language::TypeScript, SourceCode),
            "java" => (Language::Java, SourceCode),
            "cpp" | "cc" | "cxx" | "hpp" => (Language::Cpp, SourceCode),
            "c" | "h" => (Language::C, SourceCode),
            "go" => (Language::Go, SourceCode),
            "rs" => (Language::Rust, SourceCode),
            "rb" => (Language::Ruby, SourceCode),
            "php" => (Language::Php, SourceCode),
            "md" => (Language::Markdown, Documentation),
            "txt" => (Language::Text, Documentation),
            "json" => (Language::Json, Configuration),
            "yaml" | "yml" => (Language::Yaml, Configuration),
            "toml" => (Language::Toml, Configuration),
            _ => return None,
        };
        Some(hit)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scanned file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeFile {
    /// Repo-relative, `/`-separated
    pub path: String,
    pub content: String,
    pub language: Language,
    /// Byte length of the decoded content
    pub size: usize,
    pub category: FileCategory,
}

impl CodeFile {
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Scanner knobs, usually taken from `[scan]` in the config
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub max_file_size: u64,
    pub skip_dirs: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub include_hidden: bool,
    pub respect_gitignore: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

impl ScanOptions {
    pub fn from_config(cfg: &ScanConfig) -> Self {
        Self {
            max_file_size: cfg.max_file_size,
            skip_dirs: cfg.skip_dirs.clone(),
            ignore_patterns: cfg.ignore_patterns.clone(),
            include_hidden: cfg.include_hidden,
            respect_gitignore: cfg.respect_gitignore,
        }
    }
}

/// Counts over a scan result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanStats {
    pub total_files: usize,
    pub total_bytes: usize,
    pub by_category: BTreeMap<FileCategory, usize>,
    pub by_language: BTreeMap<Language, usize>,
    /// Files with a known extension that exceeded `max_file_size`
    pub skipped_large: usize,
}

impl ScanStats {
    pub fn from_files(files: &[CodeFile]) -> Self {
        let mut stats = ScanStats {
            total_files: files.len(),
            ..Default::default()
        };
        for f in files {
            stats.total_bytes += f.size;
            *stats.by_category.entry(f.category).or_default() += 1;
            *stats.by_language.entry(f.language).or_default() += 1;
        }
        stats
    }
}

/// Languages of source files, most common first
pub fn source_languages(files: &[CodeFile]) -> Vec<String> {
    let mut counts: BTreeMap<Language, usize> = BTreeMap::new();
    for f in files.iter().filter(|f| f.category == FileCategory::SourceCode) {
        *counts.entry(f.language).or_default() += 1;
    }
    let mut ranked: Vec<(Language, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.into_iter().map(|(l, _)| l.as_str().to_string()).collect()
}

const TEST_DIRS: [&str; 3] = ["test", "tests", "__tests__"];

/// Language and category for a repo-relative path, or None if unsupported
pub fn classify_path(rel: &Path) -> Option<(Language, FileCategory)> {
    let ext = rel.extension()?.to_str()?;
    let (language, category) = Language::from_extension(ext)?;

    let name = rel
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_lowercase();

    let in_test_dir = rel.parent().is_some_and(|p| {
        p.components().any(|c| matches!(c, Component::Normal(s) if s.to_str().is_some_and(|s| TEST_DIRS.contains(&s))))
    });

    if name.contains("test") || name.contains("spec") || in_test_dir {
        return Some((language, FileCategory::Test));
    }
    Some((language, category))
}

/// `/`-separated path relative to `root`
fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = rel.components().filter_map(|c| c.as_os_str().to_str()).collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Walk `root` and read every supported file, ordered by path.
pub fn scan_repository(root: &Path, opts: &ScanOptions) -> Result<Vec<CodeFile>> {
    scan_inner(root, opts).map(|(files, _)| files)
}

/// [`scan_repository`] plus counts, including files skipped for size
pub fn scan_with_stats(root: &Path, opts: &ScanOptions) -> Result<(Vec<CodeFile>, ScanStats)> {
    let (files, skipped_large) = scan_inner(root, opts)?;
    let mut stats = ScanStats::from_files(&files);
    stats.skipped_large = skipped_large;
    Ok((files, stats))
}

#[instrument(skip(opts), fields(root = %root.display()))]
fn scan_inner(root: &Path, opts: &ScanOptions) -> Result<(Vec<CodeFile>, usize)> {
    let walker = FileWalker::new(&opts.ignore_patterns)
        .context("Invalid scan.ignore_patterns")?
        .with_skip_dirs(opts.skip_dirs.iter().cloned())
        .with_include_hidden(opts.include_hidden)
        .with_gitignore(opts.respect_gitignore);

    let paths = walker.walk_files(root);
    debug!(candidates = paths.len(), "walk complete");

    let mut targets = Vec::new();
    let mut skipped_large = 0usize;
    for path in paths {
        let Some(rel) = relative_slash_path(root, &path) else {
            continue;
        };
        let Some((language, category)) = classify_path(Path::new(&rel)) else {
            continue;
        };
        match std::fs::metadata(&path) {
            Ok(meta) if meta.len() > opts.max_file_size => {
                debug!(path = %rel, bytes = meta.len(), "skipping large file");
                skipped_large += 1;
            }
            Ok(_) => targets.push((path, rel, language, category)),
            Err(e) => warn!(path = %rel, "cannot stat file: {e}"),
        }
    }

    let mut files: Vec<CodeFile> = targets
        .par_iter()
        .filter_map(|(path, rel, language, category)| match read_file_lossy(path) {
            Ok(content) => Some(CodeFile {
                path: rel.clone(),
                size: content.len(),
                content,
                language: *language,
                category: *category,
            }),
            Err(e) => {
                warn!(path = %rel, "skipping unreadable file: {e:#}");
                None
            }
        })
        .collect();

    files.sort_by(|a, b| a.path.cmp(&b.path));
    info!(files = files.len(), skipped_large, "scan complete");
    Ok((files, skipped_large))
}
