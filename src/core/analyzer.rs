//! Two-stage analysis: a cheap overview pass, then a detailed pass over the
//! highest-ranked files. Provider failures degrade to fallback values; they
//! never abort an analysis.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::core::budget::TokenCounter;
use crate::core::classify::{CodeFile, source_languages};
use crate::core::model::{AnalysisMetadata, RepoInfo, RepositoryAnalysis};
use crate::core::prompt;
use crate::core::reply::{DetailReply, OverviewReply};
use crate::core::select::{reduce_for_prompt, select_important};
use crate::infra::config::Config;
use crate::llm::{CompletionRequest, LlmProvider, ProviderError, Stage};

/// Knobs for prompt building and provider calls
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub temperature: f32,
    pub summary_max_tokens: u32,
    pub overview_max_tokens: u32,
    pub detail_max_tokens: u32,
    pub max_prompt_tokens: usize,
    pub token_encoding: String,
    pub max_analysis_files: usize,
    pub max_file_content_chars: usize,
    pub key_lines: usize,
    pub overview_files: usize,
    pub files_per_category: usize,
    pub summarize_large_files: bool,
}

impl AnalyzerSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            temperature: cfg.llm.temperature,
            summary_max_tokens: cfg.llm.summary_max_tokens,
            overview_max_tokens: cfg.llm.overview_max_tokens,
            detail_max_tokens: cfg.llm.detail_max_tokens,
            max_prompt_tokens: cfg.llm.max_prompt_tokens,
            token_encoding: cfg.llm.token_encoding.clone(),
            max_analysis_files: cfg.selection.max_analysis_files,
            max_file_content_chars: cfg.selection.max_file_content_chars,
            key_lines: cfg.selection.key_lines,
            overview_files: cfg.selection.overview_files,
            files_per_category: cfg.selection.files_per_category,
            summarize_large_files: cfg.llm.summarize_large_files,
        }
    }
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Stage-2 prompt and how many files made it in
#[derive(Debug, Clone)]
pub struct DetailPrompt {
    pub prompt: String,
    pub files: Vec<String>,
}

/// Builds prompts without talking to a provider (also used by `--dry-run`)
pub struct PromptPlanner {
    settings: AnalyzerSettings,
    counter: TokenCounter,
}

impl PromptPlanner {
    pub fn new(settings: AnalyzerSettings) -> Result<Self> {
        let counter = TokenCounter::new(&settings.token_encoding)?;
        Ok(Self { settings, counter })
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    /// Files that get a summary line in the overview
    pub fn overview_candidates<'f>(&self, files: &'f [CodeFile]) -> Vec<&'f CodeFile> {
        select_important(files, self.settings.overview_files)
    }

    /// Whether a file is long enough to be worth an LLM summary
    pub fn is_large(&self, file: &CodeFile) -> bool {
        file.content.chars().count() > self.settings.max_file_content_chars
    }

    pub fn overview_prompt(
        &self,
        repo_url: &str,
        info: &RepoInfo,
        files: &[CodeFile],
        summaries: &[String],
    ) -> String {
        let context = prompt::overview_context(
            info,
            files,
            summaries,
            self.settings.files_per_category,
            self.settings.overview_files,
        );
        prompt::overview_prompt(repo_url, &context)
    }

    /// Select, reduce, and fit the key files under `max_prompt_tokens`.
    /// The instructions and schema are reserved up front; only the summary
    /// and file sections compete for the rest.
    pub fn detail_prompt(&self, summary: &str, files: &[CodeFile]) -> DetailPrompt {
        let s = &self.settings;
        let instructions = prompt::detail_instructions();
        let remaining = s.max_prompt_tokens.saturating_sub(self.counter.count(&instructions));

        let mut sections = vec![prompt::detail_summary(summary)];
        sections.extend(select_important(files, s.max_analysis_files).into_iter().map(|f| {
            let body = reduce_for_prompt(f, s.max_file_content_chars, s.key_lines);
            prompt::detail_file_section(&f.path, &body)
        }));

        let fitted = self.counter.fit_sections(sections, remaining);
        DetailPrompt {
            prompt: instructions + &prompt::join_sections(&fitted),
            files: fitted.into_iter().skip(1).map(|s| s.label).collect(),
        }
    }
}

/// `"<path>: <language> file (<size> bytes)"`
pub fn plain_summary(file: &CodeFile) -> String {
    format!("{}: {} file ({} bytes)", file.path, file.language, file.size)
}

/// Runs both stages against one provider
pub struct RepoAnalyzer<'p> {
    provider: &'p dyn LlmProvider,
    planner: PromptPlanner,
    prompt_tokens: AtomicUsize,
}

impl<'p> RepoAnalyzer<'p> {
    pub fn new(provider: &'p dyn LlmProvider, settings: AnalyzerSettings) -> Result<Self> {
        Ok(Self {
            provider,
            planner: PromptPlanner::new(settings)?,
            prompt_tokens: AtomicUsize::new(0),
        })
    }

    fn settings(&self) -> &AnalyzerSettings {
        self.planner.settings()
    }

    fn call(&self, stage: Stage, prompt: String, max_tokens: u32) -> Result<String, ProviderError> {
        let tokens = self.planner.count_tokens(&prompt);
        self.prompt_tokens.fetch_add(tokens, Ordering::Relaxed);
        debug!(stage = stage.as_str(), tokens, "prompt built");

        self.provider.complete(&CompletionRequest {
            stage,
            prompt,
            max_tokens,
            temperature: self.settings().temperature,
        })
    }

    /// One line per top-ranked file; large files optionally summarized by the model
    pub fn summarize_files(&self, files: &[CodeFile]) -> Vec<String> {
        let s = self.settings();
        let candidates = self.planner.overview_candidates(files);

        candidates
            .par_iter()
            .map(|f| {
                if !(s.summarize_large_files && self.planner.is_large(f)) {
                    return plain_summary(f);
                }
                let prompt = prompt::summary_prompt(f, s.max_file_content_chars);
                match self.call(Stage::Summary, prompt, s.summary_max_tokens) {
                    Ok(text) if !text.trim().is_empty() => format!("{}: {}", f.path, text.trim()),
                    Ok(_) => format!("{}: Large {} file ({} bytes)", f.path, f.language, f.size),
                    Err(e) => {
                        warn!(path = %f.path, "summary failed: {e}");
                        format!("{}: Large {} file ({} bytes)", f.path, f.language, f.size)
                    }
                }
            })
            .collect()
    }

    /// Stage 1
    #[instrument(skip_all)]
    pub fn overview(&self, repo_url: &str, info: &RepoInfo, files: &[CodeFile]) -> OverviewReply {
        let summaries = self.summarize_files(files);
        let prompt = self.planner.overview_prompt(repo_url, info, files, &summaries);

        match self.call(Stage::Overview, prompt, self.settings().overview_max_tokens) {
            Ok(text) => OverviewReply::parse(&text),
            Err(e) => {
                warn!("overview stage failed, using fallback: {e}");
                OverviewReply::default()
            }
        }
    }

    /// Stage 2; also returns the paths that fit into the prompt
    #[instrument(skip_all)]
    pub fn detail(&self, overview: &OverviewReply, files: &[CodeFile]) -> (DetailReply, Vec<String>) {
        let plan = self.planner.detail_prompt(&overview.summary, files);
        debug!(files = plan.files.len(), "detail prompt fitted");

        let reply = match self.call(Stage::Detail, plan.prompt, self.settings().detail_max_tokens) {
            Ok(text) => DetailReply::parse(&text),
            Err(e) => {
                warn!("detail stage failed, using fallback: {e}");
                DetailReply::default()
            }
        };
        (reply, plan.files)
    }

    /// Both stages, merged into one record
    pub fn analyze(&self, repo_url: &str, info: &RepoInfo, files: &[CodeFile]) -> RepositoryAnalysis {
        info!(files = files.len(), provider = self.provider.name(), "stage 1: overview");
        let overview = self.overview(repo_url, info, files);

        info!("stage 2: detailed analysis");
        let (detail, analyzed) = self.detail(&overview, files);

        let mut tech_stack = detail.tech_stack;
        if tech_stack.languages.is_empty() {
            tech_stack.languages = if overview.primary_tech.is_empty() {
                source_languages(files)
            } else {
                overview.primary_tech.clone()
            };
        }

        RepositoryAnalysis {
            repo_url: repo_url.to_string(),
            summary: overview.summary,
            tech_stack,
            insights: detail.insights,
            documentation_score: detail.documentation_score,
            code_quality_score: detail.code_quality_score,
            maintainability_score: detail.maintainability_score,
            trending_comparisons: detail.trending_comparisons,
            recommendations: detail.recommendations,
            metadata: AnalysisMetadata {
                provider: self.provider.name().to_string(),
                overview_model: self.provider.model(Stage::Overview).to_string(),
                detail_model: self.provider.model(Stage::Detail).to_string(),
                files_scanned: files.len(),
                files_analyzed: analyzed.len(),
                prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
                generated_at: Utc::now(),
                repo: info.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classify::{FileCategory, Language};
    use crate::core::model::Severity;
    use crate::core::reply::{DEFAULT_SCORE, FALLBACK_SUMMARY};
    use std::sync::Mutex;

    type Script = Box<dyn Fn(&CompletionRequest) -> Result<String, ProviderError> + Send + Sync>;

    struct ScriptedProvider {
        script: Script,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn new(script: impl Fn(&CompletionRequest) -> Result<String, ProviderError> + Send + Sync + 'static) -> Self {
            Self {
                script: Box::new(script),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn stages(&self) -> Vec<Stage> {
            self.seen.lock().unwrap().iter().map(|r| r.stage).collect()
        }
    }

    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self, stage: Stage) -> &str {
            match stage {
                Stage::Detail => "big",
                _ => "small",
            }
        }

        fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
            self.seen.lock().unwrap().push(request.clone());
            (self.script)(request)
        }
    }

    fn file(path: &str, content: &str, language: Language, category: FileCategory) -> CodeFile {
        CodeFile {
            path: path.into(),
            content: content.into(),
            language,
            size: content.len(),
            category,
        }
    }

    fn repo() -> Vec<CodeFile> {
        vec![
            file("README.md", "# Demo\nA tiny service", Language::Markdown, FileCategory::Documentation),
            file("app.py", "import os\ndef run():\n    return 1\n", Language::Python, FileCategory::SourceCode),
            file("pyproject.toml", "[project]\nname='demo'", Language::Toml, FileCategory::Configuration),
            file("tests/test_app.py", "def test_run(): pass", Language::Python, FileCategory::Test),
        ]
    }

    const DETAIL_JSON: &str = r#"{
        "tech_stack": {"languages": ["Python"], "frameworks": ["Flask"]},
        "insights": [
            {"category": "bug", "severity": "low", "description": "minor", "suggestion": "s1"},
            {"category": "security", "severity": "critical", "description": "secret in repo", "file_path": "app.py", "line_number": 3, "suggestion": "rotate"}
        ],
        "documentation_score": 0.4,
        "code_quality_score": 0.8,
        "maintainability_score": 0.7,
        "recommendations": ["add tests"]
    }"#;

    #[test]
    fn stages_are_merged() {
        let provider = ScriptedProvider::new(|req| match req.stage {
            Stage::Overview => Ok(r#"{"summary": "A demo service", "primary_tech": ["Python"]}"#.into()),
            Stage::Detail => Ok(format!("```json\n{DETAIL_JSON}\n```")),
            Stage::Summary => Err(ProviderError::Unknown("unexpected".into())),
        });
        let analyzer = RepoAnalyzer::new(&provider, AnalyzerSettings::default()).unwrap();
        let files = repo();

        let a = analyzer.analyze("https://github.com/acme/demo", &RepoInfo::default(), &files);

        assert_eq!(provider.stages(), vec![Stage::Overview, Stage::Detail]);
        assert_eq!(a.summary, "A demo service");
        assert_eq!(a.tech_stack.frameworks, vec!["Flask"]);
        assert_eq!(a.insights.len(), 2);
        assert_eq!(a.insights_by_severity()[0].severity, Severity::Critical);
        assert_eq!(a.code_quality_score, 0.8);
        assert_eq!(a.recommendations, vec!["add tests"]);
        assert_eq!(a.metadata.provider, "scripted");
        assert_eq!(a.metadata.detail_model, "big");
        assert_eq!(a.metadata.files_scanned, 4);
        assert_eq!(a.metadata.files_analyzed, 4);
        assert!(a.metadata.prompt_tokens > 0);
    }

    #[test]
    fn request_parameters_follow_settings() {
        let provider = ScriptedProvider::new(|_| Ok("{}".into()));
        let analyzer = RepoAnalyzer::new(&provider, AnalyzerSettings::default()).unwrap();
        analyzer.analyze("u", &RepoInfo::default(), &repo());

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].max_tokens, 300);
        assert_eq!(seen[1].max_tokens, 1500);
        assert!(seen[0].prompt.contains("Analyze this repository: u"));
        assert!(seen[0].prompt.contains("app.py: python file"));
        assert!(seen[1].prompt.contains("\napp.py:\ndef run():\n    return 1\n---\n"));
    }

    #[test]
    fn failures_fall_back() {
        let provider = ScriptedProvider::new(|_| Err(ProviderError::Network("down".into())));
        let analyzer = RepoAnalyzer::new(&provider, AnalyzerSettings::default()).unwrap();
        let a = analyzer.analyze("u", &RepoInfo::default(), &repo());

        assert_eq!(a.summary, FALLBACK_SUMMARY);
        assert!(a.insights.is_empty());
        assert_eq!(a.documentation_score, DEFAULT_SCORE);
        // no model languages: classifier's source languages
        assert_eq!(a.tech_stack.languages, vec!["python"]);
    }

    #[test]
    fn languages_fall_back_to_overview() {
        let provider = ScriptedProvider::new(|req| match req.stage {
            Stage::Overview => Ok(r#"{"summary": "s", "primary_tech": ["Go", "gRPC"]}"#.into()),
            _ => Ok(r#"{"tech_stack": {"languages": []}}"#.into()),
        });
        let analyzer = RepoAnalyzer::new(&provider, AnalyzerSettings::default()).unwrap();
        let a = analyzer.analyze("u", &RepoInfo::default(), &repo());
        assert_eq!(a.tech_stack.languages, vec!["Go", "gRPC"]);
    }

    #[test]
    fn large_files_are_summarized_when_enabled() {
        let provider = ScriptedProvider::new(|req| match req.stage {
            Stage::Summary => Ok("Does heavy lifting.".into()),
            _ => Err(ProviderError::ServerError("500".into())),
        });
        let settings = AnalyzerSettings {
            summarize_large_files: true,
            max_file_content_chars: 10,
            ..AnalyzerSettings::default()
        };
        let analyzer = RepoAnalyzer::new(&provider, settings).unwrap();

        let files = vec![
            file("big.py", &"x = 1\n".repeat(10), Language::Python, FileCategory::SourceCode),
            file("s.py", "y", Language::Python, FileCategory::SourceCode),
        ];
        let lines = analyzer.summarize_files(&files);
        assert_eq!(lines, vec!["big.py: Does heavy lifting.", "s.py: python file (1 bytes)"]);
    }

    #[test]
    fn failed_summary_uses_size_line() {
        let provider = ScriptedProvider::new(|_| Err(ProviderError::Authentication("no".into())));
        let settings = AnalyzerSettings {
            summarize_large_files: true,
            max_file_content_chars: 1,
            ..AnalyzerSettings::default()
        };
        let analyzer = RepoAnalyzer::new(&provider, settings).unwrap();
        let files = vec![file("main.go", "package main", Language::Go, FileCategory::SourceCode)];
        assert_eq!(analyzer.summarize_files(&files), vec!["main.go: Large go file (12 bytes)"]);
    }

    #[test]
    fn empty_scan_still_runs_both_stages() {
        let provider = ScriptedProvider::new(|_| Ok("{}".into()));
        let analyzer = RepoAnalyzer::new(&provider, AnalyzerSettings::default()).unwrap();
        let a = analyzer.analyze("u", &RepoInfo::default(), &[]);
        assert_eq!(provider.stages().len(), 2);
        assert_eq!(a.metadata.files_analyzed, 0);
        assert!(a.tech_stack.languages.is_empty());
    }

    #[test]
    fn detail_prompt_respects_budget() {
        let settings = AnalyzerSettings {
            max_prompt_tokens: 400,
            ..AnalyzerSettings::default()
        };
        let planner = PromptPlanner::new(settings).unwrap();
        let files: Vec<CodeFile> = (0..5)
            .map(|i| {
                file(
                    &format!("f{i}.md"),
                    &"lorem ipsum ".repeat(200),
                    Language::Markdown,
                    FileCategory::Documentation,
                )
            })
            .collect();
        let plan = planner.detail_prompt("s", &files);
        assert!(planner.count_tokens(&plan.prompt) <= 400);
        assert!(plan.files.len() < 5);
    }

    #[test]
    fn tight_budget_trims_summary_not_schema() {
        let instructions = prompt::detail_instructions();
        let planner = PromptPlanner::new(AnalyzerSettings::default()).unwrap();
        let reserved = planner.count_tokens(&instructions);

        let settings = AnalyzerSettings {
            max_prompt_tokens: reserved + 5,
            ..AnalyzerSettings::default()
        };
        let planner = PromptPlanner::new(settings).unwrap();
        let files = vec![file("app.py", "def run():\n    return 1\n", Language::Python, FileCategory::SourceCode)];
        let summary = "word ".repeat(200);

        let plan = planner.detail_prompt(&summary, &files);
        assert!(plan.prompt.starts_with(&instructions));
        assert!(plan.prompt.contains("\"recommendations\": [\"actionable recommendation\"]\n}"));
        assert!(plan.prompt.len() < instructions.len() + summary.len());
        assert!(plan.files.is_empty());
    }
}
