//! Result schema. Every provider fills the same record.
//!
//! Values come from model output. Deserialization absorbs string/number
//! mixups, odd casing, and nulls rather than rejecting the reply.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Technologies detected in the repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnologyStack {
    #[serde(deserialize_with = "lenient::string_list")]
    pub languages: Vec<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub frameworks: Vec<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub libraries: Vec<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub tools: Vec<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub databases: Vec<String>,
}

impl TechnologyStack {
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
            && self.frameworks.is_empty()
            && self.libraries.is_empty()
            && self.tools.is_empty()
            && self.databases.is_empty()
    }
}

/// Insight severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "minor" | "info" | "trivial" => Severity::Low,
            "medium" | "moderate" | "warning" => Severity::Medium,
            "high" | "major" | "error" => Severity::High,
            "critical" | "blocker" | "severe" => Severity::Critical,
            _ => Severity::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Unknown => "unknown",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(v.as_str().map(Severity::parse_lenient).unwrap_or_default())
    }
}

/// What kind of finding an insight is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightCategory {
    Bug,
    Improvement,
    Architecture,
    Performance,
    Security,
    #[default]
    Other,
}

impl InsightCategory {
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "bug" | "bugs" | "defect" => InsightCategory::Bug,
            "improvement" | "refactor" | "style" | "quality" => InsightCategory::Improvement,
            "architecture" | "design" => InsightCategory::Architecture,
            "performance" | "perf" => InsightCategory::Performance,
            "security" => InsightCategory::Security,
            _ => InsightCategory::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InsightCategory::Bug => "bug",
            InsightCategory::Improvement => "improvement",
            InsightCategory::Architecture => "architecture",
            InsightCategory::Performance => "performance",
            InsightCategory::Security => "security",
            InsightCategory::Other => "other",
        }
    }
}

impl fmt::Display for InsightCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for InsightCategory {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(v.as_str().map(InsightCategory::parse_lenient).unwrap_or_default())
    }
}

/// One flagged issue or suggestion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeInsight {
    pub category: InsightCategory,
    pub severity: Severity,
    #[serde(deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub file_path: Option<String>,
    #[serde(deserialize_with = "lenient::optional_line")]
    pub line_number: Option<u32>,
    #[serde(deserialize_with = "lenient::string")]
    pub suggestion: String,
}

impl CodeInsight {
    /// `path:line`, `path`, or nothing
    pub fn location(&self) -> Option<String> {
        let path = self.file_path.as_deref()?;
        Some(match self.line_number {
            Some(line) => format!("{path}:{line}"),
            None => path.to_string(),
        })
    }
}

/// GitHub repository metadata (subset of `GET /repos/{owner}/{repo}`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoInfo {
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub open_issues_count: u64,
    pub default_branch: Option<String>,
    pub topics: Vec<String>,
    #[serde(deserialize_with = "lenient::license_id")]
    pub license: Option<String>,
}

impl RepoInfo {
    pub fn is_empty(&self) -> bool {
        *self == RepoInfo::default()
    }
}

/// How the analysis was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub provider: String,
    pub overview_model: String,
    pub detail_model: String,
    pub files_scanned: usize,
    pub files_analyzed: usize,
    /// Estimated tokens across all prompts sent
    pub prompt_tokens: usize,
    pub generated_at: DateTime<Utc>,
    pub repo: RepoInfo,
}

/// The final merged record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryAnalysis {
    pub repo_url: String,
    pub summary: String,
    pub tech_stack: TechnologyStack,
    pub insights: Vec<CodeInsight>,
    pub documentation_score: f64,
    pub code_quality_score: f64,
    pub maintainability_score: f64,
    pub trending_comparisons: Vec<String>,
    pub recommendations: Vec<String>,
    pub metadata: AnalysisMetadata,
}

impl RepositoryAnalysis {
    /// Insights ordered most severe first; ties keep reply order
    pub fn insights_by_severity(&self) -> Vec<&CodeInsight> {
        let mut out: Vec<&CodeInsight> = self.insights.iter().collect();
        out.sort_by(|a, b| b.severity.cmp(&a.severity));
        out
    }
}

/// Forgiving field deserializers for model-produced JSON
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn value_to_string(v: &Value) -> Option<String> {
        match v {
            Value::Null => None,
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => Some(other.to_string()),
        }
    }

    /// String, number, or null → String ("" for null)
    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(value_to_string(&v).unwrap_or_default())
    }

    /// Empty strings and "null"/"none" become None
    pub fn optional_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(value_to_string(&v).filter(|s| {
            !s.is_empty() && !s.eq_ignore_ascii_case("null") && !s.eq_ignore_ascii_case("none")
        }))
    }

    /// Integer, float, or numeric string; zero and negatives become None
    pub fn optional_line<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let v = Value::deserialize(d)?;
        let n = match &v {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        Ok(n.filter(|n| *n > 0).and_then(|n| u32::try_from(n).ok()))
    }

    /// Array of scalars, a comma-separated string, or null → Vec<String>
    pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(match v {
            Value::Array(items) => items
                .iter()
                .filter_map(value_to_string)
                .filter(|s| !s.is_empty())
                .collect(),
            Value::String(s) => s
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            _ => Vec::new(),
        })
    }

    /// GitHub nests the license as an object; keep its SPDX id
    pub fn license_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(match v {
            Value::Object(map) => map
                .get("spdx_id")
                .or_else(|| map.get("key"))
                .and_then(|id| id.as_str())
                .map(str::to_string),
            Value::String(s) => Some(s),
            _ => None,
        })
    }
}
