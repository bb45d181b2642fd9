//! Turning model replies into typed records.
//!
//! Replies are supposed to be a bare JSON object but often arrive wrapped in
//! a Markdown fence or with chatter around them. Anything that cannot be
//! recovered degrades to the fallback values instead of an error.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::model::{CodeInsight, TechnologyStack, lenient};
use crate::core::select::truncate_chars;

/// Score used when a reply omits one or it is not a number
pub const DEFAULT_SCORE: f64 = 0.5;

/// Overview summary when nothing usable came back
pub const FALLBACK_SUMMARY: &str = "Repository analysis";

/// How much raw prose to keep when the overview reply is not JSON
const RAW_SUMMARY_CHARS: usize = 500;

/// Stage-1 reply
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OverviewReply {
    #[serde(deserialize_with = "lenient::string")]
    pub summary: String,
    #[serde(deserialize_with = "lenient::string_list")]
    pub primary_tech: Vec<String>,
}

impl Default for OverviewReply {
    fn default() -> Self {
        Self {
            summary: FALLBACK_SUMMARY.to_string(),
            primary_tech: Vec::new(),
        }
    }
}

impl OverviewReply {
    /// Parse stage-1 text. Never fails: prose replies become the summary.
    pub fn parse(raw: &str) -> Self {
        let Some(value) = extract_json_object(raw) else {
            let text = raw.trim();
            if text.is_empty() {
                return Self::default();
            }
            debug!("overview reply is not JSON, keeping it as prose");
            return Self {
                summary: format!("{}...", truncate_chars(text, RAW_SUMMARY_CHARS)),
                primary_tech: Vec::new(),
            };
        };

        let mut reply: OverviewReply = serde_json::from_value(value).unwrap_or_else(|e| {
            warn!("overview reply has unexpected shape: {e}");
            Self::default()
        });
        if reply.summary.trim().is_empty() {
            reply.summary = FALLBACK_SUMMARY.to_string();
        }
        reply
    }
}

/// Stage-2 reply
#[derive(Debug, Clone, PartialEq)]
pub struct DetailReply {
    pub tech_stack: TechnologyStack,
    pub insights: Vec<CodeInsight>,
    pub documentation_score: f64,
    pub code_quality_score: f64,
    pub maintainability_score: f64,
    pub trending_comparisons: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Default for DetailReply {
    fn default() -> Self {
        Self {
            tech_stack: TechnologyStack::default(),
            insights: Vec::new(),
            documentation_score: DEFAULT_SCORE,
            code_quality_score: DEFAULT_SCORE,
            maintainability_score: DEFAULT_SCORE,
            trending_comparisons: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// Loose mirror of [`DetailReply`]; every field keeps its raw JSON so one
/// malformed entry can't sink the others.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDetail {
    tech_stack: Value,
    insights: Value,
    documentation_score: Value,
    code_quality_score: Value,
    maintainability_score: Value,
    trending_comparisons: Value,
    recommendations: Value,
}

impl DetailReply {
    /// Parse stage-2 text, falling back field by field
    pub fn parse(raw: &str) -> Self {
        let Some(value) = extract_json_object(raw) else {
            warn!("detail reply contained no JSON object, using defaults");
            return Self::default();
        };

        let raw: RawDetail = serde_json::from_value(value).unwrap_or_default();

        let tech_stack = serde_json::from_value(raw.tech_stack).unwrap_or_default();

        let insights = match raw.insights {
            Value::Array(items) => items
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|v| serde_json::from_value::<CodeInsight>(v).ok())
                .filter(|i| !i.description.is_empty())
                .collect(),
            _ => Vec::new(),
        };

        Self {
            tech_stack,
            insights,
            documentation_score: normalize_score(&raw.documentation_score),
            code_quality_score: normalize_score(&raw.code_quality_score),
            maintainability_score: normalize_score(&raw.maintainability_score),
            trending_comparisons: string_list(raw.trending_comparisons),
            recommendations: string_list(raw.recommendations),
        }
    }
}

fn string_list(v: Value) -> Vec<String> {
    lenient::string_list(v).unwrap_or_default()
}

/// Scores belong in [0, 1]. Values in (1, 100] are read as percentages.
pub fn normalize_score(v: &Value) -> f64 {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };

    match n {
        Some(n) if n.is_finite() => {
            let n = if n > 1.0 && n <= 100.0 { n / 100.0 } else { n };
            n.clamp(0.0, 1.0)
        }
        _ => DEFAULT_SCORE,
    }
}

/// Find the JSON object in a model reply.
///
/// Tries the whole reply, then a fenced code block, then the first balanced
/// `{...}` span. Only objects are accepted.
pub fn extract_json_object(raw: &str) -> Option<Value> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let candidates = [Some(text), strip_code_fence(text), first_balanced_object(text)];
    candidates
        .into_iter()
        .flatten()
        .find_map(|c| serde_json::from_str::<Value>(c).ok().filter(Value::is_object))
}

/// Body of the first ``` fence, ignoring an info string like `json`
fn strip_code_fence(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n').map(|i| i + 1)?;
    let body = &after[body_start..];
    let end = body.find("```").unwrap_or(body.len());
    Some(body[..end].trim())
}

/// First `{ ... }` whose braces balance, ignoring braces inside strings
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
