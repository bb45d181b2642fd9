//! Heuristic file ranking and content reduction for prompts

use crate::core::classify::{CodeFile, FileCategory};

/// File names that usually mark an entry point
const ENTRY_POINTS: [&str; 8] = [
    "main.py",
    "app.py",
    "__init__.py",
    "index.js",
    "index.ts",
    "main.rs",
    "lib.rs",
    "main.go",
];

const CONFIG_EXTENSIONS: [&str; 4] = [".json", ".yaml", ".yml", ".toml"];

/// Trimmed-line prefixes treated as comments
const COMMENT_PREFIXES: [&str; 6] = ["#", "//", "/*", "*", "*/", "<!--"];

/// Trimmed-line prefixes treated as imports
const IMPORT_PREFIXES: [&str; 5] = ["import ", "from ", "require(", "import{", "import {"];

/// Additive importance score; higher is analyzed first
pub fn priority_score(file: &CodeFile) -> u32 {
    let mut score = 0;

    if ENTRY_POINTS.contains(&file.file_name()) {
        score += 100;
    }

    let looks_like_config = CONFIG_EXTENSIONS.iter().any(|ext| file.path.ends_with(ext))
        || file.file_name().contains(".config");
    if looks_like_config {
        score += 50;
    }

    if file.path.matches('/').count() <= 1 {
        score += 30;
    }

    if file.size > 1000 {
        score += 20;
    }

    if file.category == FileCategory::SourceCode {
        score += 10;
    }

    score
}

/// Up to `max` files, highest score first. Ties keep input order.
pub fn select_important(files: &[CodeFile], max: usize) -> Vec<&CodeFile> {
    let mut ranked: Vec<(u32, &CodeFile)> = files.iter().map(|f| (priority_score(f), f)).collect();
    // sort_by is stable
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked.into_iter().take(max).map(|(_, f)| f).collect()
}

fn is_noise(trimmed: &str) -> bool {
    if trimmed.is_empty() {
        return true;
    }
    if COMMENT_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return true;
    }
    if IMPORT_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return true;
    }
    trimmed.starts_with("const ") && trimmed.contains("require(")
}

/// Keep the first `max_lines` lines that are neither blank, comments, nor imports
pub fn extract_key_content(content: &str, max_lines: usize) -> String {
    content
        .lines()
        .filter(|line| !is_noise(line.trim()))
        .take(max_lines)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prefix of at most `max` characters, cut on a char boundary
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// What of `file` goes into the detail prompt
pub fn reduce_for_prompt(file: &CodeFile, max_chars: usize, max_lines: usize) -> String {
    match file.category {
        FileCategory::SourceCode => extract_key_content(&file.content, max_lines),
        _ => truncate_chars(&file.content, max_chars).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classify::Language;
    use proptest::prelude::*;

    fn file(path: &str, size: usize, category: FileCategory) -> CodeFile {
        CodeFile {
            path: path.to_string(),
            content: "x".repeat(size),
            language: Language::Python,
            size,
            category,
        }
    }

    #[test]
    fn score_components_add_up() {
        // entry point + shallow + large + source
        assert_eq!(priority_score(&file("src/main.py", 2000, FileCategory::SourceCode)), 160);
        // config + shallow
        assert_eq!(priority_score(&file("package.json", 10, FileCategory::Configuration)), 80);
        // ".config" in name, deep
        assert_eq!(
            priority_score(&file("a/b/webpack.config.js", 10, FileCategory::SourceCode)),
            60
        );
        // deep doc
        assert_eq!(priority_score(&file("docs/guide/intro.md", 10, FileCategory::Documentation)), 0);
        // entry point matched on name only
        assert_eq!(priority_score(&file("src/domain.py", 10, FileCategory::SourceCode)), 40);
    }

    #[test]
    fn selection_is_bounded_and_stable() {
        let files = vec![
            file("docs/a/x.md", 10, FileCategory::Documentation),
            file("src/main.rs", 10, FileCategory::SourceCode),
            file("b.py", 10, FileCategory::SourceCode),
            file("a.py", 10, FileCategory::SourceCode),
        ];
        let picked: Vec<&str> = select_important(&files, 3).iter().map(|f| f.path.as_str()).collect();
        assert_eq!(picked, vec!["src/main.rs", "b.py", "a.py"]);

        assert!(select_important(&files, 0).is_empty());
        assert!(select_important(&[], 5).is_empty());
        assert_eq!(select_important(&files, 99).len(), 4);
    }

    #[test]
    fn key_content_skips_noise() {
        let src = "\
#!/usr/bin/env python
import os
from typing import List
const fs = require('fs');

    # indented comment
def main():
    // not python but skipped
    return os.getcwd()
/* block */
 * star
<!-- html -->
print(main())";
        assert_eq!(
            extract_key_content(src, 50),
            "def main():\n    return os.getcwd()\nprint(main())"
        );
        assert_eq!(extract_key_content(src, 1), "def main():");
        assert_eq!(extract_key_content("", 50), "");
    }

    #[test]
    fn reduce_depends_on_category() {
        let mut f = file("README.md", 0, FileCategory::Documentation);
        f.content = "# Title\nbody".into();
        assert_eq!(reduce_for_prompt(&f, 3, 50), "# T");

        f.category = FileCategory::SourceCode;
        assert_eq!(reduce_for_prompt(&f, 3, 50), "body");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("日本語", 5), "日本語");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    proptest! {
        #[test]
        fn truncate_is_a_bounded_prefix(s in ".*", max in 0usize..64) {
            let out = truncate_chars(&s, max);
            prop_assert!(s.starts_with(out));
            prop_assert!(out.chars().count() <= max);
            prop_assert_eq!(out.chars().count(), s.chars().count().min(max));
        }

        #[test]
        fn selection_never_exceeds_max(n in 0usize..30, max in 0usize..40) {
            let files: Vec<CodeFile> = (0..n)
                .map(|i| file(&format!("d{i}/f{i}.py"), i * 100, FileCategory::SourceCode))
                .collect();
            let picked = select_important(&files, max);
            prop_assert_eq!(picked.len(), n.min(max));
            let scores: Vec<u32> = picked.iter().map(|f| priority_score(f)).collect();
            prop_assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        }
    }
}
