//! Filepath: src/infra/walk.rs
//! Gitignore-aware file walker used by the repository scanner.
//! - Respects .gitignore, .git/info/exclude, and global gitignore (toggleable)
//! - Prunes well-known build/vendor directories by name at any depth
//! - Extra ignore globs matched on repo-relative paths (early prune + late filter)
//! - Optional hidden file policy
//! - Deterministic ordering for stable tests/CI
//!
//! Backed by ripgrep's `ignore` crate and `globset`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};
use tracing::trace;

/// Gitignore-aware walker with directory-name pruning and extra ignore globs.
pub struct FileWalker
{
    /// Compiled set of additional ignore patterns
    ignore_patterns: GlobSet,

    /// Directory names skipped wherever they appear (".git", "node_modules")
    skip_dirs: HashSet<String>,

    /// Include hidden (dot) files; default true so `.github/` configs are seen
    include_hidden: bool,

    /// Honor ignore files; default true
    respect_gitignore: bool,
}

impl FileWalker
{
    /// Build a walker with additional ignore patterns (e.g. "**/*.min.js").
    /// Patterns match on paths relative to the walk root.
    pub fn new(additional_ignores: &[String]) -> Result<Self>
    {
        let mut builder = GlobSetBuilder::new();

        for pattern in additional_ignores
        {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self {
            ignore_patterns: builder.build()?,
            skip_dirs: HashSet::new(),
            include_hidden: true,
            respect_gitignore: true,
        })
    }

    /// Skip any directory whose name is in `names`
    pub fn with_skip_dirs<I, S>(
        mut self,
        names: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_dirs = names
            .into_iter()
            .map(Into::into)
            .collect();
        self
    }

    /// (Optional) Include or exclude hidden files (dotfiles).
    pub fn with_include_hidden(
        mut self,
        include_hidden: bool,
    ) -> Self
    {
        self.include_hidden = include_hidden;
        self
    }

    /// (Optional) Honor or bypass .gitignore and friends.
    pub fn with_gitignore(
        mut self,
        respect: bool,
    ) -> Self
    {
        self.respect_gitignore = respect;
        self
    }

    /// Internal: construct a configured WalkBuilder for `root`.
    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        // WalkBuilder::hidden(true) => *skip* dotfiles
        b.hidden(!self.include_hidden);

        b.git_ignore(self.respect_gitignore);
        b.git_global(self.respect_gitignore);
        b.git_exclude(self.respect_gitignore);
        b.ignore(self.respect_gitignore);

        // Scratch clones live under temp dirs that may sit inside other repos
        b.parents(false);
        b.require_git(false);

        // Early directory pruning by name and by relative glob
        let skip = self
            .skip_dirs
            .clone();
        let extra = self
            .ignore_patterns
            .clone();
        let root_owned = root.to_path_buf();
        b.filter_entry(move |ent: &DirEntry| {
            // Be conservative on unknown types.
            let is_dir = ent
                .file_type()
                .map(|ft| ft.is_dir())
                .unwrap_or(false);

            if !is_dir || ent.depth() == 0
            {
                return true;
            }

            let named_skip = ent
                .file_name()
                .to_str()
                .is_some_and(|name| skip.contains(name));
            if named_skip
            {
                trace!(dir = %ent.path().display(), "pruned by name");
                return false;
            }

            let rel = ent
                .path()
                .strip_prefix(&root_owned)
                .unwrap_or(ent.path());
            !extra.is_match(rel)
        });

        b
    }

    /// Traverse files under `root`, respecting ignore rules and extra globs.
    /// Returns a **sorted** list of file paths for determinism.
    pub fn walk_files<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<PathBuf>
    {
        let root_path = root.as_ref();
        let walker = self
            .build_walk(root_path)
            .build();

        let mut out: Vec<PathBuf> = walker
            .filter_map(|res| match res
            {
                Ok(entry) => Some(entry),
                Err(e) =>
                {
                    tracing::debug!("walk error: {e}");
                    None
                }
            })
            // Keep only regular files
            .filter(|entry| {
                entry
                    .file_type()
                    .is_some_and(|ft| ft.is_file())
            })
            .map(|entry| entry.into_path())
            // Late file-level extra ignore filtering using RELATIVE path
            .filter(|abs| {
                let rel = abs
                    .strip_prefix(root_path)
                    .unwrap_or(abs);
                !self
                    .ignore_patterns
                    .is_match(rel)
            })
            .collect();

        // Deterministic order (stable CLI & tests)
        out.sort();

        out
    }
}
