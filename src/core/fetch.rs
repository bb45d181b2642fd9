//! Getting a working tree to scan, plus optional GitHub metadata.
//!
//! Remote repositories are cloned into a scratch directory that lives as long
//! as the [`Checkout`]; local directories are used in place.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use git2::build::RepoBuilder;
use git2::{Cred, FetchOptions, RemoteCallbacks};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::core::model::RepoInfo;
use crate::infra::config::GitHubConfig;

const GITHUB_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not a directory, GitHub slug, or git URL: {0}")]
    InvalidSource(String),

    #[error("failed to clone {url}: {source}")]
    Clone {
        url: String,
        #[source]
        source: git2::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub returned {status} for {url}")]
    Status { status: u16, url: String },
}

/// `owner/repo` on GitHub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubSlug {
    pub owner: String,
    pub repo: String,
}

impl GitHubSlug {
    fn new(owner: &str, repo: &str) -> Option<Self> {
        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        let valid = |s: &str| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };
        (valid(owner) && valid(repo)).then(|| Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    pub fn https_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for GitHubSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// What the user asked us to analyze
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSource {
    Remote { url: String, slug: Option<GitHubSlug> },
    Local(PathBuf),
}

const REMOTE_SCHEMES: [&str; 5] = ["http://", "https://", "ssh://", "git://", "file://"];

impl RepoSource {
    pub fn parse(arg: &str) -> Result<Self, FetchError> {
        let arg = arg.trim();
        if arg.is_empty() {
            return Err(FetchError::InvalidSource("empty repository argument".into()));
        }

        let as_path = Path::new(arg);
        if as_path.is_dir() {
            return Ok(RepoSource::Local(dunce::canonicalize(as_path)?));
        }

        if let Some(slug) = parse_github(arg) {
            return Ok(RepoSource::Remote {
                url: slug.https_url(),
                slug: Some(slug),
            });
        }

        // `git@github.com:owner/repo.git` keeps its ssh form for cloning
        if let Some(rest) = arg.strip_prefix("git@github.com:")
            && let Some((owner, repo)) = rest.split_once('/')
            && let Some(slug) = GitHubSlug::new(owner, repo.trim_end_matches('/'))
        {
            return Ok(RepoSource::Remote {
                url: arg.to_string(),
                slug: Some(slug),
            });
        }

        if REMOTE_SCHEMES.iter().any(|s| arg.starts_with(s)) {
            return Ok(RepoSource::Remote {
                url: arg.to_string(),
                slug: None,
            });
        }

        // owner/repo shorthand
        if !arg.contains(':')
            && let Some((owner, repo)) = arg.split_once('/')
            && !repo.contains('/')
            && let Some(slug) = GitHubSlug::new(owner, repo)
        {
            return Ok(RepoSource::Remote {
                url: slug.https_url(),
                slug: Some(slug),
            });
        }

        Err(FetchError::InvalidSource(arg.to_string()))
    }

    pub fn slug(&self) -> Option<&GitHubSlug> {
        match self {
            RepoSource::Remote { slug, .. } => slug.as_ref(),
            RepoSource::Local(_) => None,
        }
    }

    /// URL or path as shown in reports
    pub fn display_url(&self) -> String {
        match self {
            RepoSource::Remote { url, .. } => url.clone(),
            RepoSource::Local(path) => path.display().to_string(),
        }
    }
}

/// `http(s)://[www.]github.com/owner/repo[.git][/...]`
fn parse_github(arg: &str) -> Option<GitHubSlug> {
    let rest = ["https://", "http://"]
        .iter()
        .find_map(|scheme| arg.strip_prefix(scheme))?;
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    let rest = rest.strip_prefix("github.com/")?;

    let mut parts = rest.split('/');
    let owner = parts.next()?;
    let repo = parts.next()?;
    GitHubSlug::new(owner, repo)
}

/// A working tree ready to scan
#[derive(Debug)]
pub struct Checkout {
    root: PathBuf,
    /// Held for cloned repositories; dropping it deletes the clone
    scratch: Option<TempDir>,
}

impl Checkout {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_temporary(&self) -> bool {
        self.scratch.is_some()
    }
}

/// Clone remotes into a fresh temp dir; use local directories in place
pub fn checkout(source: &RepoSource, depth: u32) -> Result<Checkout, FetchError> {
    match source {
        RepoSource::Local(path) => Ok(Checkout {
            root: path.clone(),
            scratch: None,
        }),
        RepoSource::Remote { url, .. } => {
            let scratch = tempfile::Builder::new().prefix("repolens-").tempdir()?;
            let dest = scratch.path().join("repo");
            let root = clone_repository(url, &dest, depth)?;
            Ok(Checkout {
                root,
                scratch: Some(scratch),
            })
        }
    }
}

/// Local transports reject shallow fetches
fn supports_shallow(url: &str) -> bool {
    !url.starts_with("file://") && (url.contains("://") || url.contains('@'))
}

/// Clone `url` into `dest`, shallow for network remotes when `depth > 0`
#[instrument(skip(dest), fields(dest = %dest.display()))]
pub fn clone_repository(url: &str, dest: &Path, depth: u32) -> Result<PathBuf, FetchError> {
    if dest.exists() {
        debug!("removing existing clone destination");
        fs::remove_dir_all(dest)?;
    }

    let mut callbacks = RemoteCallbacks::new();
    // libgit2 re-asks on failure; one agent attempt only
    let mut asked = false;
    callbacks.credentials(move |_url, username, _allowed| {
        if asked {
            return Err(git2::Error::from_str("ssh-agent authentication failed"));
        }
        asked = true;
        Cred::ssh_key_from_agent(username.unwrap_or("git"))
    });

    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);
    if depth > 0 && supports_shallow(url) {
        fetch.depth(i32::try_from(depth).unwrap_or(i32::MAX));
    }

    info!("cloning repository");
    RepoBuilder::new()
        .fetch_options(fetch)
        .clone(url, dest)
        .map_err(|source| FetchError::Clone {
            url: url.to_string(),
            source,
        })?;

    Ok(dest.to_path_buf())
}

/// Minimal GitHub REST client for repository metadata
pub struct GitHubClient {
    client: Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(cfg: &GitHubConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(GITHUB_TIMEOUT)
            .user_agent(concat!("repolens/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            token: cfg.token.clone().filter(|t| !t.trim().is_empty()),
        })
    }

    fn repo_url(&self, slug: &GitHubSlug) -> String {
        format!("{}/repos/{}/{}", self.api_base, slug.owner, slug.repo)
    }

    /// `GET /repos/{owner}/{repo}`
    #[instrument(skip(self), fields(slug = %slug))]
    pub fn repo_info(&self, slug: &GitHubSlug) -> Result<RepoInfo, FetchError> {
        let url = self.repo_url(slug);
        let mut request = self.client.get(&url).header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("token {token}"));
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let info: RepoInfo = response.json()?;
        debug!(stars = info.stargazers_count, "fetched repository metadata");
        Ok(info)
    }
}
