//! Notebook discovery
//!
//! Lists notebooks from a local directory or from a repository on the remote
//! source-code host. A remote listing that fails or comes back empty is
//! retried once against the local directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{ConfigError, FolioError, Result, SourceError};
use crate::notebook::{CHECKPOINT_MARKER, NOTEBOOK_EXTENSION, RemoteRepo};

/// Default timeout for remote requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent to the remote host, which rejects anonymous clients
pub const USER_AGENT: &str = concat!("folio/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an error response body kept in error messages
const ERROR_BODY_LIMIT: usize = 200;

/// Connection settings for the remote source-code host
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the repository contents API
    pub api_base: String,
    /// Base URL serving raw file content
    pub raw_base: String,
    /// Bearer token for API calls; never sent to the raw content host
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            raw_base: "https://raw.githubusercontent.com".to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// One entry of a contents API directory listing
#[derive(Debug, Deserialize)]
struct ContentEntry {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    path: String,
}

/// Blocking client for the repository contents API and raw content host
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    config: RemoteConfig,
}

impl RemoteClient {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient {
                reason: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// List notebooks in the repository directory and, one level down, in
    /// its immediate subdirectories
    pub fn list(&self, repo: &RemoteRepo) -> Result<Vec<String>> {
        let entries = self.list_directory(repo, &repo.directory)?;

        let mut paths = Vec::new();
        for entry in entries {
            match entry.kind.as_str() {
                "file" if is_notebook_name(&entry.name) => paths.push(entry.path),
                "dir" => match self.list_directory(repo, &entry.path) {
                    Ok(children) => paths.extend(
                        children
                            .into_iter()
                            .filter(|child| child.kind == "file" && is_notebook_name(&child.name))
                            .map(|child| child.path),
                    ),
                    Err(e) => warn!("Skipping remote directory {}: {}", entry.path, e),
                },
                _ => {}
            }
        }

        sort_case_insensitive(&mut paths);
        debug!("Remote listing of {} returned {} notebook(s)", repo, paths.len());
        Ok(paths)
    }

    /// Fetch the raw text of a file in the repository
    pub fn fetch_raw(&self, repo: &RemoteRepo, path: &str) -> Result<String> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.config.raw_base.trim_end_matches('/'),
            encode_segment(&repo.owner),
            encode_segment(&repo.repo),
            encode_segment(&repo.branch),
            encode_path(path),
        );
        debug!("Fetching raw notebook {}", url);

        let response = self.client.get(&url).send()?;
        let status = response.status();
        let body = response.text()?;
        if status != StatusCode::OK {
            return Err(remote_status(status, &body));
        }
        Ok(body)
    }

    fn list_directory(&self, repo: &RemoteRepo, directory: &str) -> Result<Vec<ContentEntry>> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.config.api_base.trim_end_matches('/'),
            encode_segment(&repo.owner),
            encode_segment(&repo.repo),
            encode_path(directory),
        );

        let mut request = self
            .client
            .get(&url)
            .query(&[("ref", repo.branch.as_str())])
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        if status != StatusCode::OK {
            return Err(remote_status(status, &body));
        }

        // A file path answers with a single object instead of an array
        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| SourceError::InvalidListing {
                reason: e.to_string(),
            })?;
        if !value.is_array() {
            return Err(SourceError::InvalidListing {
                reason: format!("{} is not a directory", url),
            }
            .into());
        }
        serde_json::from_value(value).map_err(|e| {
            SourceError::InvalidListing {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Recursively list notebooks under `root`, relative to it
pub fn list_local(root: impl AsRef<Path>) -> Result<Vec<String>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(SourceError::DirectoryNotFound {
            path: root.display().to_string(),
        }
        .into());
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if is_notebook_name(&relative) && !relative.contains(CHECKPOINT_MARKER) {
            paths.push(relative);
        }
    }

    sort_case_insensitive(&mut paths);
    debug!("Local listing of {} returned {} notebook(s)", root.display(), paths.len());
    Ok(paths)
}

/// Keep paths containing `query`, ignoring case; a blank query keeps all
pub fn filter_paths(paths: &[String], query: &str) -> Vec<String> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return paths.to_vec();
    }
    paths
        .iter()
        .filter(|path| path.to_lowercase().contains(&query))
        .cloned()
        .collect()
}

/// Requested listing source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMode {
    Local,
    Remote(RemoteRepo),
}

/// Source a listing actually came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedSource {
    Local,
    Remote,
}

impl ResolvedSource {
    /// Caption shown to the user
    pub fn label(&self) -> &'static str {
        match self {
            ResolvedSource::Local => "Local",
            ResolvedSource::Remote => "Remote",
        }
    }
}

/// Outcome of a listing request
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub source: ResolvedSource,
    pub paths: Vec<String>,
    /// Why the remote listing was abandoned, when it was
    pub fallback_reason: Option<String>,
}

/// Lists notebooks with the remote to local fallback policy
#[derive(Debug, Clone)]
pub struct Resolver {
    local_root: PathBuf,
    remote: Option<RemoteClient>,
}

impl Resolver {
    pub fn new(local_root: impl Into<PathBuf>, remote: Option<RemoteClient>) -> Self {
        Self {
            local_root: local_root.into(),
            remote,
        }
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn remote(&self) -> Option<&RemoteClient> {
        self.remote.as_ref()
    }

    /// List notebooks; a failing or empty remote listing falls back to the
    /// local directory exactly once
    pub fn resolve(&self, mode: &SourceMode) -> Result<Resolution> {
        let repo = match mode {
            SourceMode::Local => return self.resolve_local(None),
            SourceMode::Remote(repo) => repo,
        };

        let attempt = match &self.remote {
            Some(client) => client.list(repo),
            None => Err(FolioError::Config(ConfigError::InvalidConfig {
                setting: "remote".to_string(),
                reason: "no remote client configured".to_string(),
            })),
        };

        let reason = match attempt {
            Ok(paths) if !paths.is_empty() => {
                info!("Listed {} notebook(s) from {}", paths.len(), repo);
                return Ok(Resolution {
                    source: ResolvedSource::Remote,
                    paths,
                    fallback_reason: None,
                });
            }
            Ok(_) => SourceError::Empty {
                location: repo.to_string(),
            }
            .to_string(),
            Err(e) => e.to_string(),
        };

        warn!("Remote listing of {} unusable, falling back to local: {}", repo, reason);
        self.resolve_local(Some(reason))
    }

    fn resolve_local(&self, fallback_reason: Option<String>) -> Result<Resolution> {
        let paths = list_local(&self.local_root)?;
        Ok(Resolution {
            source: ResolvedSource::Local,
            paths,
            fallback_reason,
        })
    }
}

fn is_notebook_name(name: &str) -> bool {
    name.ends_with(NOTEBOOK_EXTENSION)
}

fn sort_case_insensitive(paths: &mut [String]) {
    paths.sort_by_cached_key(|path| path.to_lowercase());
}

fn remote_status(status: StatusCode, body: &str) -> FolioError {
    let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    SourceError::RemoteStatus {
        status: status.as_u16(),
        body,
    }
    .into()
}

fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}
