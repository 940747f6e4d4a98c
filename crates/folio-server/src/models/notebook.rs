//! Notebook listing and rendering models

use folio::{NotebookRef, Origin, RemoteRepo, Resolution, ResolvedSource, SourceMode};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// Where to list notebooks from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListMode {
    #[default]
    Local,
    Remote,
}

/// Query parameters of the notebook listing
#[derive(Debug, Deserialize)]
pub struct NotebookListQuery {
    #[serde(default)]
    pub mode: ListMode,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub directory: String,
    /// Case-insensitive substring the listed paths must contain
    #[serde(default)]
    pub filter: String,
}

fn default_branch() -> String {
    "main".to_string()
}

impl NotebookListQuery {
    pub fn source_mode(&self) -> Result<SourceMode> {
        match self.mode {
            ListMode::Local => Ok(SourceMode::Local),
            ListMode::Remote => {
                if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
                    return Err(ApiError::validation(
                        "Remote mode needs both an owner and a repository",
                    ));
                }
                Ok(SourceMode::Remote(RemoteRepo::new(
                    self.owner.trim(),
                    self.repo.trim(),
                    self.branch.trim(),
                    self.directory.trim().trim_matches('/'),
                )))
            }
        }
    }
}

/// Listed notebooks and the source they actually came from
#[derive(Debug, Serialize)]
pub struct NotebookListResponse {
    /// `Local` or `Remote`
    pub source: &'static str,
    /// Origin to send back when rendering one of `paths`
    pub origin: Origin,
    pub paths: Vec<String>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl NotebookListResponse {
    pub fn new(resolution: Resolution, mode: &SourceMode) -> Self {
        let origin = match (mode, resolution.source) {
            (SourceMode::Remote(repo), ResolvedSource::Remote) => Origin::Remote(repo.clone()),
            _ => Origin::Local,
        };
        Self {
            source: resolution.source.label(),
            origin,
            count: resolution.paths.len(),
            paths: resolution.paths,
            fallback_reason: resolution.fallback_reason,
        }
    }
}

/// Notebook to render and how
#[derive(Debug, Deserialize)]
pub struct RenderNotebookRequest {
    pub path: String,
    #[serde(default = "default_origin")]
    pub origin: Origin,
    #[serde(default)]
    pub execute: bool,
    /// CSS to inject; the server default applies when absent
    pub css: Option<String>,
}

fn default_origin() -> Origin {
    Origin::Local
}

impl RenderNotebookRequest {
    pub fn notebook(&self) -> Result<NotebookRef> {
        if self.path.trim().is_empty() {
            return Err(ApiError::bad_request("No notebook selected"));
        }
        Ok(NotebookRef {
            origin: self.origin.clone(),
            path: self.path.clone(),
        })
    }
}

/// Exported notebook HTML
#[derive(Debug, Serialize)]
pub struct RenderNotebookResponse {
    pub html: String,
    pub executed: bool,
    /// `Local` or `Remote`
    pub source: &'static str,
    pub file_name: String,
}
