//! Listing, conversion and styling of notebooks for display

use std::path::{Component, Path, PathBuf};

use tracing::info;

use crate::cache::{Fingerprint, HtmlCache};
use crate::error::{ConfigError, FileSystemError, Result, SourceError};
use crate::export::{ExportResult, Exporter, execution_dir};
use crate::notebook::{NotebookRef, Origin};
use crate::source::{Resolution, Resolver, SourceMode, filter_paths};
use crate::style::inject_css;

/// Per-request conversion options
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Run the code cells before exporting
    pub execute: bool,
    /// CSS injected into the exported HTML; blank for none
    pub css: String,
}

/// Resolver, exporter, cache and post-processing behind one entry point
pub struct NotebookViewer {
    resolver: Resolver,
    exporter: Exporter,
    cache: HtmlCache<ExportResult>,
}

impl NotebookViewer {
    pub fn new(resolver: Resolver, exporter: Exporter) -> Self {
        Self {
            resolver,
            exporter,
            cache: HtmlCache::new(),
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn cache(&self) -> &HtmlCache<ExportResult> {
        &self.cache
    }

    /// List notebooks for `mode`, keeping those matching `filter`
    pub fn list(&self, mode: &SourceMode, filter: &str) -> Result<Resolution> {
        let mut resolution = self.resolver.resolve(mode)?;
        resolution.paths = filter_paths(&resolution.paths, filter);
        Ok(resolution)
    }

    /// Convert `notebook` to HTML, reusing the cached conversion when the
    /// notebook is unchanged
    ///
    /// CSS is injected after the cache lookup, so changing it never forces a
    /// new conversion.
    pub fn render(&self, notebook: &NotebookRef, options: &RenderOptions) -> Result<ExportResult> {
        let result = match &notebook.origin {
            Origin::Local => self.render_local(notebook, options.execute)?,
            Origin::Remote(repo) => {
                let client = self.resolver.remote().ok_or_else(|| ConfigError::InvalidConfig {
                    setting: "remote".to_string(),
                    reason: "no remote client configured".to_string(),
                })?;
                let content = client.fetch_raw(repo, &notebook.path)?;
                let fingerprint =
                    Fingerprint::for_content(&notebook.to_string(), &content, options.execute);
                self.cached_export(notebook, &fingerprint, &content, None, options.execute)?
            }
        };

        Ok(ExportResult {
            html: inject_css(&result.html, &options.css),
            ..result
        })
    }

    fn render_local(&self, notebook: &NotebookRef, execute: bool) -> Result<ExportResult> {
        let path = self.local_path(&notebook.path)?;
        let fingerprint = Fingerprint::for_file(&path, execute);
        let content =
            std::fs::read_to_string(&path).map_err(|e| FileSystemError::read(&path, e))?;
        self.cached_export(notebook, &fingerprint, &content, execution_dir(&path), execute)
    }

    fn cached_export(
        &self,
        notebook: &NotebookRef,
        fingerprint: &Fingerprint,
        content: &str,
        working_dir: Option<&Path>,
        execute: bool,
    ) -> Result<ExportResult> {
        // A fallback after failed execution is retried on the next render
        self.cache.get_or_compute_if(
            fingerprint,
            || {
                info!("Converting {} (execute: {})", notebook, execute);
                self.exporter.export(notebook, content, working_dir, execute)
            },
            |result| !execute || result.executed,
        )
    }

    /// Join a listed relative path onto the local root, refusing paths that
    /// would leave it
    fn local_path(&self, relative: &str) -> Result<PathBuf> {
        let candidate = Path::new(relative);
        let escapes = relative.is_empty()
            || candidate
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(SourceError::InvalidPath {
                path: relative.to_string(),
            }
            .into());
        }
        Ok(self.resolver.local_root().join(candidate))
    }
}

/// Download file name for an exported notebook
pub fn download_name(notebook: &NotebookRef) -> String {
    format!("{}.html", notebook.stem())
}
