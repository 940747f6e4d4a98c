//! Notebook to HTML export
//!
//! HTML is produced by an ordered list of [`RenderStrategy`] values. The
//! templated strategies are tried in [`TEMPLATE_PREFERENCE`] order and the
//! first success wins; when all of them fail the [`MinimalRenderer`], which
//! cannot fail, produces the output.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use minijinja::{AutoEscape, Environment, context};
use pulldown_cmark::{Options, Parser, html};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ExportError, FileSystemError, Result};
use crate::execute::KernelExecutor;
use crate::notebook::{CellType, NotebookDocument, NotebookRef, Output, mime_text};

/// Export templates in order of preference
pub const TEMPLATE_PREFERENCE: [&str; 3] = ["lab", "classic", "basic"];

/// Suffix of export template files in a templates directory
pub const EXPORT_TEMPLATE_SUFFIX: &str = ".html.j2";

/// Rich output mime types in order of preference
const MIME_PREFERENCE: [&str; 6] = [
    "text/html",
    "image/svg+xml",
    "image/png",
    "image/jpeg",
    "text/markdown",
    "text/plain",
];

fn builtin_template(name: &str) -> Option<&'static str> {
    match name {
        "lab" => Some(include_str!("../templates/lab.html.j2")),
        "basic" => Some(include_str!("../templates/basic.html.j2")),
        _ => None,
    }
}

/// Turns a parsed notebook into HTML, or reports why it cannot
pub trait RenderStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn render(&self, document: &NotebookDocument) -> Result<String>;
}

/// Renders through a named minijinja export template
///
/// The template is looked up as `<templates_dir>/<name>.html.j2` first and
/// among the built-in templates second.
#[derive(Debug, Clone)]
pub struct TemplatedRenderer {
    name: String,
    templates_dir: Option<PathBuf>,
}

impl TemplatedRenderer {
    pub fn new(name: impl Into<String>, templates_dir: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            templates_dir,
        }
    }

    fn load_source(&self) -> Result<Cow<'static, str>> {
        if let Some(dir) = &self.templates_dir {
            let path = dir.join(format!("{}{}", self.name, EXPORT_TEMPLATE_SUFFIX));
            if path.is_file() {
                let source = std::fs::read_to_string(&path)
                    .map_err(|e| FileSystemError::read(&path, e))?;
                return Ok(Cow::Owned(source));
            }
        }
        builtin_template(&self.name)
            .map(Cow::Borrowed)
            .ok_or_else(|| {
                ExportError::TemplateMissing {
                    name: self.name.clone(),
                }
                .into()
            })
    }

    fn failed(&self, error: minijinja::Error) -> ExportError {
        ExportError::TemplateFailed {
            name: self.name.clone(),
            reason: crate::error::render_reason(&error),
        }
    }
}

/// Template view of one cell; `html` and `outputs` are pre-rendered markup
#[derive(Debug, Serialize)]
struct CellView {
    kind: &'static str,
    source: String,
    html: String,
    outputs: Vec<String>,
    execution_count: Option<u32>,
}

impl CellView {
    fn new(cell: &crate::notebook::Cell) -> Self {
        let html = match cell.cell_type {
            CellType::Markdown => markdown_to_html(&cell.source),
            CellType::Code | CellType::Raw => String::new(),
        };
        Self {
            kind: cell.cell_type.as_str(),
            source: cell.source.clone(),
            html,
            outputs: cell.outputs.iter().map(render_output).collect(),
            execution_count: cell.execution_count,
        }
    }
}

impl RenderStrategy for TemplatedRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, document: &NotebookDocument) -> Result<String> {
        let source = self.load_source()?;

        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.add_template(&self.name, &source)
            .map_err(|e| self.failed(e))?;
        let template = env.get_template(&self.name).map_err(|e| self.failed(e))?;

        let cells: Vec<CellView> = document.cells.iter().map(CellView::new).collect();
        let rendered = template
            .render(context! {
                title => document_title(document),
                language => document.language(),
                kernel => document.kernel_name(),
                cells => cells,
                exclude_input_prompt => true,
                exclude_output_prompt => true,
            })
            .map_err(|e| self.failed(e))?;
        Ok(rendered)
    }
}

/// Last-resort renderer: one block per cell, never fails
///
/// The output is a bare fragment without `<html>` or `<head>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimalRenderer;

impl MinimalRenderer {
    pub fn render_document(&self, document: &NotebookDocument) -> String {
        let mut out = String::new();
        for cell in &document.cells {
            let class = match cell.cell_type {
                CellType::Code => "cell code-cell",
                CellType::Markdown => "cell markdown-cell",
                CellType::Raw => "cell raw-cell",
            };
            out.push_str("<div class=\"");
            out.push_str(class);
            out.push_str("\"><pre>");
            out.push_str(&html_escape::encode_text(&cell.source));
            out.push_str("</pre>");
            for text in cell.outputs.iter().filter_map(plain_output_text) {
                out.push_str("<pre class=\"output\">");
                out.push_str(&html_escape::encode_text(&text));
                out.push_str("</pre>");
            }
            out.push_str("</div>\n");
        }
        out
    }
}

impl RenderStrategy for MinimalRenderer {
    fn name(&self) -> &str {
        "minimal"
    }

    fn render(&self, document: &NotebookDocument) -> Result<String> {
        Ok(self.render_document(document))
    }
}

/// Notebook content handed to the exporter
#[derive(Debug, Clone, Copy)]
pub enum DocumentSource<'a> {
    /// A notebook file on disk; execution starts in its directory
    File(&'a Path),
    /// Notebook JSON fetched elsewhere
    Text(&'a str),
}

/// Result of one export
#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub html: String,
    pub source_ref: NotebookRef,
    /// Whether the HTML shows executed outputs; false when execution was not
    /// requested or failed
    pub executed: bool,
}

/// Converts notebooks to HTML, optionally executing them first
pub struct Exporter {
    strategies: Vec<Box<dyn RenderStrategy>>,
    fallback: MinimalRenderer,
    executor: Box<dyn KernelExecutor>,
}

impl Exporter {
    /// Exporter with the built-in template preference order
    pub fn new(executor: impl KernelExecutor + 'static) -> Self {
        Self::with_templates_dir(executor, None)
    }

    /// Exporter looking for export templates in `templates_dir` before the
    /// built-in ones
    pub fn with_templates_dir(
        executor: impl KernelExecutor + 'static,
        templates_dir: Option<PathBuf>,
    ) -> Self {
        let strategies = TEMPLATE_PREFERENCE
            .iter()
            .map(|name| {
                Box::new(TemplatedRenderer::new(*name, templates_dir.clone()))
                    as Box<dyn RenderStrategy>
            })
            .collect();
        Self::with_strategies(executor, strategies)
    }

    /// Exporter trying exactly `strategies` before the minimal renderer
    pub fn with_strategies(
        executor: impl KernelExecutor + 'static,
        strategies: Vec<Box<dyn RenderStrategy>>,
    ) -> Self {
        Self {
            strategies,
            fallback: MinimalRenderer,
            executor: Box::new(executor),
        }
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Convert a notebook file or notebook text to HTML
    pub fn export_to_html(&self, source: DocumentSource<'_>, execute: bool) -> Result<String> {
        let (content, working_dir) = match source {
            DocumentSource::File(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| FileSystemError::read(path, e))?;
                (Cow::Owned(content), execution_dir(path))
            }
            DocumentSource::Text(text) => (Cow::Borrowed(text), None),
        };
        let (document, _) = self.prepare(&content, working_dir, execute)?;
        Ok(self.render_document(&document))
    }

    /// Convert notebook content identified by `notebook`
    pub fn export(
        &self,
        notebook: &NotebookRef,
        content: &str,
        working_dir: Option<&Path>,
        execute: bool,
    ) -> Result<ExportResult> {
        let (document, executed) = self.prepare(content, working_dir, execute)?;
        Ok(ExportResult {
            html: self.render_document(&document),
            source_ref: notebook.clone(),
            executed,
        })
    }

    /// Render with the first strategy that succeeds
    pub fn render_document(&self, document: &NotebookDocument) -> String {
        for strategy in &self.strategies {
            match strategy.render(document) {
                Ok(html) => {
                    debug!("Rendered notebook with the {} template", strategy.name());
                    return html;
                }
                Err(e) => warn!("Export strategy {} failed: {}", strategy.name(), e),
            }
        }
        debug!("All export templates failed, using the minimal renderer");
        self.fallback.render_document(document)
    }

    /// Parse and, if requested, execute; execution failure keeps the
    /// unexecuted document
    fn prepare(
        &self,
        content: &str,
        working_dir: Option<&Path>,
        execute: bool,
    ) -> Result<(NotebookDocument, bool)> {
        let document = NotebookDocument::parse(content)?;
        if !execute {
            return Ok((document, false));
        }

        let executed = self
            .executor
            .execute(content, document.kernel_name(), working_dir)
            .and_then(|json| NotebookDocument::parse(&json));
        match executed {
            Ok(executed) => Ok((executed, true)),
            Err(e) => {
                warn!("Execution failed, rendering the unexecuted notebook: {}", e);
                Ok((document, false))
            }
        }
    }
}

/// Directory execution of the notebook at `path` starts in
///
/// A bare file name has an empty parent, which means the current directory.
pub(crate) fn execution_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|dir| !dir.as_os_str().is_empty())
}

fn document_title(document: &NotebookDocument) -> String {
    if let Some(title) = document
        .metadata
        .extra
        .get("title")
        .and_then(serde_json::Value::as_str)
    {
        return title.to_string();
    }
    document
        .cells
        .iter()
        .filter(|cell| cell.cell_type == CellType::Markdown)
        .flat_map(|cell| cell.source.lines())
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .unwrap_or_else(|| "Notebook".to_string())
}

/// Render markdown cell source to HTML
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

fn render_output(output: &Output) -> String {
    match output {
        Output::Stream { name, text } => format!(
            "<pre class=\"output-stream output-{}\">{}</pre>",
            html_escape::encode_double_quoted_attribute(name),
            html_escape::encode_text(text)
        ),
        Output::ExecuteResult { data, .. } | Output::DisplayData { data } => {
            render_mime_bundle(data)
        }
        Output::Error {
            ename,
            evalue,
            traceback,
        } => {
            let text = if traceback.is_empty() {
                format!("{}: {}", ename, evalue)
            } else {
                strip_ansi(&traceback.join("\n"))
            };
            format!(
                "<pre class=\"output-error\">{}</pre>",
                html_escape::encode_text(&text)
            )
        }
    }
}

fn render_mime_bundle(data: &crate::notebook::MimeBundle) -> String {
    let Some((mime, value)) = MIME_PREFERENCE
        .iter()
        .find_map(|mime| data.get(*mime).map(|value| (*mime, value)))
    else {
        return String::new();
    };
    let Some(text) = mime_text(value) else {
        return String::new();
    };

    match mime {
        "text/html" | "image/svg+xml" => format!("<div class=\"output-html\">{}</div>", text),
        "image/png" | "image/jpeg" => {
            let payload: String = text.split_whitespace().collect();
            format!(
                "<img class=\"output-image\" src=\"data:{};base64,{}\">",
                mime, payload
            )
        }
        "text/markdown" => format!(
            "<div class=\"output-markdown\">{}</div>",
            markdown_to_html(&text)
        ),
        _ => format!(
            "<pre class=\"output-text\">{}</pre>",
            html_escape::encode_text(&text)
        ),
    }
}

fn plain_output_text(output: &Output) -> Option<String> {
    match output {
        Output::Stream { text, .. } => Some(text.clone()),
        Output::ExecuteResult { data, .. } | Output::DisplayData { data } => {
            data.get("text/plain").and_then(mime_text)
        }
        Output::Error { ename, evalue, .. } => Some(format!("{}: {}", ename, evalue)),
    }
}

/// Drop ANSI colour sequences from kernel tracebacks
fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            // CSI sequences end with a byte in '@'..='~'
            if chars.next() == Some('[') {
                for c in chars.by_ref() {
                    if ('@'..='~').contains(&c) {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_ansi_removes_colour_codes() {
        assert_eq!(
            strip_ansi("\u{1b}[0;31mZeroDivisionError\u{1b}[0m: division by zero"),
            "ZeroDivisionError: division by zero"
        );
    }

    #[test]
    fn mime_preference_picks_html_over_plain() {
        let mut data = crate::notebook::MimeBundle::new();
        data.insert("text/plain".into(), "<DataFrame>".into());
        data.insert("text/html".into(), "<table></table>".into());
        assert_eq!(
            render_mime_bundle(&data),
            "<div class=\"output-html\"><table></table></div>"
        );
    }

    #[test]
    fn plain_text_output_is_escaped() {
        let mut data = crate::notebook::MimeBundle::new();
        data.insert("text/plain".into(), serde_json::json!(["a < b", " & c"]));
        assert_eq!(
            render_mime_bundle(&data),
            "<pre class=\"output-text\">a &lt; b &amp; c</pre>"
        );
    }

    #[test]
    fn bare_file_name_runs_in_current_directory() {
        assert_eq!(execution_dir(Path::new("a.ipynb")), None);
        assert_eq!(
            execution_dir(Path::new("numpy/a.ipynb")),
            Some(Path::new("numpy"))
        );
        assert_eq!(execution_dir(Path::new("/a.ipynb")), Some(Path::new("/")));
    }

    #[test]
    fn title_comes_from_first_heading() {
        let doc = NotebookDocument::parse(
            r##"{"nbformat": 4, "cells": [{"cell_type": "markdown", "source": "intro\n# Arrays \n"}]}"##,
        )
        .unwrap();
        assert_eq!(document_title(&doc), "Arrays");
    }
}
