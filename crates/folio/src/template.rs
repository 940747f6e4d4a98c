//! Document templates filled with user supplied JSON
//!
//! Templates are minijinja files named `<base>.<format>.j2` in a templates
//! directory. Rendering is strict: a variable missing from the context is an
//! error, never an empty string.

use std::path::{Path, PathBuf};

use minijinja::{AutoEscape, Environment, UndefinedBehavior, path_loader};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::{DataError, FileSystemError, Result, TemplateError};

/// Suffix of document template files
pub const TEMPLATE_SUFFIX: &str = ".j2";

/// Output format of a rendered template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Html,
    Markdown,
    Text,
}

impl OutputFormat {
    /// Derive the format from the double suffix of a template name
    pub fn from_template_name(name: &str) -> Self {
        if name.ends_with(".html.j2") {
            OutputFormat::Html
        } else if name.ends_with(".md.j2") {
            OutputFormat::Markdown
        } else {
            OutputFormat::Text
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "md",
            OutputFormat::Text => "txt",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Html => "text/html",
            OutputFormat::Markdown => "text/markdown",
            OutputFormat::Text => "text/plain",
        }
    }
}

/// A rendered template and where it was written
#[derive(Debug, Clone, Serialize)]
pub struct RenderedOutput {
    pub content: String,
    pub format: OutputFormat,
    pub file_path: PathBuf,
}

impl RenderedOutput {
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Parse a user supplied template context
///
/// The context must be valid JSON and a JSON object; no schema is enforced.
pub fn parse_context(text: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(text).map_err(|e| DataError::InvalidJson {
        reason: e.to_string(),
    })?;
    if !value.is_object() {
        return Err(DataError::InvalidFormat {
            expected: "a JSON object".to_string(),
            actual: json_kind(&value).to_string(),
        }
        .into());
    }
    Ok(value)
}

/// Templates directory plus the directory rendered documents are written to
#[derive(Debug, Clone)]
pub struct TemplateStore {
    templates_dir: PathBuf,
    output_dir: PathBuf,
}

impl TemplateStore {
    pub fn new(templates_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Names of the available templates, sorted; empty when the directory is
    /// missing
    pub fn list_templates(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.templates_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FileSystemError::read(&self.templates_dir, e).into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FileSystemError::read(&self.templates_dir, e))?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(TEMPLATE_SUFFIX) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Editable starting context for a template
    pub fn default_context(&self, name: &str) -> Value {
        let today = today();
        match name {
            "simple_report.html.j2" => json!({
                "title": "Demonstration report",
                "author": "Your Name",
                "date": today,
                "sections": [
                    {"heading": "Introduction", "content": "Purpose and context of the report."},
                    {"heading": "Methodology", "content": "Data, tools and procedures."},
                    {"heading": "Results", "content": "Summary of the key results."},
                    {"heading": "Conclusion", "content": "Key points and next steps."}
                ]
            }),
            "letter.md.j2" => json!({
                "recipient_name": "Madam/Sir",
                "subject": "Subject of the letter",
                "body": "I am writing to present this template, generated with folio.\n\nAdapt the content to your needs.",
                "signature": "Your Name",
                "date": today
            }),
            _ => json!({"title": "Document", "date": today}),
        }
    }

    /// Render `name` with `context`
    pub fn render(&self, name: &str, context: &Value) -> Result<String> {
        if !is_plain_name(name) || !self.templates_dir.join(name).is_file() {
            return Err(TemplateError::NotFound {
                name: name.to_string(),
            }
            .into());
        }

        let mut env = Environment::new();
        env.set_loader(path_loader(&self.templates_dir));
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        // Keep the trailing newline of text templates
        env.set_keep_trailing_newline(true);

        let template = env.get_template(name)?;
        let rendered = template.render(context)?;
        debug!("Rendered template {} ({} bytes)", name, rendered.len());
        Ok(rendered)
    }

    /// Write `content` as the output of `name`, replacing any earlier output
    pub fn save_output(&self, name: &str, content: &str) -> Result<PathBuf> {
        let format = OutputFormat::from_template_name(name);
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| FileSystemError::write(&self.output_dir, e))?;

        let path = self
            .output_dir
            .join(format!("{}_output.{}", output_base_name(name), format.extension()));
        std::fs::write(&path, content).map_err(|e| FileSystemError::write(&path, e))?;
        info!("Wrote rendered template to {}", path.display());
        Ok(path)
    }

    /// Parse `context_text`, render `name` with it and save the result
    ///
    /// Invalid JSON is rejected before any rendering is attempted.
    pub fn generate(&self, name: &str, context_text: &str) -> Result<RenderedOutput> {
        let context = parse_context(context_text)?;
        let content = self.render(name, &context)?;
        let file_path = self.save_output(name, &content)?;
        Ok(RenderedOutput {
            content,
            format: OutputFormat::from_template_name(name),
            file_path,
        })
    }
}

/// Base of the output file name: `letter.md.j2` gives `letter`
pub fn output_base_name(name: &str) -> &str {
    let stem = name.strip_suffix(TEMPLATE_SUFFIX).unwrap_or(name);
    stem.strip_suffix(".html")
        .or_else(|| stem.strip_suffix(".md"))
        .unwrap_or(stem)
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

fn today() -> String {
    time::OffsetDateTime::now_utc().date().to_string()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
