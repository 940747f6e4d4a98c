//! Document template models

use folio::{OutputFormat, RenderedOutput, export::markdown_to_html};
use serde::{Deserialize, Serialize};

/// A template available for rendering
#[derive(Debug, Serialize)]
pub struct TemplateSummary {
    pub name: String,
    pub format: OutputFormat,
    pub mime_type: &'static str,
}

impl TemplateSummary {
    pub fn new(name: String) -> Self {
        let format = OutputFormat::from_template_name(&name);
        Self {
            name,
            format,
            mime_type: format.mime_type(),
        }
    }
}

/// Default context of a template, as editable JSON text
#[derive(Debug, Serialize)]
pub struct TemplateContextResponse {
    pub name: String,
    pub context: String,
}

/// Context text entered by the user
#[derive(Debug, Deserialize)]
pub struct RenderTemplateRequest {
    pub context: String,
}

#[derive(Debug, Serialize)]
pub struct RenderTemplateResponse {
    pub content: String,
    pub format: OutputFormat,
    pub file_path: String,
    pub file_name: String,
    pub mime_type: &'static str,
    /// HTML rendering of Markdown output for previewing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_html: Option<String>,
}

impl From<RenderedOutput> for RenderTemplateResponse {
    fn from(output: RenderedOutput) -> Self {
        Self {
            file_path: output.file_path.display().to_string(),
            file_name: output.file_name(),
            mime_type: output.format.mime_type(),
            preview_html: (output.format == OutputFormat::Markdown)
                .then(|| markdown_to_html(&output.content)),
            format: output.format,
            content: output.content,
        }
    }
}
