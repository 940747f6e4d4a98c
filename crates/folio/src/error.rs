//! Error types for the folio library
//!
//! Errors are organized by domain so that callers can tell a resolution
//! problem (recoverable through the local fallback) from a rejected template
//! context (never guessed around) or a failed write.

use thiserror::Error;

/// Main error type for the folio library
///
/// This is the root error type that encompasses all possible errors that can occur
/// during folio operations. Each variant represents a different domain of errors.
#[derive(Error, Debug)]
pub enum FolioError {
    /// Notebook discovery and remote fetch errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Notebook parsing errors
    #[error("Notebook error: {0}")]
    Notebook(#[from] NotebookError),

    /// Kernel execution and HTML export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Document template errors (lookup, rendering)
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// File system operations (reading, writing, permissions)
    #[error("File system error: {0}")]
    FileSystem(#[from] FileSystemError),

    /// User supplied data errors
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Configuration and initialization errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while listing or fetching notebooks
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("Invalid notebook path: {path}")]
    InvalidPath { path: String },

    /// Non-success response from the repository API or the raw content host
    #[error("Remote request failed with HTTP {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    #[error("Remote request failed: {reason}")]
    Request { reason: String },

    #[error("Invalid remote listing: {reason}")]
    InvalidListing { reason: String },

    #[error("No notebooks found in {location}")]
    Empty { location: String },
}

/// Notebook document errors
#[derive(Error, Debug)]
pub enum NotebookError {
    #[error("Invalid notebook JSON: {reason}")]
    Parse { reason: String },

    #[error("Unsupported notebook format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Execution and HTML export errors
///
/// Execution failures never reach the caller of the exporter; they are logged
/// and the unexecuted document is rendered instead.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Kernel unavailable: {reason}")]
    KernelUnavailable { reason: String },

    #[error("Notebook execution failed: {reason}")]
    ExecutionFailed { reason: String },

    #[error("Export template not found: {name}")]
    TemplateMissing { name: String },

    #[error("Export template {name} failed: {reason}")]
    TemplateFailed { name: String, reason: String },
}

/// Document template errors
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {name}")]
    NotFound { name: String },

    #[error("Template rendering failed: {reason}")]
    Render { reason: String },
}

/// File system related errors
///
/// These errors occur during file operations and provide context about
/// what operation failed and why.
#[derive(Error, Debug)]
pub enum FileSystemError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("File read error: {path} - {reason}")]
    ReadError { path: String, reason: String },

    #[error("File write error: {path} - {reason}")]
    WriteError { path: String, reason: String },
}

/// Data validation errors for user supplied input
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Invalid JSON: {reason}")]
    InvalidJson { reason: String },

    #[error("Invalid data format: {expected}, got {actual}")]
    InvalidFormat { expected: String, actual: String },
}

/// Configuration and initialization errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("HTTP client initialization failed: {reason}")]
    HttpClient { reason: String },

    #[error("Invalid configuration: {setting} - {reason}")]
    InvalidConfig { setting: String, reason: String },

    #[error("Runtime error: {message}")]
    Runtime { message: String },
}

/// Shorthand result type for folio operations
pub type Result<T> = std::result::Result<T, FolioError>;

impl FileSystemError {
    /// Classify an I/O error with the path it concerns
    pub fn read(path: impl AsRef<std::path::Path>, error: std::io::Error) -> Self {
        let path = path.as_ref().display().to_string();
        match error.kind() {
            std::io::ErrorKind::NotFound => FileSystemError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => FileSystemError::PermissionDenied { path },
            _ => FileSystemError::ReadError {
                path,
                reason: error.to_string(),
            },
        }
    }

    /// Wrap a failed write with the path it concerns
    pub fn write(path: impl AsRef<std::path::Path>, error: std::io::Error) -> Self {
        FileSystemError::WriteError {
            path: path.as_ref().display().to_string(),
            reason: error.to_string(),
        }
    }
}

// ============================================================================
// From Implementations for External Error Types
// ============================================================================

/// Convert std::io::Error to FolioError
impl From<std::io::Error> for FolioError {
    fn from(error: std::io::Error) -> Self {
        FolioError::FileSystem(FileSystemError::read("<unknown>", error))
    }
}

/// Convert serde_json::Error to FolioError
impl From<serde_json::Error> for FolioError {
    fn from(error: serde_json::Error) -> Self {
        FolioError::Data(DataError::InvalidJson {
            reason: error.to_string(),
        })
    }
}

/// Convert reqwest::Error to FolioError
impl From<reqwest::Error> for FolioError {
    fn from(error: reqwest::Error) -> Self {
        let reason = if error.is_timeout() {
            format!("request timed out: {}", error)
        } else {
            error.to_string()
        };
        FolioError::Source(SourceError::Request { reason })
    }
}

/// Convert minijinja::Error to FolioError
impl From<minijinja::Error> for FolioError {
    fn from(error: minijinja::Error) -> Self {
        match error.kind() {
            minijinja::ErrorKind::TemplateNotFound => {
                FolioError::Template(TemplateError::NotFound {
                    name: error.name().unwrap_or("<unknown>").to_string(),
                })
            }
            _ => FolioError::Template(TemplateError::Render {
                reason: render_reason(&error),
            }),
        }
    }
}

/// Flatten a minijinja error and its causes into a single line
pub(crate) fn render_reason(error: &minijinja::Error) -> String {
    let mut reason = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    reason
}

// ============================================================================
// Error Helper Functions
// ============================================================================

impl FolioError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            FolioError::Source(e) => match e {
                SourceError::DirectoryNotFound { path } => {
                    format!("Directory not found: {}", path)
                }
                SourceError::RemoteStatus { status, .. } => {
                    format!("Remote repository returned HTTP {}", status)
                }
                SourceError::Empty { location } => {
                    format!("No .ipynb notebook found in {}", location)
                }
                _ => format!("Source error: {}", e),
            },
            FolioError::Notebook(e) => format!("Could not read notebook: {}", e),
            FolioError::Export(e) => format!("Conversion error: {}", e),
            FolioError::Template(e) => match e {
                TemplateError::NotFound { name } => format!("Template not found: {}", name),
                TemplateError::Render { reason } => {
                    format!("Error while rendering the template: {}", reason)
                }
            },
            FolioError::FileSystem(e) => match e {
                FileSystemError::NotFound { path } => format!("File not found: {}", path),
                FileSystemError::PermissionDenied { path } => {
                    format!("Permission denied accessing: {}", path)
                }
                _ => format!("File system error: {}", e),
            },
            // Keeps the "Invalid JSON:" prefix visible to the user
            FolioError::Data(e) => e.to_string(),
            FolioError::Config(e) => format!("Configuration error: {}", e),
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors are the ones a different source or a retry with
    /// corrected input can get past.
    pub fn is_recoverable(&self) -> bool {
        match self {
            FolioError::Source(SourceError::InvalidPath { .. }) => false,
            FolioError::Source(_) => true,
            FolioError::Template(TemplateError::NotFound { .. }) => false,
            FolioError::FileSystem(FileSystemError::PermissionDenied { .. }) => false,
            FolioError::FileSystem(FileSystemError::WriteError { .. }) => false,
            FolioError::Config(_) => false,
            _ => true,
        }
    }

    /// Get error suggestions for common problems
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            FolioError::Source(SourceError::RemoteStatus { status: 404, .. }) => vec![
                "Check the owner, repository and branch names".to_string(),
                "Private repositories need a GITHUB_TOKEN".to_string(),
            ],
            FolioError::Source(SourceError::RemoteStatus { status: 403, .. }) => vec![
                "The API rate limit may be exhausted; configure GITHUB_TOKEN".to_string(),
            ],
            FolioError::Source(SourceError::DirectoryNotFound { .. }) => vec![
                "Check the notebooks directory setting".to_string(),
            ],
            FolioError::Notebook(NotebookError::UnsupportedVersion { .. }) => vec![
                "Upgrade the notebook with `jupyter nbconvert --to notebook`".to_string(),
            ],
            FolioError::Data(DataError::InvalidJson { .. }) => vec![
                "Verify your JSON syntax is valid".to_string(),
                "Check for missing quotes or trailing commas".to_string(),
            ],
            FolioError::Template(TemplateError::Render { .. }) => vec![
                "Ensure every variable used by the template is present in the context".to_string(),
            ],
            _ => vec![],
        }
    }
}
