//! Folio lists Jupyter notebooks from a local directory or a remote
//! repository, converts them to HTML (optionally executing them first), and
//! renders document templates from user supplied JSON.

pub mod cache;
pub mod error;
pub mod execute;
pub mod export;
pub mod notebook;
pub mod source;
pub mod style;
pub mod template;
pub mod viewer;

// Re-export core types
pub use cache::{Fingerprint, HtmlCache};
pub use error::{
    ConfigError, DataError, ExportError, FileSystemError, FolioError, NotebookError, Result,
    SourceError, TemplateError,
};
pub use execute::{JupyterExecutor, KernelExecutor};
pub use export::{
    DocumentSource, ExportResult, Exporter, MinimalRenderer, RenderStrategy, TemplatedRenderer,
};
pub use notebook::{Cell, CellType, NotebookDocument, NotebookRef, Origin, Output, RemoteRepo};
pub use source::{
    RemoteClient, RemoteConfig, Resolution, ResolvedSource, Resolver, SourceMode, filter_paths,
    list_local,
};
pub use style::inject_css;
pub use template::{OutputFormat, RenderedOutput, TemplateStore, parse_context};
pub use viewer::{NotebookViewer, RenderOptions, download_name};

/// Get the library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
