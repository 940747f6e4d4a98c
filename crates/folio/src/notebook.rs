//! Notebook identifiers and the parsed notebook document

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{NotebookError, Result};

/// File extension recognised as a notebook
pub const NOTEBOOK_EXTENSION: &str = ".ipynb";

/// Directory marker of autosave copies, excluded from discovery
pub const CHECKPOINT_MARKER: &str = ".ipynb_checkpoints";

/// The only notebook format major version understood by the exporter
pub const SUPPORTED_NBFORMAT: u32 = 4;

/// Kernel used when a notebook does not name one
pub const DEFAULT_KERNEL: &str = "python3";

/// A repository on the remote source-code host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteRepo {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Subdirectory listed for notebooks, empty for the repository root
    #[serde(default)]
    pub directory: String,
}

impl RemoteRepo {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        directory: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
            directory: directory.into(),
        }
    }
}

impl fmt::Display for RemoteRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)?;
        if !self.directory.is_empty() {
            write!(f, ":{}", self.directory)?;
        }
        Ok(())
    }
}

/// Where a notebook comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Origin {
    Local,
    Remote(RemoteRepo),
}

/// Identifies one notebook; created by the resolver, consumed by the exporter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotebookRef {
    pub origin: Origin,
    /// Path relative to the local root, or to the repository root when remote
    pub path: String,
}

impl NotebookRef {
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            origin: Origin::Local,
            path: path.into(),
        }
    }

    pub fn remote(repo: RemoteRepo, path: impl Into<String>) -> Self {
        Self {
            origin: Origin::Remote(repo),
            path: path.into(),
        }
    }

    /// File name without the notebook extension
    pub fn stem(&self) -> &str {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        name.strip_suffix(NOTEBOOK_EXTENSION).unwrap_or(name)
    }
}

impl fmt::Display for NotebookRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Origin::Local => write!(f, "{}", self.path),
            Origin::Remote(repo) => write!(f, "{}/{}", repo, self.path),
        }
    }
}

/// Kind of a notebook cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Markdown,
    Code,
    Raw,
}

impl CellType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Markdown => "markdown",
            CellType::Code => "code",
            CellType::Raw => "raw",
        }
    }
}

/// One output captured from a code cell
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        #[serde(default)]
        name: String,
        #[serde(deserialize_with = "multiline")]
        text: String,
    },
    ExecuteResult {
        #[serde(default)]
        data: MimeBundle,
        #[serde(default)]
        execution_count: Option<u32>,
    },
    DisplayData {
        #[serde(default)]
        data: MimeBundle,
    },
    Error {
        #[serde(default)]
        ename: String,
        #[serde(default)]
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

/// Mime type to payload map of a rich output
pub type MimeBundle = serde_json::Map<String, serde_json::Value>;

/// A notebook cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: CellType,
    #[serde(default, deserialize_with = "multiline")]
    pub source: String,
    #[serde(default)]
    pub outputs: Vec<Output>,
    #[serde(default)]
    pub execution_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotebookMetadata {
    #[serde(default)]
    pub kernelspec: Option<KernelSpec>,
    #[serde(default)]
    pub language_info: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A parsed version 4 notebook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookDocument {
    pub nbformat: u32,
    #[serde(default)]
    pub nbformat_minor: u32,
    #[serde(default)]
    pub metadata: NotebookMetadata,
    #[serde(default)]
    pub cells: Vec<Cell>,
}

impl NotebookDocument {
    /// Parse notebook JSON, rejecting anything but format version 4
    pub fn parse(text: &str) -> Result<Self> {
        // Check the version before the full parse so old notebooks report
        // the version instead of a schema mismatch
        let raw: serde_json::Value =
            serde_json::from_str(text).map_err(|e| NotebookError::Parse {
                reason: e.to_string(),
            })?;

        let found = raw
            .get("nbformat")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| NotebookError::Parse {
                reason: "missing nbformat field".to_string(),
            })?;
        if found != u64::from(SUPPORTED_NBFORMAT) {
            return Err(NotebookError::UnsupportedVersion {
                found: u32::try_from(found).unwrap_or(u32::MAX),
                expected: SUPPORTED_NBFORMAT,
            }
            .into());
        }

        let document = serde_json::from_value(raw).map_err(|e| NotebookError::Parse {
            reason: e.to_string(),
        })?;
        Ok(document)
    }

    /// Kernel named by the notebook metadata, or the default interpreter kernel
    pub fn kernel_name(&self) -> &str {
        self.metadata
            .kernelspec
            .as_ref()
            .and_then(|spec| spec.name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_KERNEL)
    }

    /// Language used to tag code cells in the export
    pub fn language(&self) -> &str {
        self.metadata
            .language_info
            .as_ref()
            .and_then(|info| info.get("name"))
            .and_then(serde_json::Value::as_str)
            .or_else(|| {
                self.metadata
                    .kernelspec
                    .as_ref()
                    .and_then(|spec| spec.language.as_deref())
            })
            .unwrap_or("python")
    }
}

/// Accept the notebook's multiline strings, stored either as one string or as
/// a list of lines
fn multiline<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        One(String),
        Lines(Vec<String>),
    }

    Ok(match Text::deserialize(deserializer)? {
        Text::One(text) => text,
        Text::Lines(lines) => lines.concat(),
    })
}

/// Join a mime payload that may be a string or a list of lines
pub(crate) fn mime_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Array(lines) => Some(
            lines
                .iter()
                .filter_map(serde_json::Value::as_str)
                .collect::<String>(),
        ),
        _ => None,
    }
}
