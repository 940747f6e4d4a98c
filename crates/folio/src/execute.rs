//! Kernel execution of notebook code cells
//!
//! Execution is delegated to the Jupyter execution engine, which enforces the
//! per-cell timeout itself.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::{ExportError, Result};

/// Per-cell execution timeout handed to the execution engine
pub const DEFAULT_CELL_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs the code cells of a notebook and returns the notebook with outputs
pub trait KernelExecutor: Send + Sync {
    /// Execute `notebook_json` with `kernel`, starting in `working_dir`
    fn execute(&self, notebook_json: &str, kernel: &str, working_dir: Option<&Path>)
    -> Result<String>;
}

/// Executes notebooks with `jupyter nbconvert --execute`
#[derive(Debug, Clone)]
pub struct JupyterExecutor {
    program: Option<PathBuf>,
    cell_timeout: Duration,
}

impl JupyterExecutor {
    /// Use the `jupyter` found on `PATH` at execution time
    pub fn new() -> Self {
        Self {
            program: None,
            cell_timeout: DEFAULT_CELL_TIMEOUT,
        }
    }

    /// Use a specific `jupyter` binary
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_cell_timeout(mut self, timeout: Duration) -> Self {
        self.cell_timeout = timeout;
        self
    }

    fn program(&self) -> Result<PathBuf> {
        match &self.program {
            Some(program) => Ok(program.clone()),
            None => which::which("jupyter").map_err(|e| {
                ExportError::KernelUnavailable {
                    reason: format!("jupyter not found on PATH: {}", e),
                }
                .into()
            }),
        }
    }
}

impl Default for JupyterExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelExecutor for JupyterExecutor {
    fn execute(
        &self,
        notebook_json: &str,
        kernel: &str,
        working_dir: Option<&Path>,
    ) -> Result<String> {
        let program = self.program()?;
        let mut command = Command::new(&program);
        command
            .args(["nbconvert", "--to", "notebook", "--execute", "--stdin", "--stdout"])
            .arg(format!(
                "--ExecutePreprocessor.timeout={}",
                self.cell_timeout.as_secs()
            ))
            .arg(format!("--ExecutePreprocessor.kernel_name={}", kernel))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = working_dir.filter(|dir| !dir.as_os_str().is_empty()) {
            command.current_dir(dir);
        }

        debug!("Executing notebook with kernel {} via {}", kernel, program.display());
        let mut child = command.spawn().map_err(|e| ExportError::KernelUnavailable {
            reason: format!("failed to start {}: {}", program.display(), e),
        })?;

        // Written from its own thread while stdout and stderr are drained
        let writer = child.stdin.take().map(|mut stdin| {
            let notebook = notebook_json.to_owned();
            thread::spawn(move || stdin.write_all(notebook.as_bytes()))
        });

        let output = child
            .wait_with_output()
            .map_err(|e| ExportError::ExecutionFailed {
                reason: e.to_string(),
            })?;
        let sent = match writer.map(|handle| handle.join()) {
            None | Some(Ok(Ok(()))) => Ok(()),
            Some(Ok(Err(e))) => Err(format!("failed to send notebook: {}", e)),
            Some(Err(_)) => Err("notebook writer thread panicked".to_string()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no diagnostic output");
            return Err(ExportError::ExecutionFailed {
                reason: format!("{} ({})", last_line.trim(), output.status),
            }
            .into());
        }
        sent.map_err(|reason| ExportError::ExecutionFailed { reason })?;

        String::from_utf8(output.stdout).map_err(|_| {
            ExportError::ExecutionFailed {
                reason: "executed notebook is not valid UTF-8".to_string(),
            }
            .into()
        })
    }
}
