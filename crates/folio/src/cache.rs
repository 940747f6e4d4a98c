//! Memoization of exported HTML keyed by content fingerprint

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};

use crate::error::{ConfigError, FolioError, Result};

/// SHA-256 over a notebook's identity, modification state and execute flag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a file from its path, modification time and size
    ///
    /// A file that cannot be stat'ed gets a distinct "missing" fingerprint
    /// instead of an error.
    pub fn for_file(path: impl AsRef<Path>, execute: bool) -> Self {
        let path = path.as_ref();
        let raw = match std::fs::metadata(path) {
            Ok(meta) => {
                let mtime_ns = meta
                    .modified()
                    .ok()
                    .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
                    .map(|since| since.as_nanos())
                    .unwrap_or_default();
                format!("{}:{}:{}:{}", path.display(), mtime_ns, meta.len(), execute)
            }
            Err(_) => format!("{}:missing:{}", path.display(), execute),
        };
        Self::digest(raw.as_bytes())
    }

    /// Fingerprint content that has no modification time, such as a remote file
    pub fn for_content(id: &str, content: &str, execute: bool) -> Self {
        let content_hash = Self::digest(content.as_bytes());
        let raw = format!("{}:{}:{}:{}", id, content_hash, content.len(), execute);
        Self::digest(raw.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn digest(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Fingerprint(format!("{:x}", hasher.finalize()))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exported HTML by fingerprint
///
/// Entries are never evicted; a changed file simply gets a new fingerprint.
/// The value defaults to the HTML string; callers that need to remember more
/// about a conversion store a richer value.
#[derive(Debug)]
pub struct HtmlCache<V = String> {
    entries: Mutex<HashMap<Fingerprint, V>>,
}

impl<V> Default for HtmlCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Clone> HtmlCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the value stored under `fingerprint`, computing and storing it
    /// on a miss. Failed computations are not stored.
    pub fn get_or_compute<F>(&self, fingerprint: &Fingerprint, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        self.get_or_compute_if(fingerprint, compute, |_| true)
    }

    /// Like [`HtmlCache::get_or_compute`], but a computed value is only
    /// stored when `keep` accepts it
    pub fn get_or_compute_if<F, K>(
        &self,
        fingerprint: &Fingerprint,
        compute: F,
        keep: K,
    ) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
        K: FnOnce(&V) -> bool,
    {
        if let Some(value) = self.lock()?.get(fingerprint) {
            tracing::debug!("HTML cache hit for {}", fingerprint);
            return Ok(value.clone());
        }

        // The lock is not held while converting
        let value = compute()?;
        if keep(&value) {
            self.lock()?.insert(fingerprint.clone(), value.clone());
        } else {
            tracing::debug!("Not caching result for {}", fingerprint);
        }
        Ok(value)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(fingerprint))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Fingerprint, V>>> {
        self.entries.lock().map_err(|_| {
            FolioError::Config(ConfigError::Runtime {
                message: "Failed to acquire cache lock".to_string(),
            })
        })
    }
}
