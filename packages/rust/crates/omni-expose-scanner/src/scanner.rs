//! Directory walk producing the autodiscovery candidate list.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::marker::{MarkedFunction, find_marked_functions};

/// Attribute name searched for when no other marker is configured.
pub const DEFAULT_MARKER: &str = "expose";

/// Errors that stop a scan before it starts.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The root directory does not exist.
    #[error("scan root not found: {0}")]
    RootNotFound(PathBuf),
    /// The root exists but is not a directory.
    #[error("scan root is not a directory: {0}")]
    NotADirectory(PathBuf),
    /// The root could not be resolved to an absolute path.
    #[error("failed to resolve scan root {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A source file that declares at least one marked function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCandidate {
    /// Absolute path (under the canonicalized root).
    pub path: PathBuf,
    /// Path relative to the scan root.
    pub relative_path: PathBuf,
    /// Marked functions in declaration order.
    pub functions: Vec<MarkedFunction>,
}

impl ScanCandidate {
    /// Whether a compile-time `file!()` path names this candidate.
    ///
    /// `file!()` is relative to the package or workspace root, so a relative
    /// source matches when it is a suffix of the candidate path; an absolute
    /// one must be equal.
    #[must_use]
    pub fn matches_source(&self, source_file: &str) -> bool {
        let source = Path::new(source_file);
        if source.as_os_str().is_empty() {
            return false;
        }
        if source.is_absolute() {
            return source == self.path;
        }
        self.path.ends_with(source)
    }

    /// Names of the marked functions.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|f| f.name.as_str())
    }
}

/// Finds source files with marked functions.
///
/// # Usage
///
/// ```rust,ignore
/// let scanner = SourceScanner::new();
/// for candidate in scanner.scan(Path::new("src"))? {
///     println!("{}: {:?}", candidate.relative_path.display(), candidate.functions);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SourceScanner {
    marker: String,
}

impl Default for SourceScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceScanner {
    /// Scanner looking for `#[expose]`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_marker(DEFAULT_MARKER)
    }

    /// Scanner looking for a different attribute name.
    #[must_use]
    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Attribute name this scanner matches.
    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Walk `root` recursively and return the candidate files sorted by path.
    ///
    /// Hidden directories and `target/` are skipped. Files that are not valid
    /// Rust are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] when `root` is missing, not a directory, or
    /// cannot be canonicalized.
    pub fn scan(&self, root: &Path) -> Result<Vec<ScanCandidate>, ScanError> {
        if !root.exists() {
            return Err(ScanError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }
        let root = root.canonicalize().map_err(|source| ScanError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let mut candidates = Vec::new();
        let mut scanned = 0usize;
        for entry in WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped_dir(e))
            .filter_map(Result::ok)
        {
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "rs") {
                continue;
            }
            scanned += 1;
            if let Some(candidate) = self.scan_file(&root, path) {
                candidates.push(candidate);
            }
        }

        candidates.sort_by(|a, b| a.path.cmp(&b.path));
        log::info!(
            "Scanned {} source files under {:?}: {} declare #[{}] functions",
            scanned,
            root,
            candidates.len(),
            self.marker
        );
        Ok(candidates)
    }

    /// Inspect a single file. `None` when it has no marked functions or
    /// cannot be read or parsed.
    #[must_use]
    pub fn scan_file(&self, root: &Path, path: &Path) -> Option<ScanCandidate> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Skipping unreadable source {:?}: {}", path, e);
                return None;
            }
        };
        if !content.contains(self.marker.as_str()) {
            return None;
        }

        let functions = match find_marked_functions(&content, &self.marker) {
            Ok(functions) => functions,
            Err(e) => {
                log::warn!("Skipping unparseable source {:?}: {}", path, e);
                return None;
            }
        };
        if functions.is_empty() {
            return None;
        }

        log::debug!(
            "Found {} #[{}] functions in {:?}",
            functions.len(),
            self.marker,
            path
        );
        Some(ScanCandidate {
            path: path.to_path_buf(),
            relative_path: path.strip_prefix(root).unwrap_or(path).to_path_buf(),
            functions,
        })
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == "target"
}
