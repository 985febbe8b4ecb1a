/*
 * traits.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Defines the SystemRuntime trait and supporting types for template I/O.
 *
 * Template sources and partials are always loaded through this trait so the
 * render layer can run against:
 * - NativeRuntime: the real filesystem (tokio::fs)
 * - MemoryRuntime: an in-memory file tree with read accounting
 */

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during runtime operations
#[derive(Debug)]
pub enum RuntimeError {
    /// Standard I/O error
    Io(io::Error),

    /// Permission denied (with detailed reason)
    PermissionDenied(String),

    /// File content was not valid UTF-8
    InvalidUtf8 {
        /// The file that was read
        path: PathBuf,
        /// Decoder message
        message: String,
    },
}

impl RuntimeError {
    /// Whether this error means the path does not exist.
    ///
    /// Partial lookup uses this to move on to the next candidate directory.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeError::Io(e) => write!(f, "I/O error: {}", e),
            RuntimeError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            RuntimeError::InvalidUtf8 { path, message } => {
                write!(f, "Invalid UTF-8 in {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RuntimeError {
    fn from(e: io::Error) -> Self {
        RuntimeError::Io(e)
    }
}

/// Type of filesystem path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Regular file
    File,
    /// Directory
    Directory,
}

/// Low-level I/O operations needed to load templates.
///
/// Implementations decide where bytes come from. The render layer never
/// touches `std::fs` directly, which is what makes read counting and
/// fault injection possible in tests.
///
/// # Send bounds
///
/// Futures returned by the async methods are `Send` so renders can be
/// spawned onto a multi-threaded tokio runtime.
#[async_trait]
pub trait SystemRuntime: Send + Sync {
    // ═══════════════════════════════════════════════════════════════════════
    // FILE OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Read entire file contents as bytes.
    async fn file_read(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    /// Read file as string with UTF-8 encoding.
    ///
    /// Default implementation reads bytes and converts to string.
    async fn file_read_string(&self, path: &Path) -> RuntimeResult<String> {
        let bytes = self.file_read(path).await?;
        String::from_utf8(bytes).map_err(|e| RuntimeError::InvalidUtf8 {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Check if path exists, optionally filtering by type.
    ///
    /// This is a metadata check, not a read: implementations that count
    /// reads must not count it.
    async fn path_exists(&self, path: &Path, kind: Option<PathKind>) -> RuntimeResult<bool>;

    /// Check if path exists and is a file.
    ///
    /// Convenience method that calls `path_exists` with `PathKind::File`.
    async fn is_file(&self, path: &Path) -> RuntimeResult<bool> {
        self.path_exists(path, Some(PathKind::File)).await
    }

    /// Check if path exists and is a directory.
    async fn is_dir(&self, path: &Path) -> RuntimeResult<bool> {
        self.path_exists(path, Some(PathKind::Directory)).await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ENVIRONMENT
    // ═══════════════════════════════════════════════════════════════════════

    /// Get current working directory.
    ///
    /// Relative template paths are interpreted against this directory.
    fn cwd(&self) -> RuntimeResult<PathBuf>;

    /// Short identifier for logs ("native", "memory", ...).
    fn name(&self) -> &'static str;
}
