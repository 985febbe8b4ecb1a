/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Error types for template rendering.
 */

//! Error types for template rendering.

use std::path::PathBuf;

use consolidate_runtime::RuntimeError;
use thiserror::Error;

use crate::engine::AcquireError;

/// Errors that can occur while rendering a template.
///
/// Every failure of a render call, whatever stage it happens in, is
/// delivered as exactly one of these through the call's future or callback.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The engine could not be acquired.
    #[error(transparent)]
    Acquisition(#[from] AcquireError),

    /// A template or partial file could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        /// The file that was read
        path: PathBuf,
        /// Underlying runtime error
        #[source]
        source: RuntimeError,
    },

    /// A referenced partial could not be located.
    #[error("Partial '{name}' not found (referenced from {parent})")]
    PartialNotFound {
        /// The partial name as written
        name: String,
        /// The template that referenced it
        parent: String,
    },

    /// The engine rejected the template source.
    #[error("{engine}: failed to compile {name}: {message}")]
    Compile {
        /// Engine name
        engine: String,
        /// Template name (file path or `<inline>`)
        name: String,
        /// Engine message
        message: String,
    },

    /// The compiled template failed while rendering.
    #[error("{engine}: failed to render {name}: {message}")]
    Execution {
        /// Engine name
        engine: String,
        /// Template name (file path or `<inline>`)
        name: String,
        /// Engine message
        message: String,
    },

    /// Options had an unusable shape.
    #[error("Invalid render options: {0}")]
    InvalidOptions(String),

    /// Engine code panicked.
    #[error("{engine} panicked: {message}")]
    Panic {
        /// Engine name
        engine: String,
        /// Panic payload, when it was a string
        message: String,
    },

    /// A spawned render task did not complete.
    #[error("Render task failed: {0}")]
    Join(String),
}

/// Result type for render operations
pub type Result<T> = std::result::Result<T, RenderError>;

impl RenderError {
    /// Create an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: RuntimeError) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means a template or partial file does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io { source, .. } => source.is_not_found(),
            Self::PartialNotFound { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error_display() {
        let err = RenderError::io(
            "/views/user.hbs",
            RuntimeError::Io(io::Error::new(io::ErrorKind::NotFound, "gone")),
        );
        let msg = err.to_string();
        assert!(msg.contains("/views/user.hbs"));
        assert!(msg.contains("gone"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_permission_denied_is_not_not_found() {
        let err = RenderError::io(
            "/views/user.hbs",
            RuntimeError::PermissionDenied("reads are disabled".to_string()),
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_acquisition_is_transparent() {
        let err: RenderError = AcquireError::Unregistered {
            name: "mustache".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Engine not registered: mustache");
    }

    #[test]
    fn test_compile_display_names_engine_and_template() {
        let err = RenderError::Compile {
            engine: "tera".to_string(),
            name: "<inline>".to_string(),
            message: "unexpected end".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "tera: failed to compile <inline>: unexpected end"
        );
    }
}
