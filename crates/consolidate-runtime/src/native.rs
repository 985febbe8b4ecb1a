/*
 * native.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * NativeRuntime implementation backed by the real filesystem.
 */

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::traits::{PathKind, RuntimeResult, SystemRuntime};

/// Runtime with full filesystem access through `tokio::fs`.
#[derive(Debug, Clone, Default)]
pub struct NativeRuntime;

impl NativeRuntime {
    /// Create a new native runtime.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SystemRuntime for NativeRuntime {
    async fn file_read(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        tracing::trace!(path = %path.display(), "reading template file");
        Ok(tokio::fs::read(path).await?)
    }

    async fn path_exists(&self, path: &Path, kind: Option<PathKind>) -> RuntimeResult<bool> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        Ok(match kind {
            None => true,
            Some(PathKind::File) => metadata.is_file(),
            Some(PathKind::Directory) => metadata.is_dir(),
        })
    }

    fn cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(std::env::current_dir()?)
    }

    fn name(&self) -> &'static str {
        "native"
    }
}
