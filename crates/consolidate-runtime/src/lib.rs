/*
 * consolidate-runtime
 * Copyright (c) 2025 Posit, PBC
 *
 * I/O abstraction layer for template loading.
 *
 * This crate provides a trait-based abstraction for the filesystem reads the
 * render layer performs, allowing it to run against different stores:
 *
 * - NativeRuntime: real filesystem access through tokio::fs
 * - MemoryRuntime: in-memory file tree with read accounting
 */

mod memory;
mod native;
mod traits;

// Re-export core types (API surface)
pub use traits::{PathKind, RuntimeError, RuntimeResult, SystemRuntime};

// Re-export runtime implementations
pub use memory::{FileTree, MemoryRuntime};
pub use native::NativeRuntime;

/// Create the default runtime (the native filesystem).
pub fn default_runtime() -> NativeRuntime {
    NativeRuntime::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn test_default_runtime_exists() {
        let rt = default_runtime();
        assert_eq!(rt.name(), "native");
    }

    #[tokio::test]
    async fn test_runtimes_are_object_safe() {
        let runtimes: Vec<Arc<dyn SystemRuntime>> = vec![
            Arc::new(NativeRuntime::new()),
            Arc::new(MemoryRuntime::with_files([("/x.hbs", "x")])),
        ];
        for rt in &runtimes {
            assert!(!rt.name().is_empty());
        }
        assert!(runtimes[1].is_file(Path::new("/x.hbs")).await.unwrap());
    }
}
