/*
 * common/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Shared helpers for consolidate integration tests.
 */

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use consolidate::{Consolidate, MemoryRuntime, RenderOptions};
use serde_json::json;

/// Install a test subscriber once; `RUST_LOG` controls the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Path to a file under `test-fixtures/`.
pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("test-fixtures")
        .join(name)
}

/// A memory runtime holding copies of the given fixtures at their real
/// paths, so reads can be counted.
pub fn memory_runtime(fixtures: &[&str]) -> Arc<MemoryRuntime> {
    let rt = MemoryRuntime::new();
    for name in fixtures {
        let path = fixture_path(name);
        let source = std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e));
        rt.add_file(&path, source);
    }
    Arc::new(rt)
}

/// A façade over a memory runtime with the given fixtures.
pub fn memory_consolidate(fixtures: &[&str]) -> (Arc<MemoryRuntime>, Consolidate) {
    init_tracing();
    let rt = memory_runtime(fixtures);
    let consolidate = Consolidate::with_runtime(rt.clone());
    (rt, consolidate)
}

/// `{ user: { name: "Tobi" } }`
pub fn user_options() -> RenderOptions {
    RenderOptions::from_value(json!({"user": {"name": "Tobi"}})).unwrap()
}

/// `user_options()` with caching switched on.
pub fn cached_user_options() -> RenderOptions {
    user_options().with("cache", true)
}
