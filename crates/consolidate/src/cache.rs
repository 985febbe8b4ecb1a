/*
 * cache.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Two-tier template cache: raw source text and compiled artifacts.
 */

//! Source and compiled-artifact caches.
//!
//! Both tiers live behind one lock so that [`TemplateCache::clear`] is a
//! single atomic step for every observer. Critical sections are short and
//! never span an `.await`: reads from the runtime happen with the lock
//! released.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use consolidate_runtime::SystemRuntime;

use crate::engine::CompiledTemplate;
use crate::error::{RenderError, Result};
use crate::identity::{CompiledKey, TemplateIdentity};

#[derive(Default)]
struct CacheState {
    sources: HashMap<PathBuf, String>,
    compiled: HashMap<CompiledKey, Arc<dyn CompiledTemplate>>,
}

/// Cache of template sources and compiled templates.
///
/// Every operation takes a `caching` flag. With `caching == false` the
/// cache is neither consulted nor populated.
#[derive(Default)]
pub struct TemplateCache {
    state: RwLock<CacheState>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a template file, going through the source cache when enabled.
    ///
    /// Read failures are returned as [`RenderError::Io`] and leave the
    /// cache untouched.
    pub async fn read_source(
        &self,
        runtime: &dyn SystemRuntime,
        path: &Path,
        caching: bool,
    ) -> Result<String> {
        let cached = if caching {
            self.read_state().sources.get(path).cloned()
        } else {
            None
        };
        if let Some(source) = cached {
            tracing::trace!(path = %path.display(), "source cache hit");
            return Ok(source);
        }

        let source = runtime
            .file_read_string(path)
            .await
            .map_err(|e| RenderError::io(path, e))?;

        if caching {
            tracing::trace!(path = %path.display(), "source cached");
            self.write_state()
                .sources
                .insert(path.to_path_buf(), source.clone());
        }
        Ok(source)
    }

    /// Look up a compiled template.
    pub fn compiled(&self, key: &CompiledKey, caching: bool) -> Option<Arc<dyn CompiledTemplate>> {
        if !caching {
            return None;
        }
        let hit = self.read_state().compiled.get(key).cloned();
        if hit.is_some() {
            tracing::debug!(engine = %key.engine, template = %key.identity, "compiled cache hit");
        }
        hit
    }

    /// Store a compiled template and hand it back.
    ///
    /// The source entry of a file identity is dropped at the same time: the
    /// artifact makes it redundant.
    pub fn store_compiled(
        &self,
        key: CompiledKey,
        caching: bool,
        artifact: Arc<dyn CompiledTemplate>,
    ) -> Arc<dyn CompiledTemplate> {
        if !caching {
            return artifact;
        }
        tracing::debug!(engine = %key.engine, template = %key.identity, "compiled template cached");
        let mut state = self.write_state();
        if let TemplateIdentity::File(path) = &key.identity {
            state.sources.remove(path);
        }
        state.compiled.insert(key, Arc::clone(&artifact));
        artifact
    }

    /// Empty both tiers.
    pub fn clear(&self) {
        let mut state = self.write_state();
        tracing::debug!(
            sources = state.sources.len(),
            compiled = state.compiled.len(),
            "clearing template cache"
        );
        state.sources.clear();
        state.compiled.clear();
    }

    /// Number of cached sources.
    pub fn source_len(&self) -> usize {
        self.read_state().sources.len()
    }

    /// Number of cached compiled templates.
    pub fn compiled_len(&self) -> usize {
        self.read_state().compiled.len()
    }

    pub fn has_source(&self, path: &Path) -> bool {
        self.read_state().sources.contains_key(path)
    }

    pub fn has_compiled(&self, key: &CompiledKey) -> bool {
        self.read_state().compiled.contains_key(key)
    }

    /// Whether both tiers are empty.
    pub fn is_empty(&self) -> bool {
        let state = self.read_state();
        state.sources.is_empty() && state.compiled.is_empty()
    }
}

impl std::fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("TemplateCache")
            .field("sources", &state.sources.len())
            .field("compiled", &state.compiled.len())
            .finish()
    }
}
