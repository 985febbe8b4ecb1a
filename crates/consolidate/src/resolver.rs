/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Partial resolution.
//!
//! Before a template is compiled, every partial it needs is loaded into a
//! [`PartialSet`]. Partials come from two places:
//!
//! - explicit registrations in the `partials` option
//! - references the engine finds by scanning template source
//!
//! Scanned references are followed transitively: a partial's own source is
//! scanned in turn. Every name is loaded at most once per resolve, so
//! self-references and cycles terminate.
//!
//! Path resolution for a partial name:
//! - If the name has no extension, use the referencing template's
//!   extension, or the engine's default extension
//! - If the name has an extension, use it as-is
//! - Relative names are looked up in the referencing template's directory,
//!   then in each views directory

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use consolidate_runtime::SystemRuntime;
use futures::future::try_join_all;

use crate::cache::TemplateCache;
use crate::engine::{Partial, PartialRef, PartialSet, TemplateEngine};
use crate::error::{RenderError, Result};
use crate::options::{PartialLocator, RenderOptions};

/// Characters that only occur in template markup, never in partial paths.
const MARKUP_CHARS: &[char] = &['{', '}', '<', '>', '%', '$'];

/// Whether an explicit partial string is literal source rather than a path.
///
/// A string is source when it spans lines or contains markup characters.
/// Without a directory to resolve against, every string is source.
pub fn looks_like_source(locator: &str, has_base: bool) -> bool {
    !has_base || locator.contains('\n') || locator.contains(MARKUP_CHARS)
}

/// Add `ext` to a path that has no extension.
pub fn with_default_extension(path: PathBuf, ext: &str) -> PathBuf {
    if path.extension().is_some() || ext.is_empty() {
        path
    } else {
        path.with_extension(ext)
    }
}

/// Resolution state of one partial name. Names not in the map are unseen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Loading,
    Ready,
}

/// A scanned reference waiting to be loaded.
#[derive(Debug, Clone)]
struct Pending {
    reference: PartialRef,
    /// The template that referenced it, if it came from a file
    from: Option<PathBuf>,
}

/// Loads the partial closure of one template.
pub struct PartialResolver<'a> {
    runtime: &'a dyn SystemRuntime,
    cache: &'a TemplateCache,
    engine: &'a dyn TemplateEngine,
    caching: bool,
    views: Vec<PathBuf>,
}

impl<'a> PartialResolver<'a> {
    pub fn new(
        runtime: &'a dyn SystemRuntime,
        cache: &'a TemplateCache,
        engine: &'a dyn TemplateEngine,
        caching: bool,
    ) -> Self {
        Self {
            runtime,
            cache,
            engine,
            caching,
            views: Vec::new(),
        }
    }

    /// Base directories for names not found next to the referencing
    /// template.
    pub fn with_views(mut self, views: Vec<PathBuf>) -> Self {
        self.views = views;
        self
    }

    /// Load every partial `parent_source` needs.
    ///
    /// `parent_path` is the file the parent came from (or its `filename`
    /// option for string renders). It anchors relative partial names.
    pub async fn resolve(
        &self,
        parent_source: &str,
        parent_path: Option<&Path>,
        options: &RenderOptions,
    ) -> Result<PartialSet> {
        // the engine resolves these itself
        let mut states: HashMap<String, LoadState> = self
            .engine
            .known_partials()
            .into_iter()
            .map(|name| (name, LoadState::Ready))
            .collect();
        let mut set = PartialSet::new();

        let explicit = options.partials()?;
        if !explicit.is_empty() {
            tracing::debug!(
                engine = %self.engine.name(),
                partials = explicit.len(),
                "loading explicit partials"
            );
            let loaded = try_join_all(
                explicit
                    .iter()
                    .map(|(name, locator)| self.load_explicit(name, locator, parent_path)),
            )
            .await?;
            for partial in loaded {
                states.insert(partial.name.clone(), LoadState::Ready);
                set.insert(partial);
            }
        }

        let mut wave: Vec<Pending> = self.scan(parent_source, parent_path);
        for partial in set.iter() {
            let from = partial.path.as_deref().or(parent_path);
            wave.extend(self.scan(&partial.source, from));
        }

        let mut depth = 0usize;
        while !wave.is_empty() {
            let mut batch = Vec::new();
            for pending in wave.drain(..) {
                if states.contains_key(&pending.reference.name) {
                    continue;
                }
                states.insert(pending.reference.name.clone(), LoadState::Loading);
                batch.push(pending);
            }
            if batch.is_empty() {
                break;
            }

            depth += 1;
            tracing::debug!(
                engine = %self.engine.name(),
                wave = depth,
                partials = batch.len(),
                "loading scanned partials"
            );
            let loaded = try_join_all(batch.iter().map(|p| self.load_scanned(p, parent_path))).await?;

            for (pending, partial) in batch.iter().zip(loaded) {
                states.insert(pending.reference.name.clone(), LoadState::Ready);
                let Some(partial) = partial else {
                    tracing::debug!(partial = %pending.reference.name, "optional partial not found");
                    continue;
                };
                let from = partial.path.clone().or_else(|| pending.from.clone());
                wave.extend(self.scan(&partial.source, from.as_deref()));
                set.insert(partial);
            }
        }

        debug_assert!(states.values().all(|s| *s == LoadState::Ready));
        Ok(set)
    }

    fn scan(&self, source: &str, from: Option<&Path>) -> Vec<Pending> {
        self.engine
            .scan_partials(source)
            .into_iter()
            .map(|reference| Pending {
                reference,
                from: from.map(Path::to_path_buf),
            })
            .collect()
    }

    fn extension_for(&self, referencing: Option<&Path>) -> String {
        referencing
            .and_then(Path::extension)
            .and_then(|e| e.to_str())
            .unwrap_or_else(|| self.engine.default_extension())
            .to_string()
    }

    /// Directory relative explicit locators are joined onto.
    fn explicit_base(&self, parent_path: Option<&Path>) -> Option<PathBuf> {
        parent_path
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .or_else(|| self.views.first().cloned())
    }

    async fn load_explicit(
        &self,
        name: &str,
        locator: &PartialLocator,
        parent_path: Option<&Path>,
    ) -> Result<Partial> {
        let base = self.explicit_base(parent_path);
        let ext = self.extension_for(parent_path);

        let path = match locator {
            PartialLocator::Source(source) => return Ok(Partial::literal(name, source.clone())),
            PartialLocator::Unclassified(s) if looks_like_source(s, base.is_some()) => {
                return Ok(Partial::literal(name, s.clone()));
            }
            PartialLocator::Unclassified(s) => PathBuf::from(s),
            PartialLocator::Path(p) => p.clone(),
        };

        let path = if path.is_absolute() {
            path
        } else {
            match base {
                Some(dir) => dir.join(path),
                None => self
                    .runtime
                    .cwd()
                    .map_err(|e| RenderError::io(&path, e))?
                    .join(path),
            }
        };
        let path = with_default_extension(path, &ext);

        tracing::trace!(partial = %name, path = %path.display(), "loading explicit partial");
        let source = self.cache.read_source(self.runtime, &path, self.caching).await?;
        Ok(Partial::from_file(name, source, path))
    }

    /// Load a scanned reference. `Ok(None)` means an optional partial was
    /// not found.
    async fn load_scanned(
        &self,
        pending: &Pending,
        parent_path: Option<&Path>,
    ) -> Result<Option<Partial>> {
        let name = &pending.reference.name;
        let referencing = pending.from.as_deref();
        let ext = self.extension_for(referencing.or(parent_path));

        let name_path = Path::new(name);
        let mut candidates: Vec<PathBuf> = Vec::new();
        if name_path.is_absolute() {
            candidates.push(with_default_extension(name_path.to_path_buf(), &ext));
        } else {
            if let Some(dir) = referencing.and_then(Path::parent) {
                candidates.push(with_default_extension(dir.join(name_path), &ext));
            }
            for dir in &self.views {
                let candidate = with_default_extension(dir.join(name_path), &ext);
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }

        let Some((last, earlier)) = candidates.split_last() else {
            if pending.reference.optional {
                return Ok(None);
            }
            return Err(RenderError::PartialNotFound {
                name: name.clone(),
                parent: describe(referencing.or(parent_path)),
            });
        };

        for candidate in earlier {
            let exists = self
                .runtime
                .is_file(candidate)
                .await
                .map_err(|e| RenderError::io(candidate, e))?;
            if exists {
                return self.read_scanned(name, candidate).await.map(Some);
            }
        }

        match self.read_scanned(name, last).await {
            Ok(partial) => Ok(Some(partial)),
            Err(e) if pending.reference.optional && e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn read_scanned(&self, name: &str, path: &Path) -> Result<Partial> {
        tracing::trace!(partial = %name, path = %path.display(), "loading scanned partial");
        let source = self.cache.read_source(self.runtime, path, self.caching).await?;
        Ok(Partial::from_file(name, source, path.to_path_buf()))
    }
}

fn describe(path: Option<&Path>) -> String {
    path.map_or_else(|| "<inline>".to_string(), |p| p.display().to_string())
}
