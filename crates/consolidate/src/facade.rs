/*
 * facade.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * The render façade: one contract over every registered engine.
 */

//! The render façade.
//!
//! A render call goes through these steps:
//!
//! 1. Clone the options; for path renders set `filename`
//! 2. Acquire the engine
//! 3. Look up the compiled template (when caching)
//! 4. On a miss: read the source, resolve partials, compile, store
//! 5. Configure the engine for this call and render
//!
//! Any failure along the way, including a panic inside engine code, comes
//! back as a single [`RenderError`] through the call's future or callback.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use consolidate_runtime::{SystemRuntime, default_runtime};
use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::cache::TemplateCache;
use crate::config::{ConfigError, ConsolidateConfig};
use crate::engine::{
    CompileContext, CompiledTemplate, EngineError, EngineHandle, EngineRegistry, PartialSet,
};
use crate::error::{RenderError, Result};
use crate::identity::{CompiledKey, TemplateIdentity};
use crate::options::RenderOptions;
use crate::resolver::PartialResolver;

/// Name templates rendered from a string are compiled under when the
/// options carry no `filename`.
pub const INLINE_TEMPLATE_NAME: &str = "<inline>";

/// Where a template comes from.
#[derive(Debug, Clone)]
enum TemplateInput<'a> {
    File(PathBuf),
    Source(&'a str),
}

/// A compiled template, or what is needed to compile one.
enum Artifact {
    Cached(Arc<dyn CompiledTemplate>),
    Loaded { source: String, partials: PartialSet },
}

struct Inner {
    registry: EngineRegistry,
    cache: TemplateCache,
    runtime: Arc<dyn SystemRuntime>,
    config: ConsolidateConfig,
}

/// Uniform rendering over every registered template engine.
///
/// Cloning is cheap and clones share the registry and caches, so one
/// instance can be handed to every task of an application. Separate
/// instances are fully isolated from each other.
///
/// # Example
///
/// ```ignore
/// use consolidate::{Consolidate, RenderOptions};
/// use serde_json::json;
///
/// let consolidate = Consolidate::new();
/// let options = RenderOptions::from_value(json!({"user": {"name": "Tobi"}}))?;
/// let html = consolidate.render("handlebars", "views/user.hbs", &options).await?;
/// ```
#[derive(Clone)]
pub struct Consolidate {
    inner: Arc<Inner>,
}

impl Consolidate {
    /// Bundled engines, native filesystem, default configuration.
    pub fn new() -> Self {
        Self::from_parts(
            EngineRegistry::new(),
            Arc::new(default_runtime()),
            ConsolidateConfig::default(),
        )
    }

    pub fn builder() -> ConsolidateBuilder {
        ConsolidateBuilder::default()
    }

    /// Bundled engines over a custom runtime.
    pub fn with_runtime(runtime: Arc<dyn SystemRuntime>) -> Self {
        Self::from_parts(EngineRegistry::new(), runtime, ConsolidateConfig::default())
    }

    fn from_parts(
        registry: EngineRegistry,
        runtime: Arc<dyn SystemRuntime>,
        config: ConsolidateConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                cache: TemplateCache::new(),
                runtime,
                config,
            }),
        }
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.inner.registry
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.inner.cache
    }

    pub fn config(&self) -> &ConsolidateConfig {
        &self.inner.config
    }

    pub fn runtime(&self) -> &Arc<dyn SystemRuntime> {
        &self.inner.runtime
    }

    /// Render a template file with `engine`.
    pub async fn render(
        &self,
        engine: &str,
        path: impl AsRef<Path>,
        options: &RenderOptions,
    ) -> Result<String> {
        self.render_guarded(engine, TemplateInput::File(path.as_ref().to_path_buf()), options)
            .await
    }

    /// Render template source with `engine`.
    ///
    /// Set `filename` in the options to resolve relative partials against
    /// that file's directory.
    pub async fn render_string(
        &self,
        engine: &str,
        source: &str,
        options: &RenderOptions,
    ) -> Result<String> {
        self.render_guarded(engine, TemplateInput::Source(source), options)
            .await
    }

    /// Render a file, picking the engine from its extension.
    pub async fn render_file(
        &self,
        path: impl AsRef<Path>,
        options: &RenderOptions,
    ) -> Result<String> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let engine = self
            .inner
            .config
            .engine_for_extension(ext)
            .unwrap_or(ext)
            .to_string();
        self.render(&engine, path, options).await
    }

    /// Render a file on a spawned task and hand the result to `callback`.
    ///
    /// The callback runs exactly once, on success or failure. Must be
    /// called from within a tokio runtime.
    pub fn render_with_callback<F>(
        &self,
        engine: impl Into<String>,
        path: impl Into<PathBuf>,
        options: RenderOptions,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        let this = self.clone();
        let engine = engine.into();
        let path = path.into();
        Self::complete_with(
            tokio::spawn(async move { this.render(&engine, &path, &options).await }),
            callback,
        )
    }

    /// Render template source on a spawned task and hand the result to
    /// `callback`.
    pub fn render_string_with_callback<F>(
        &self,
        engine: impl Into<String>,
        source: impl Into<String>,
        options: RenderOptions,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        let this = self.clone();
        let engine = engine.into();
        let source = source.into();
        Self::complete_with(
            tokio::spawn(async move { this.render_string(&engine, &source, &options).await }),
            callback,
        )
    }

    fn complete_with<F>(task: JoinHandle<Result<String>>, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        tokio::spawn(async move {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(RenderError::Join(e.to_string())),
            };
            callback(result);
        })
    }

    /// The two entry points of one engine.
    pub fn engine(&self, name: impl Into<String>) -> EngineRenderer {
        EngineRenderer {
            consolidate: self.clone(),
            name: name.into(),
        }
    }

    /// Drop every cached source and compiled template.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Clear the caches and drop every acquired engine.
    pub fn reset(&self) {
        self.inner.cache.clear();
        self.inner.registry.reset();
    }

    async fn render_guarded(
        &self,
        engine: &str,
        input: TemplateInput<'_>,
        options: &RenderOptions,
    ) -> Result<String> {
        match AssertUnwindSafe(self.render_template(engine, input, options))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(engine = %engine, panic = %message, "template engine panicked");
                Err(RenderError::Panic {
                    engine: engine.to_string(),
                    message,
                })
            }
        }
    }

    async fn render_template(
        &self,
        engine: &str,
        input: TemplateInput<'_>,
        options: &RenderOptions,
    ) -> Result<String> {
        let input = match input {
            TemplateInput::File(path) => TemplateInput::File(self.absolutize(&path)?),
            source => source,
        };
        let mut options = options.clone();
        if let TemplateInput::File(path) = &input {
            options.set_filename(path);
        }
        let parent_path = options.filename().map(PathBuf::from);
        let caching = options.cache_or(self.inner.config.cache);

        let handle = self.inner.registry.acquire(engine).await?;
        let identity = match &input {
            TemplateInput::File(path) => TemplateIdentity::File(path.clone()),
            TemplateInput::Source(source) => {
                TemplateIdentity::inline(handle.name(), options.filename(), source)
            }
        };
        let name = parent_path
            .as_ref()
            .map_or_else(|| INLINE_TEMPLATE_NAME.to_string(), |p| p.display().to_string());
        let key = CompiledKey::new(handle.name(), identity);
        tracing::debug!(
            engine = %handle.name(),
            template = %key.identity,
            cache = caching,
            "rendering template"
        );

        let artifact = match self.inner.cache.compiled(&key, caching) {
            Some(compiled) => Artifact::Cached(compiled),
            None => {
                let source = match &input {
                    TemplateInput::File(path) => {
                        self.inner
                            .cache
                            .read_source(self.inner.runtime.as_ref(), path, caching)
                            .await?
                    }
                    TemplateInput::Source(source) => (*source).to_string(),
                };
                let partials = PartialResolver::new(
                    self.inner.runtime.as_ref(),
                    &self.inner.cache,
                    handle.engine().as_ref(),
                    caching,
                )
                .with_views(self.views_for(&options)?)
                .resolve(&source, parent_path.as_deref(), &options)
                .await?;
                Artifact::Loaded { source, partials }
            }
        };

        // configure, compile and render form one unit per engine
        let _guard = handle.configuration_guard().await;
        handle
            .engine()
            .configure(&options)
            .map_err(|e| engine_error(&handle, &name, e))?;

        let compiled = match artifact {
            Artifact::Cached(compiled) => compiled,
            Artifact::Loaded { source, partials } => {
                let ctx = CompileContext::new(&name, &partials, &options)
                    .with_path(parent_path.as_deref());
                let compiled = handle
                    .engine()
                    .compile(&source, &ctx)
                    .map_err(|e| engine_error(&handle, &name, e))?;
                self.inner.cache.store_compiled(key, caching, compiled)
            }
        };

        compiled
            .render(&options)
            .map_err(|e| engine_error(&handle, &name, e))
    }

    fn absolutize(&self, path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        let cwd = self
            .inner
            .runtime
            .cwd()
            .map_err(|e| RenderError::io(path, e))?;
        Ok(cwd.join(path))
    }

    /// Views from the options, else from the configuration.
    fn views_for(&self, options: &RenderOptions) -> Result<Vec<PathBuf>> {
        let views = options.views()?;
        let views = if views.is_empty() {
            self.inner.config.views.clone()
        } else {
            views
        };
        views.iter().map(|dir| self.absolutize(dir)).collect()
    }
}

impl Default for Consolidate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Consolidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consolidate")
            .field("runtime", &self.inner.runtime.name())
            .field("registry", &self.inner.registry)
            .field("cache", &self.inner.cache)
            .finish()
    }
}

fn engine_error(handle: &EngineHandle, name: &str, err: EngineError) -> RenderError {
    match err {
        EngineError::Compile(message) => RenderError::Compile {
            engine: handle.name().to_string(),
            name: name.to_string(),
            message,
        },
        EngineError::Execution(message) => RenderError::Execution {
            engine: handle.name().to_string(),
            name: name.to_string(),
            message,
        },
        EngineError::InvalidOption { option, message } => {
            RenderError::InvalidOptions(format!("{}: {}", option, message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Path-based and string-based entry points bound to one engine.
#[derive(Debug, Clone)]
pub struct EngineRenderer {
    consolidate: Consolidate,
    name: String,
}

impl EngineRenderer {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render a template file.
    pub async fn render(&self, path: impl AsRef<Path>, options: &RenderOptions) -> Result<String> {
        self.consolidate.render(&self.name, path, options).await
    }

    /// Render template source.
    pub async fn from_string(&self, source: &str, options: &RenderOptions) -> Result<String> {
        self.consolidate
            .render_string(&self.name, source, options)
            .await
    }

    pub fn render_with_callback<F>(
        &self,
        path: impl Into<PathBuf>,
        options: RenderOptions,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        self.consolidate
            .render_with_callback(self.name.clone(), path, options, callback)
    }

    pub fn from_string_with_callback<F>(
        &self,
        source: impl Into<String>,
        options: RenderOptions,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        self.consolidate
            .render_string_with_callback(self.name.clone(), source, options, callback)
    }
}

/// Builder for [`Consolidate`].
#[derive(Default)]
pub struct ConsolidateBuilder {
    runtime: Option<Arc<dyn SystemRuntime>>,
    registry: Option<EngineRegistry>,
    config: ConsolidateConfig,
}

impl ConsolidateBuilder {
    /// Runtime templates are read through (default: native filesystem).
    pub fn runtime(mut self, runtime: Arc<dyn SystemRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Engine registry (default: the bundled engines).
    pub fn registry(mut self, registry: EngineRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(mut self, config: ConsolidateConfig) -> Self {
        self.config = config;
        self
    }

    /// Build, applying the configuration's aliases and provider order to
    /// the registry.
    pub fn build(self) -> std::result::Result<Consolidate, ConfigError> {
        let registry = self.registry.unwrap_or_default();
        self.config.apply_to(&registry)?;
        let runtime = self
            .runtime
            .unwrap_or_else(|| Arc::new(default_runtime()));
        Ok(Consolidate::from_parts(registry, runtime, self.config))
    }
}
