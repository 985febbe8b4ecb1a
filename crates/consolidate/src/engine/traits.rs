/*
 * engine/traits.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * TemplateEngine, CompiledTemplate and EngineProvider traits.
 */

//! Traits every template engine adapter implements.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::context::{CompileContext, PartialRef};
use super::error::EngineError;
use crate::options::RenderOptions;

/// A template engine behind the uniform render contract.
///
/// Engines turn source text into a [`CompiledTemplate`]; the façade takes
/// care of reading files, resolving partials and caching the result.
///
/// # Thread Safety
///
/// Engines are shared between concurrent renders, so they must be
/// `Send + Sync`. Engines with mutable per-call state report it through
/// [`needs_configuration`](Self::needs_configuration); the façade then runs
/// configure, compile and render for that engine one call at a time.
///
/// # Example
///
/// ```ignore
/// use consolidate::engine::{CompileContext, CompiledTemplate, EngineError, TemplateEngine};
///
/// struct Upper;
///
/// impl TemplateEngine for Upper {
///     fn name(&self) -> &str {
///         "upper"
///     }
///
///     fn default_extension(&self) -> &str {
///         "up"
///     }
///
///     fn compile(
///         &self,
///         source: &str,
///         _ctx: &CompileContext<'_>,
///     ) -> Result<Arc<dyn CompiledTemplate>, EngineError> {
///         Ok(Arc::new(UpperTemplate(source.to_uppercase())))
///     }
/// }
/// ```
pub trait TemplateEngine: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Extension (without the dot) given to partial names that have none.
    fn default_extension(&self) -> &str;

    /// Find the partials a template references.
    ///
    /// Engines whose syntax names partials inline return them here so the
    /// resolver can load the whole closure up front. The default reports
    /// none, which leaves only explicitly registered partials.
    fn scan_partials(&self, _source: &str) -> Vec<PartialRef> {
        Vec::new()
    }

    /// Templates the engine already holds (registered on its base
    /// instance). Scanned references to these names are not loaded.
    fn known_partials(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether [`configure`](Self::configure) mutates shared engine state.
    ///
    /// Default: `false`
    fn needs_configuration(&self) -> bool {
        false
    }

    /// Apply per-call options to the engine before compiling.
    fn configure(&self, _options: &RenderOptions) -> Result<(), EngineError> {
        Ok(())
    }

    /// Compile a template together with its partials.
    fn compile(
        &self,
        source: &str,
        ctx: &CompileContext<'_>,
    ) -> Result<Arc<dyn CompiledTemplate>, EngineError>;
}

/// A compiled template, ready to render any number of times.
pub trait CompiledTemplate: Send + Sync {
    /// Render against the per-call options, which double as template data.
    fn render(&self, options: &RenderOptions) -> Result<String, EngineError>;
}

impl fmt::Debug for dyn CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompiledTemplate")
    }
}

/// One way of obtaining an engine.
///
/// A registry entry holds an ordered list of providers; acquisition tries
/// them in order and keeps the first engine that comes back.
#[async_trait]
pub trait EngineProvider: Send + Sync {
    /// Provider name, reported when acquisition fails.
    fn name(&self) -> &str;

    /// Construct the engine. Called again after a failure.
    async fn acquire(&self) -> Result<Arc<dyn TemplateEngine>, String>;
}

/// Provider backed by a synchronous constructor closure.
pub struct FnProvider<F> {
    name: String,
    constructor: F,
}

impl<F> FnProvider<F>
where
    F: Fn() -> Result<Arc<dyn TemplateEngine>, String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, constructor: F) -> Self {
        Self {
            name: name.into(),
            constructor,
        }
    }
}

#[async_trait]
impl<F> EngineProvider for FnProvider<F>
where
    F: Fn() -> Result<Arc<dyn TemplateEngine>, String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn acquire(&self) -> Result<Arc<dyn TemplateEngine>, String> {
        (self.constructor)()
    }
}

impl<F> fmt::Debug for FnProvider<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProvider").field("name", &self.name).finish()
    }
}

/// Provider that hands out an engine built ahead of time.
#[derive(Clone)]
pub struct InstanceProvider {
    name: String,
    engine: Arc<dyn TemplateEngine>,
}

impl InstanceProvider {
    pub fn new(engine: Arc<dyn TemplateEngine>) -> Self {
        Self {
            name: engine.name().to_string(),
            engine,
        }
    }
}

#[async_trait]
impl EngineProvider for InstanceProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn acquire(&self) -> Result<Arc<dyn TemplateEngine>, String> {
        Ok(Arc::clone(&self.engine))
    }
}

/// Wrap a constructor closure as a boxed provider.
pub fn provider_fn<F>(name: impl Into<String>, constructor: F) -> Arc<dyn EngineProvider>
where
    F: Fn() -> Result<Arc<dyn TemplateEngine>, String> + Send + Sync + 'static,
{
    Arc::new(FnProvider::new(name, constructor))
}
