/*
 * engine/registry.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Registry of template engines with lazy, memoized acquisition.
 */

//! Registry of template engines.
//!
//! Engines are registered as an ordered list of providers and constructed
//! on first use. The first successful acquisition is memoized until
//! [`EngineRegistry::reset`]; failed acquisitions are not, so a later call
//! tries again.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, OnceCell};

use super::builtin;
use super::error::{AcquireError, ProviderFailure};
use super::traits::{EngineProvider, TemplateEngine};

/// An acquired engine.
///
/// Created at most once per registration between resets, and shared by
/// every render that uses the engine.
pub struct EngineHandle {
    name: String,
    provider: String,
    engine: Arc<dyn TemplateEngine>,
    configuration: Mutex<()>,
}

impl EngineHandle {
    fn new(name: &str, provider: &str, engine: Arc<dyn TemplateEngine>) -> Self {
        Self {
            name: name.to_string(),
            provider: provider.to_string(),
            engine,
            configuration: Mutex::new(()),
        }
    }

    /// The registered name this handle was acquired for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The provider that produced the engine.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn engine(&self) -> &Arc<dyn TemplateEngine> {
        &self.engine
    }

    /// Serialize per-call configuration.
    ///
    /// Returns a guard for engines that mutate shared state in
    /// `configure`; hold it across configure, compile and render. Engines
    /// without per-call state get `None` and run concurrently.
    pub async fn configuration_guard(&self) -> Option<MutexGuard<'_, ()>> {
        if self.engine.needs_configuration() {
            Some(self.configuration.lock().await)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .finish()
    }
}

/// Errors from registry maintenance (not from acquisition).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The named engine is not registered.
    #[error("Engine not registered: {0}")]
    UnknownEngine(String),

    /// A provider name does not belong to the engine's chain.
    #[error("Engine '{engine}' has no provider named '{provider}'")]
    UnknownProvider {
        /// The engine
        engine: String,
        /// The provider that was asked for
        provider: String,
    },
}

struct Registration {
    providers: Vec<Arc<dyn EngineProvider>>,
    handle: Arc<OnceCell<Arc<EngineHandle>>>,
}

impl Registration {
    fn new(providers: Vec<Arc<dyn EngineProvider>>) -> Self {
        Self {
            providers,
            handle: Arc::new(OnceCell::new()),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    registrations: HashMap<String, Registration>,
    aliases: HashMap<String, String>,
}

impl RegistryState {
    fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        if self.registrations.contains_key(name) {
            return name;
        }
        self.aliases.get(name).map_or(name, String::as_str)
    }
}

/// Registry of template engines.
///
/// # Thread Safety
///
/// All methods take `&self`. Concurrent first acquisitions of one engine
/// construct it once: later callers wait for the acquisition in progress
/// and share its result.
pub struct EngineRegistry {
    state: RwLock<RegistryState>,
}

impl EngineRegistry {
    /// Create a registry with the bundled engines.
    ///
    /// - handlebars
    /// - tera
    /// - minijinja
    /// - jinja: minijinja, falling back to tera
    pub fn new() -> Self {
        let registry = Self::empty();
        builtin::register_builtin_engines(&registry);
        registry
    }

    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Register an engine under `name` with an ordered fallback chain.
    ///
    /// If the name is already registered, it is replaced (and its memoized
    /// handle dropped).
    pub fn register(&self, name: impl Into<String>, providers: Vec<Arc<dyn EngineProvider>>) {
        let name = name.into();
        tracing::debug!(
            engine = %name,
            providers = providers.len(),
            "registering template engine"
        );
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .registrations
            .insert(name, Registration::new(providers));
    }

    /// Register a single provider under its own name.
    pub fn register_provider(&self, provider: Arc<dyn EngineProvider>) {
        let name = provider.name().to_string();
        self.register(name, vec![provider]);
    }

    /// Make `alias` another name for the registered engine `target`.
    pub fn alias(
        &self,
        alias: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let target = target.into();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let canonical = state.canonical(&target).to_string();
        if !state.registrations.contains_key(&canonical) {
            return Err(RegistryError::UnknownEngine(target));
        }
        state.aliases.insert(alias.into(), canonical);
        Ok(())
    }

    /// Move the named providers to the front of an engine's chain, in the
    /// given order. Providers not named keep their relative order after
    /// them.
    pub fn reorder_providers<S: AsRef<str>>(
        &self,
        name: &str,
        order: &[S],
    ) -> Result<(), RegistryError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let canonical = state.canonical(name).to_string();
        let Some(registration) = state.registrations.get_mut(&canonical) else {
            return Err(RegistryError::UnknownEngine(name.to_string()));
        };

        let mut remaining = registration.providers.clone();
        let mut reordered = Vec::with_capacity(remaining.len());
        for wanted in order {
            let wanted = wanted.as_ref();
            let Some(pos) = remaining.iter().position(|p| p.name() == wanted) else {
                return Err(RegistryError::UnknownProvider {
                    engine: canonical,
                    provider: wanted.to_string(),
                });
            };
            reordered.push(remaining.remove(pos));
        }
        reordered.extend(remaining);
        *registration = Registration::new(reordered);
        Ok(())
    }

    /// Acquire an engine, constructing it on first use.
    pub async fn acquire(&self, name: &str) -> Result<Arc<EngineHandle>, AcquireError> {
        let (canonical, providers, cell) = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            let canonical = state.canonical(name).to_string();
            let Some(registration) = state.registrations.get(&canonical) else {
                return Err(AcquireError::Unregistered {
                    name: name.to_string(),
                });
            };
            (
                canonical,
                registration.providers.clone(),
                Arc::clone(&registration.handle),
            )
        };

        let handle = cell
            .get_or_try_init(|| Self::acquire_from(&canonical, &providers))
            .await?;
        Ok(Arc::clone(handle))
    }

    async fn acquire_from(
        name: &str,
        providers: &[Arc<dyn EngineProvider>],
    ) -> Result<Arc<EngineHandle>, AcquireError> {
        let mut attempts = Vec::new();
        for provider in providers {
            match provider.acquire().await {
                Ok(engine) => {
                    tracing::info!(
                        engine = %name,
                        provider = %provider.name(),
                        "acquired template engine"
                    );
                    return Ok(Arc::new(EngineHandle::new(name, provider.name(), engine)));
                }
                Err(message) => {
                    tracing::warn!(
                        engine = %name,
                        provider = %provider.name(),
                        error = %message,
                        "template engine provider failed"
                    );
                    attempts.push(ProviderFailure {
                        provider: provider.name().to_string(),
                        message,
                    });
                }
            }
        }
        Err(AcquireError::AllProvidersFailed {
            name: name.to_string(),
            attempts,
        })
    }

    /// Drop every memoized handle. Registrations and aliases stay.
    pub fn reset(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!("resetting engine registry");
        for registration in state.registrations.values_mut() {
            registration.handle = Arc::new(OnceCell::new());
        }
    }

    /// Registered engine names (aliases excluded), sorted.
    pub fn engine_names(&self) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = state.registrations.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether a name (or alias) is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.registrations.contains_key(state.canonical(name))
    }

    /// Whether a name (or alias) has a memoized handle.
    pub fn is_acquired(&self, name: &str) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .registrations
            .get(state.canonical(name))
            .is_some_and(|r| r.handle.initialized())
    }

    /// Names of engines with a memoized handle, sorted.
    pub fn acquired_engines(&self) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = state
            .registrations
            .iter()
            .filter(|(_, r)| r.handle.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Provider names of an engine's chain, in the order they are tried.
    pub fn provider_names(&self, name: &str) -> Option<Vec<String>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.registrations.get(state.canonical(name)).map(|r| {
            r.providers
                .iter()
                .map(|p| p.name().to_string())
                .collect()
        })
    }

    /// The engine an alias points to, if `name` is an alias.
    pub fn alias_target(&self, name: &str) -> Option<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.registrations.contains_key(name) {
            return None;
        }
        state.aliases.get(name).cloned()
    }

    /// Number of registered engines.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .registrations
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.engine_names())
            .field("acquired", &self.acquired_engines())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::CompileContext;
    use crate::engine::error::EngineError;
    use crate::engine::traits::{CompiledTemplate, provider_fn};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Named(&'static str);

    impl TemplateEngine for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn default_extension(&self) -> &str {
            "txt"
        }

        fn compile(
            &self,
            _source: &str,
            _ctx: &CompileContext<'_>,
        ) -> Result<Arc<dyn CompiledTemplate>, EngineError> {
            Err(EngineError::compile("not a real engine"))
        }
    }

    fn ok(name: &'static str) -> Arc<dyn EngineProvider> {
        provider_fn(name, move || Ok(Arc::new(Named(name)) as Arc<dyn TemplateEngine>))
    }

    fn failing(name: &'static str) -> Arc<dyn EngineProvider> {
        provider_fn(name, move || Err(format!("{name} is not available")))
    }

    #[test]
    fn test_new_registers_bundled_engines() {
        let registry = EngineRegistry::new();
        assert_eq!(
            registry.engine_names(),
            ["handlebars", "jinja", "minijinja", "tera"]
        );
        assert_eq!(
            registry.provider_names("jinja"),
            Some(vec!["minijinja".to_string(), "tera".to_string()])
        );
        assert!(registry.acquired_engines().is_empty());
    }

    #[test]
    fn test_empty_registry() {
        let registry = EngineRegistry::empty();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(!registry.is_registered("handlebars"));
    }

    #[tokio::test]
    async fn test_unregistered_engine() {
        let registry = EngineRegistry::empty();
        let err = registry.acquire("mustache").await.unwrap_err();
        assert!(matches!(err, AcquireError::Unregistered { ref name } if name == "mustache"));
    }

    #[tokio::test]
    async fn test_acquire_is_memoized() {
        let registry = EngineRegistry::empty();
        registry.register_provider(ok("a"));

        let first = registry.acquire("a").await.unwrap();
        let second = registry.acquire("a").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.is_acquired("a"));
        assert_eq!(first.provider(), "a");
    }

    #[tokio::test]
    async fn test_fallback_uses_first_success() {
        let registry = EngineRegistry::empty();
        registry.register("chain", vec![failing("first"), ok("second"), ok("third")]);

        let handle = registry.acquire("chain").await.unwrap();
        assert_eq!(handle.name(), "chain");
        assert_eq!(handle.provider(), "second");
        assert_eq!(handle.engine().name(), "second");
    }

    #[tokio::test]
    async fn test_all_providers_failed_lists_each() {
        let registry = EngineRegistry::empty();
        registry.register("chain", vec![failing("first"), failing("second")]);

        match registry.acquire("chain").await.unwrap_err() {
            AcquireError::AllProvidersFailed { name, attempts } => {
                assert_eq!(name, "chain");
                let providers: Vec<&str> = attempts.iter().map(|a| a.provider.as_str()).collect();
                assert_eq!(providers, ["first", "second"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!registry.is_acquired("chain"));
    }

    #[tokio::test]
    async fn test_failures_are_not_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = EngineRegistry::empty();
        registry.register(
            "flaky",
            vec![provider_fn("flaky", move || {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("warming up".to_string())
                } else {
                    Ok(Arc::new(Named("flaky")) as Arc<dyn TemplateEngine>)
                }
            })],
        );

        assert!(registry.acquire("flaky").await.is_err());
        assert!(registry.acquire("flaky").await.is_ok());
        assert!(registry.acquire("flaky").await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reset_drops_handles() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = EngineRegistry::empty();
        registry.register_provider(provider_fn("counted", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Named("counted")) as Arc<dyn TemplateEngine>)
        }));

        let before = registry.acquire("counted").await.unwrap();
        registry.reset();
        assert!(!registry.is_acquired("counted"));
        assert!(registry.is_registered("counted"));

        let after = registry.acquire("counted").await.unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_aliases_share_the_handle() {
        let registry = EngineRegistry::empty();
        registry.register_provider(ok("handlebars"));
        registry.alias("hbs", "handlebars").unwrap();

        let via_alias = registry.acquire("hbs").await.unwrap();
        let direct = registry.acquire("handlebars").await.unwrap();
        assert!(Arc::ptr_eq(&via_alias, &direct));
        assert_eq!(via_alias.name(), "handlebars");
        assert_eq!(registry.alias_target("hbs"), Some("handlebars".to_string()));
        assert!(registry.is_registered("hbs"));

        assert_eq!(
            registry.alias("x", "missing"),
            Err(RegistryError::UnknownEngine("missing".to_string()))
        );
    }

    #[test]
    fn test_reorder_providers() {
        let registry = EngineRegistry::empty();
        registry.register("jinja", vec![ok("minijinja"), ok("tera"), ok("other")]);

        registry.reorder_providers("jinja", &["tera"]).unwrap();
        assert_eq!(
            registry.provider_names("jinja"),
            Some(vec![
                "tera".to_string(),
                "minijinja".to_string(),
                "other".to_string()
            ])
        );

        assert!(matches!(
            registry.reorder_providers("jinja", &["nunjucks"]),
            Err(RegistryError::UnknownProvider { .. })
        ));
        assert!(matches!(
            registry.reorder_providers("nope", &["tera"]),
            Err(RegistryError::UnknownEngine(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_acquisition_constructs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = Arc::new(EngineRegistry::empty());
        registry.register_provider(provider_fn("slow", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::new(Named("slow")) as Arc<dyn TemplateEngine>)
        }));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.acquire("slow").await.map(|_| ()) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
