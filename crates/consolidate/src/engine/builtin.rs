/*
 * engine/builtin.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Registration of the bundled engines.

use std::sync::Arc;

use super::handlebars::HandlebarsEngine;
use super::minijinja::MinijinjaEngine;
use super::registry::EngineRegistry;
use super::tera::TeraEngine;
use super::traits::{EngineProvider, TemplateEngine, provider_fn};

/// Names of the bundled engines, in registration order.
pub const BUILTIN_ENGINES: &[&str] = &["handlebars", "tera", "minijinja", "jinja"];

pub fn handlebars_provider() -> Arc<dyn EngineProvider> {
    provider_fn("handlebars", || {
        Ok(Arc::new(HandlebarsEngine::new()) as Arc<dyn TemplateEngine>)
    })
}

pub fn tera_provider() -> Arc<dyn EngineProvider> {
    provider_fn("tera", || Ok(Arc::new(TeraEngine::new()) as Arc<dyn TemplateEngine>))
}

pub fn minijinja_provider() -> Arc<dyn EngineProvider> {
    provider_fn("minijinja", || {
        Ok(Arc::new(MinijinjaEngine::new()) as Arc<dyn TemplateEngine>)
    })
}

/// Register every bundled engine.
///
/// `jinja` is a capability with alternatives: minijinja is preferred and
/// tera is the fallback.
pub fn register_builtin_engines(registry: &EngineRegistry) {
    registry.register("handlebars", vec![handlebars_provider()]);
    registry.register("tera", vec![tera_provider()]);
    registry.register("minijinja", vec![minijinja_provider()]);
    registry.register("jinja", vec![minijinja_provider(), tera_provider()]);
}
