/*
 * engine/handlebars.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Handlebars adapter.
 */

//! Handlebars adapter.
//!
//! Helpers registered on the base registry (see
//! [`HandlebarsEngine::with_registry`]) are available to every template.
//! The `strict` option turns on strict mode for one call.

use std::sync::{Arc, Mutex, PoisonError};

use handlebars::Handlebars;

use super::context::{CompileContext, PartialRef};
use super::error::EngineError;
use super::scan::scan_handlebars;
use super::traits::{CompiledTemplate, TemplateEngine};
use crate::options::{RenderOptions, is_truthy};

/// Option key for handlebars strict mode.
pub const STRICT_KEY: &str = "strict";

pub struct HandlebarsEngine {
    registry: Mutex<Handlebars<'static>>,
}

impl HandlebarsEngine {
    pub fn new() -> Self {
        Self::with_registry(Handlebars::new())
    }

    /// Use a pre-configured registry (helpers, escape function, ...).
    pub fn with_registry(registry: Handlebars<'static>) -> Self {
        Self {
            registry: Mutex::new(registry),
        }
    }
}

impl Default for HandlebarsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for HandlebarsEngine {
    fn name(&self) -> &str {
        "handlebars"
    }

    fn default_extension(&self) -> &str {
        "hbs"
    }

    fn scan_partials(&self, source: &str) -> Vec<PartialRef> {
        scan_handlebars(source)
    }

    fn known_partials(&self) -> Vec<String> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_templates()
            .keys()
            .cloned()
            .collect()
    }

    fn needs_configuration(&self) -> bool {
        true
    }

    fn configure(&self, options: &RenderOptions) -> Result<(), EngineError> {
        let strict = options.get(STRICT_KEY).is_some_and(is_truthy);
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_strict_mode(strict);
        Ok(())
    }

    fn compile(
        &self,
        source: &str,
        ctx: &CompileContext<'_>,
    ) -> Result<Arc<dyn CompiledTemplate>, EngineError> {
        let mut registry = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for partial in ctx.partials.iter() {
            registry
                .register_partial(&partial.name, &partial.source)
                .map_err(|e| EngineError::Compile(format!("partial '{}': {}", partial.name, e)))?;
        }
        registry
            .register_template_string(ctx.name, source)
            .map_err(EngineError::compile)?;

        Ok(Arc::new(HandlebarsTemplate {
            registry,
            name: ctx.name.to_string(),
        }))
    }
}

struct HandlebarsTemplate {
    registry: Handlebars<'static>,
    name: String,
}

impl CompiledTemplate for HandlebarsTemplate {
    fn render(&self, options: &RenderOptions) -> Result<String, EngineError> {
        let strict = options.get(STRICT_KEY).is_some_and(is_truthy);
        if strict != self.registry.strict_mode() {
            // cached under the other mode
            let mut registry = self.registry.clone();
            registry.set_strict_mode(strict);
            return registry
                .render(&self.name, options.as_map())
                .map_err(EngineError::execution);
        }
        self.registry
            .render(&self.name, options.as_map())
            .map_err(EngineError::execution)
    }
}
