/*
 * engine/tera.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Tera adapter.
 */

//! Tera adapter.

use std::error::Error as StdError;
use std::sync::Arc;

use tera::{Context, Tera};

use super::context::{CompileContext, PartialRef};
use super::error::EngineError;
use super::scan::scan_jinja;
use super::traits::{CompiledTemplate, TemplateEngine};
use crate::options::{RenderOptions, is_truthy};

/// Option key controlling HTML auto-escaping (tera and minijinja).
pub const AUTOESCAPE_KEY: &str = "autoescape";

/// Tera engine. Filters, functions and testers registered on the base
/// instance are shared by every template.
pub struct TeraEngine {
    base: Tera,
}

impl TeraEngine {
    pub fn new() -> Self {
        Self::with_tera(Tera::default())
    }

    pub fn with_tera(base: Tera) -> Self {
        Self { base }
    }
}

impl Default for TeraEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for TeraEngine {
    fn name(&self) -> &str {
        "tera"
    }

    fn default_extension(&self) -> &str {
        "tera"
    }

    fn scan_partials(&self, source: &str) -> Vec<PartialRef> {
        scan_jinja(source)
    }

    fn known_partials(&self) -> Vec<String> {
        self.base.get_template_names().map(str::to_string).collect()
    }

    fn compile(
        &self,
        source: &str,
        ctx: &CompileContext<'_>,
    ) -> Result<Arc<dyn CompiledTemplate>, EngineError> {
        let mut tera = self.base.clone();
        match ctx.options.get(AUTOESCAPE_KEY).map(is_truthy) {
            // every name ends with ""
            Some(true) => tera.autoescape_on(vec![""]),
            Some(false) => tera.autoescape_on(vec![]),
            None => {}
        }

        let templates = ctx
            .partials
            .iter()
            .map(|p| (p.name.as_str(), p.source.as_str()))
            .chain(std::iter::once((ctx.name, source)));
        tera.add_raw_templates(templates)
            .map_err(|e| EngineError::Compile(error_chain(&e)))?;

        Ok(Arc::new(TeraTemplate {
            tera,
            name: ctx.name.to_string(),
        }))
    }
}

struct TeraTemplate {
    tera: Tera,
    name: String,
}

impl CompiledTemplate for TeraTemplate {
    fn render(&self, options: &RenderOptions) -> Result<String, EngineError> {
        let context = Context::from_serialize(options.as_map())
            .map_err(|e| EngineError::Execution(error_chain(&e)))?;
        self.tera
            .render(&self.name, &context)
            .map_err(|e| EngineError::Execution(error_chain(&e)))
    }
}

/// Tera keeps the useful part of a message in the error's sources.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::{Partial, PartialSet};
    use serde_json::json;

    fn compile(
        source: &str,
        partials: &PartialSet,
        options: &RenderOptions,
    ) -> Result<Arc<dyn CompiledTemplate>, EngineError> {
        TeraEngine::new().compile(source, &CompileContext::new("/views/t.tera", partials, options))
    }

    #[test]
    fn test_render_user() {
        let options = RenderOptions::from_value(json!({"user": {"name": "Tobi"}})).unwrap();
        let compiled = compile("<p>{{ user.name }}</p>", &PartialSet::new(), &options).unwrap();
        assert_eq!(compiled.render(&options).unwrap(), "<p>Tobi</p>");
    }

    #[test]
    fn test_include_and_extends() {
        let partials: PartialSet = [
            Partial::literal("base.tera", "<main>{% block body %}{% endblock %}</main>"),
            Partial::literal("header.tera", "<h1>{{ title }}</h1>"),
        ]
        .into_iter()
        .collect();
        let options = RenderOptions::new().with("title", "Hi");
        let compiled = compile(
            r#"{% extends "base.tera" %}{% block body %}{% include "header.tera" %}{% endblock %}"#,
            &partials,
            &options,
        )
        .unwrap();
        assert_eq!(compiled.render(&options).unwrap(), "<main><h1>Hi</h1></main>");
    }

    #[test]
    fn test_autoescape_option() {
        let options = RenderOptions::new().with("html", "<b>").with("autoescape", true);
        let compiled = compile("{{ html }}", &PartialSet::new(), &options).unwrap();
        assert_eq!(compiled.render(&options).unwrap(), "&lt;b&gt;");

        let options = RenderOptions::new().with("html", "<b>").with("autoescape", false);
        let compiled = compile("{{ html }}", &PartialSet::new(), &options).unwrap();
        assert_eq!(compiled.render(&options).unwrap(), "<b>");
    }

    #[test]
    fn test_compile_error_carries_cause() {
        let err = compile("{% if %}", &PartialSet::new(), &RenderOptions::new())
            .err()
            .unwrap();
        match err {
            EngineError::Compile(message) => assert!(message.contains("/views/t.tera")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_variable_is_execution_error() {
        let options = RenderOptions::new();
        let compiled = compile("{{ nope }}", &PartialSet::new(), &options).unwrap();
        assert!(matches!(
            compiled.render(&options),
            Err(EngineError::Execution(_))
        ));
    }
}
