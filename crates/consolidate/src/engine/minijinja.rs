/*
 * engine/minijinja.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * MiniJinja adapter.
 */

//! MiniJinja adapter.

use std::sync::Arc;

use minijinja::{AutoEscape, Environment, Value};

use super::context::{CompileContext, PartialRef};
use super::error::EngineError;
use super::scan::scan_jinja;
use super::tera::AUTOESCAPE_KEY;
use super::traits::{CompiledTemplate, TemplateEngine};
use crate::options::{RenderOptions, is_truthy};

/// MiniJinja engine. Filters, functions and globals added to the base
/// environment are shared by every template.
pub struct MinijinjaEngine {
    base: Environment<'static>,
}

impl MinijinjaEngine {
    pub fn new() -> Self {
        Self::with_environment(Environment::new())
    }

    pub fn with_environment(base: Environment<'static>) -> Self {
        Self { base }
    }
}

impl Default for MinijinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for MinijinjaEngine {
    fn name(&self) -> &str {
        "minijinja"
    }

    fn default_extension(&self) -> &str {
        "j2"
    }

    fn scan_partials(&self, source: &str) -> Vec<PartialRef> {
        scan_jinja(source)
    }

    fn known_partials(&self) -> Vec<String> {
        self.base
            .templates()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    fn compile(
        &self,
        source: &str,
        ctx: &CompileContext<'_>,
    ) -> Result<Arc<dyn CompiledTemplate>, EngineError> {
        let mut env = self.base.clone();
        if let Some(escape) = ctx.options.get(AUTOESCAPE_KEY).map(is_truthy) {
            env.set_auto_escape_callback(move |_| {
                if escape {
                    AutoEscape::Html
                } else {
                    AutoEscape::None
                }
            });
        }

        for partial in ctx.partials.iter() {
            env.add_template_owned(partial.name.clone(), partial.source.clone())
                .map_err(|e| EngineError::Compile(format!("partial '{}': {:#}", partial.name, e)))?;
        }
        env.add_template_owned(ctx.name.to_string(), source.to_string())
            .map_err(|e| EngineError::Compile(format!("{:#}", e)))?;

        Ok(Arc::new(MinijinjaTemplate {
            env,
            name: ctx.name.to_string(),
        }))
    }
}

struct MinijinjaTemplate {
    env: Environment<'static>,
    name: String,
}

impl CompiledTemplate for MinijinjaTemplate {
    fn render(&self, options: &RenderOptions) -> Result<String, EngineError> {
        let template = self
            .env
            .get_template(&self.name)
            .map_err(|e| EngineError::Execution(format!("{:#}", e)))?;
        template
            .render(Value::from_serialize(options.as_map()))
            .map_err(|e| EngineError::Execution(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::{Partial, PartialSet};
    use serde_json::json;

    fn compile(
        engine: &MinijinjaEngine,
        source: &str,
        partials: &PartialSet,
        options: &RenderOptions,
    ) -> Result<Arc<dyn CompiledTemplate>, EngineError> {
        engine.compile(source, &CompileContext::new("t.j2", partials, options))
    }

    #[test]
    fn test_render_user() {
        let options = RenderOptions::from_value(json!({"user": {"name": "Tobi"}})).unwrap();
        let compiled = compile(
            &MinijinjaEngine::new(),
            "<p>{{ user.name }}</p>",
            &PartialSet::new(),
            &options,
        )
        .unwrap();
        assert_eq!(compiled.render(&options).unwrap(), "<p>Tobi</p>");
    }

    #[test]
    fn test_include_ignore_missing() {
        let partials: PartialSet = [Partial::literal("header.j2", "<h1>{{ title }}</h1>")]
            .into_iter()
            .collect();
        let options = RenderOptions::new().with("title", "Hi");
        let compiled = compile(
            &MinijinjaEngine::new(),
            r#"{% include "header.j2" %}{% include "nav.j2" ignore missing %}"#,
            &partials,
            &options,
        )
        .unwrap();
        assert_eq!(compiled.render(&options).unwrap(), "<h1>Hi</h1>");
    }

    #[test]
    fn test_filters_from_base_environment() {
        let mut env = Environment::new();
        env.add_filter("shout", |s: String| format!("{}!", s.to_uppercase()));
        let options = RenderOptions::new().with("name", "tobi");
        let compiled = compile(
            &MinijinjaEngine::with_environment(env),
            "{{ name|shout }}",
            &PartialSet::new(),
            &options,
        )
        .unwrap();
        assert_eq!(compiled.render(&options).unwrap(), "TOBI!");
    }

    #[test]
    fn test_autoescape_option() {
        let engine = MinijinjaEngine::new();
        let on = RenderOptions::new().with("html", "<b>").with("autoescape", true);
        let compiled = compile(&engine, "{{ html }}", &PartialSet::new(), &on).unwrap();
        assert_eq!(compiled.render(&on).unwrap(), "&lt;b&gt;");

        let off = RenderOptions::new().with("html", "<b>");
        let compiled = compile(&engine, "{{ html }}", &PartialSet::new(), &off).unwrap();
        assert_eq!(compiled.render(&off).unwrap(), "<b>");
    }

    #[test]
    fn test_syntax_error() {
        let err = compile(
            &MinijinjaEngine::new(),
            "{% if %}",
            &PartialSet::new(),
            &RenderOptions::new(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, EngineError::Compile(_)));
    }
}
