/*
 * registry.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Integration tests for engine acquisition through the render façade.
 */

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use common::{init_tracing, user_options};
use consolidate::engine::{
    CompileContext, CompiledTemplate, EngineError, EngineRegistry, TemplateEngine,
    handlebars_provider, provider_fn, tera_provider,
};
use consolidate::{AcquireError, Consolidate, MemoryRuntime, RenderError, RenderOptions};
use pretty_assertions::assert_eq;

/// Upper-cases its source and ignores the data.
struct Shout;

struct ShoutTemplate(String);

impl CompiledTemplate for ShoutTemplate {
    fn render(&self, _options: &RenderOptions) -> Result<String, EngineError> {
        Ok(self.0.clone())
    }
}

impl TemplateEngine for Shout {
    fn name(&self) -> &str {
        "shout"
    }

    fn default_extension(&self) -> &str {
        "txt"
    }

    fn compile(
        &self,
        source: &str,
        _ctx: &CompileContext<'_>,
    ) -> Result<Arc<dyn CompiledTemplate>, EngineError> {
        Ok(Arc::new(ShoutTemplate(source.to_uppercase())))
    }
}

fn consolidate_with(registry: EngineRegistry) -> Consolidate {
    init_tracing();
    Consolidate::builder()
        .runtime(Arc::new(MemoryRuntime::new()))
        .registry(registry)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_custom_engine() {
    let registry = EngineRegistry::empty();
    registry.register(
        "shout",
        vec![provider_fn("shout", || {
            Ok(Arc::new(Shout) as Arc<dyn TemplateEngine>)
        })],
    );
    let consolidate = consolidate_with(registry);

    let out = consolidate
        .render_string("shout", "hello", &RenderOptions::new())
        .await
        .unwrap();
    assert_eq!(out, "HELLO");
}

#[tokio::test]
async fn test_fallback_to_second_provider() {
    let registry = EngineRegistry::empty();
    registry.register(
        "jinja",
        vec![
            provider_fn("minijinja", || Err("not installed".to_string())),
            tera_provider(),
        ],
    );
    let consolidate = consolidate_with(registry);

    let out = consolidate
        .render_string("jinja", "<p>{{ user.name }}</p>", &user_options())
        .await
        .unwrap();
    assert_eq!(out, "<p>Tobi</p>");
    assert_eq!(consolidate.registry().acquired_engines(), vec!["jinja".to_string()]);
}

#[tokio::test]
async fn test_all_providers_failed() {
    let registry = EngineRegistry::empty();
    registry.register(
        "jinja",
        vec![
            provider_fn("minijinja", || Err("not installed".to_string())),
            provider_fn("tera", || Err("disabled".to_string())),
        ],
    );
    let consolidate = consolidate_with(registry);

    let err = consolidate
        .render_string("jinja", "{{ x }}", &RenderOptions::new())
        .await
        .unwrap_err();
    match err {
        RenderError::Acquisition(AcquireError::AllProvidersFailed { name, attempts }) => {
            assert_eq!(name, "jinja");
            let providers: Vec<_> = attempts.iter().map(|a| a.provider.as_str()).collect();
            assert_eq!(providers, vec!["minijinja", "tera"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_failed_acquisition_is_retried() {
    let available = Arc::new(AtomicBool::new(false));
    let attempts = Arc::new(AtomicUsize::new(0));

    let registry = EngineRegistry::empty();
    {
        let available = Arc::clone(&available);
        let attempts = Arc::clone(&attempts);
        registry.register(
            "shout",
            vec![provider_fn("shout", move || {
                attempts.fetch_add(1, Ordering::SeqCst);
                if available.load(Ordering::SeqCst) {
                    Ok(Arc::new(Shout) as Arc<dyn TemplateEngine>)
                } else {
                    Err("not yet".to_string())
                }
            })],
        );
    }
    let consolidate = consolidate_with(registry);
    let options = RenderOptions::new();

    assert!(consolidate.render_string("shout", "a", &options).await.is_err());
    assert!(consolidate.render_string("shout", "a", &options).await.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    available.store(true, Ordering::SeqCst);
    assert_eq!(
        consolidate.render_string("shout", "a", &options).await.unwrap(),
        "A"
    );
    assert_eq!(
        consolidate.render_string("shout", "b", &options).await.unwrap(),
        "B"
    );
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_renders_construct_once() {
    let constructed = Arc::new(AtomicUsize::new(0));
    let registry = EngineRegistry::empty();
    {
        let constructed = Arc::clone(&constructed);
        registry.register(
            "shout",
            vec![provider_fn("shout", move || {
                constructed.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Shout) as Arc<dyn TemplateEngine>)
            })],
        );
    }
    let consolidate = consolidate_with(registry);

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let consolidate = consolidate.clone();
            tokio::spawn(async move {
                consolidate
                    .render_string("shout", &format!("t{i}"), &RenderOptions::new())
                    .await
            })
        })
        .collect();
    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap().unwrap(), format!("T{i}"));
    }
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reset_reacquires() {
    let constructed = Arc::new(AtomicUsize::new(0));
    let registry = EngineRegistry::empty();
    {
        let constructed = Arc::clone(&constructed);
        registry.register(
            "shout",
            vec![provider_fn("shout", move || {
                constructed.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Shout) as Arc<dyn TemplateEngine>)
            })],
        );
    }
    let consolidate = consolidate_with(registry);
    let options = RenderOptions::new();

    consolidate.render_string("shout", "a", &options).await.unwrap();
    consolidate.render_string("shout", "a", &options).await.unwrap();
    assert_eq!(constructed.load(Ordering::SeqCst), 1);

    consolidate.reset();
    consolidate.render_string("shout", "a", &options).await.unwrap();
    assert_eq!(constructed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_alias_shares_the_handle() {
    let registry = EngineRegistry::empty();
    registry.register("handlebars", vec![handlebars_provider()]);
    registry.alias("hbs", "handlebars").unwrap();
    let consolidate = consolidate_with(registry);

    let out = consolidate
        .render_string("hbs", "<p>{{user.name}}</p>", &user_options())
        .await
        .unwrap();
    assert_eq!(out, "<p>Tobi</p>");

    let via_alias = consolidate.registry().acquire("hbs").await.unwrap();
    let direct = consolidate.registry().acquire("handlebars").await.unwrap();
    assert!(Arc::ptr_eq(&via_alias, &direct));
}

#[tokio::test]
async fn test_reorder_builtin_jinja() {
    let registry = EngineRegistry::new();
    registry.reorder_providers("jinja", &["tera"]).unwrap();
    let consolidate = consolidate_with(registry);

    consolidate
        .render_string("jinja", "{{ 1 + 1 }}", &RenderOptions::new())
        .await
        .unwrap();
    let handle = consolidate.registry().acquire("jinja").await.unwrap();
    assert_eq!(handle.provider(), "tera");
}
