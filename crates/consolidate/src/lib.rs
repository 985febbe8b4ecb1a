/*
 * consolidate
 * Copyright (c) 2025 Posit, PBC
 *
 * Uniform rendering façade over Rust template engines.
 */

//! One render contract over many template engines.
//!
//! Given an engine name, a template (file path or source string) and a bag
//! of options, [`Consolidate`] produces rendered output the same way
//! whichever engine runs underneath. It takes care of:
//!
//! - acquiring each engine lazily, once, with fallback between providers
//! - caching template sources and compiled templates
//! - loading the partials a template references, transitively
//!
//! Template syntax is not standardized; only invocation, caching and
//! partial loading are.
//!
//! # Example
//!
//! ```ignore
//! use consolidate::{Consolidate, RenderOptions};
//! use serde_json::json;
//!
//! let consolidate = Consolidate::new();
//! let options = RenderOptions::from_value(json!({
//!     "user": {"name": "Tobi"},
//!     "cache": true,
//! }))?;
//!
//! let html = consolidate.render("handlebars", "views/user.hbs", &options).await?;
//! let html = consolidate
//!     .engine("tera")
//!     .from_string("<p>{{ user.name }}</p>", &options)
//!     .await?;
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod facade;
pub mod identity;
pub mod options;
pub mod resolver;

pub use cache::TemplateCache;
pub use config::{ConfigError, ConsolidateConfig};
pub use engine::{
    AcquireError, CompileContext, CompiledTemplate, EngineError, EngineProvider, EngineRegistry,
    Partial, PartialRef, PartialSet, TemplateEngine,
};
pub use error::{RenderError, Result};
pub use facade::{Consolidate, ConsolidateBuilder, EngineRenderer};
pub use identity::{CompiledKey, TemplateIdentity};
pub use options::{PartialLocator, RenderOptions};
pub use resolver::PartialResolver;

// Re-export the I/O layer so callers need only one dependency
pub use consolidate_runtime::{MemoryRuntime, NativeRuntime, SystemRuntime};
