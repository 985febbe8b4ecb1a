/*
 * engine/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Template engine infrastructure.
 */

//! Template engine infrastructure.
//!
//! # Architecture
//!
//! - [`TemplateEngine`] trait - compiles source plus partials into a
//!   [`CompiledTemplate`]
//! - [`EngineProvider`] trait - one way of constructing an engine
//! - [`EngineRegistry`] - engine name to provider chain, acquired lazily
//! - Bundled engines:
//!   - [`HandlebarsEngine`]
//!   - [`TeraEngine`]
//!   - [`MinijinjaEngine`]
//!
//! # Bundled engines
//!
//! | Name | Backing crate | Default extension |
//! |------|---------------|-------------------|
//! | handlebars | handlebars | hbs |
//! | tera | tera | tera |
//! | minijinja | minijinja | j2 |
//! | jinja | minijinja, then tera | (backing engine's) |

mod builtin;
mod context;
mod error;
mod handlebars;
mod minijinja;
mod registry;
pub mod scan;
mod tera;
mod traits;

pub use builtin::{
    BUILTIN_ENGINES, handlebars_provider, minijinja_provider, register_builtin_engines,
    tera_provider,
};
pub use context::{CompileContext, Partial, PartialRef, PartialSet};
pub use error::{AcquireError, EngineError, ProviderFailure};
pub use self::handlebars::{HandlebarsEngine, STRICT_KEY};
pub use self::minijinja::MinijinjaEngine;
pub use registry::{EngineHandle, EngineRegistry, RegistryError};
pub use self::tera::{AUTOESCAPE_KEY, TeraEngine};
pub use traits::{
    CompiledTemplate, EngineProvider, FnProvider, InstanceProvider, TemplateEngine, provider_fn,
};
