/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Façade configuration, loadable from YAML.
 */

//! Façade configuration.
//!
//! ```yaml
//! cache: true
//! views:
//!   - templates
//!   - templates/shared
//! extensions:
//!   html: tera
//! aliases:
//!   hbs: handlebars
//! providers:
//!   jinja: [tera, minijinja]
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use consolidate_runtime::{RuntimeError, SystemRuntime};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::engine::{EngineRegistry, RegistryError};

/// Extension to engine mapping used when the configuration adds nothing.
pub const DEFAULT_EXTENSIONS: &[(&str, &str)] = &[
    ("hbs", "handlebars"),
    ("handlebars", "handlebars"),
    ("tera", "tera"),
    ("j2", "jinja"),
    ("jinja", "jinja"),
    ("jinja2", "jinja"),
];

/// Errors loading or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: RuntimeError,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Configuration of a [`Consolidate`](crate::Consolidate) instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsolidateConfig {
    /// Default for calls whose options do not set `cache`
    pub cache: bool,

    /// Views directories used when options carry none
    pub views: Vec<PathBuf>,

    /// Extra extension mappings for `render_file`, on top of the defaults.
    /// Keys are lowercase without the leading dot.
    #[serde(deserialize_with = "deserialize_extensions")]
    pub extensions: HashMap<String, String>,

    /// Extra names for registered engines
    pub aliases: HashMap<String, String>,

    /// Provider preference per engine
    pub providers: HashMap<String, Vec<String>>,
}

impl ConsolidateConfig {
    /// Parse a YAML document. An empty document gives the defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a YAML file through a runtime.
    pub async fn load(runtime: &dyn SystemRuntime, path: &Path) -> Result<Self, ConfigError> {
        let yaml = runtime
            .file_read_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_yaml_str(&yaml)?;
        tracing::debug!(path = %path.display(), "loaded consolidate configuration");
        Ok(config)
    }

    /// Enable caching by default.
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Set the default views directories.
    pub fn with_views(mut self, views: Vec<PathBuf>) -> Self {
        self.views = views;
        self
    }

    /// Map a file extension to an engine for `render_file`.
    pub fn with_extension(mut self, ext: &str, engine: impl Into<String>) -> Self {
        self.extensions.insert(normalize_extension(ext), engine.into());
        self
    }

    /// Engine for a file extension (with or without the leading dot).
    ///
    /// Configured mappings win over the defaults.
    pub fn engine_for_extension(&self, ext: &str) -> Option<&str> {
        let ext = normalize_extension(ext);
        self.extensions
            .get(&ext)
            .map(String::as_str)
            .or_else(|| {
                DEFAULT_EXTENSIONS
                    .iter()
                    .find(|(k, _)| *k == ext)
                    .map(|(_, engine)| *engine)
            })
    }

    /// Apply aliases and provider order to a registry.
    pub fn apply_to(&self, registry: &EngineRegistry) -> Result<(), ConfigError> {
        for (engine, order) in &self.providers {
            registry.reorder_providers(engine, order.as_slice())?;
        }
        for (alias, target) in &self.aliases {
            registry.alias(alias.clone(), target.clone())?;
        }
        Ok(())
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

/// Normalize extension keys; two keys naming the same extension
/// (`html`, `.HTML`) are an error.
fn deserialize_extensions<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw: HashMap<String, String> = Deserialize::deserialize(deserializer)?;
    let mut extensions = HashMap::with_capacity(raw.len());
    for (key, engine) in raw {
        let ext = normalize_extension(&key);
        if extensions.insert(ext.clone(), engine).is_some() {
            return Err(D::Error::custom(format!(
                "extension '{}' is mapped more than once",
                ext
            )));
        }
    }
    Ok(extensions)
}
