/*
 * options.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render options.
//!
//! Options are a JSON object that doubles as the template data: every key is
//! handed to the engine unchanged. A handful of keys are also read by the
//! façade itself:
//!
//! - `cache` - consult and populate the caches for this call
//! - `filename` - logical identity of the template (set for path renders)
//! - `partials` - explicit partial registrations
//! - `views` / `settings.views` - base directories for bare partial names

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::RenderError;

/// Option key controlling cache use.
pub const CACHE_KEY: &str = "cache";
/// Option key holding the template's logical identity.
pub const FILENAME_KEY: &str = "filename";
/// Option key holding explicit partial registrations.
pub const PARTIALS_KEY: &str = "partials";
/// Option key holding base directories for bare partial names.
pub const VIEWS_KEY: &str = "views";
/// Nested settings object (`settings.views`).
pub const SETTINGS_KEY: &str = "settings";

/// Options for a single render call.
///
/// Cloning is the intended way to derive per-call state: the façade clones
/// the caller's options before it injects `filename`, so a value reused
/// across calls is never changed by rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RenderOptions {
    values: Map<String, Value>,
}

/// Where an explicit partial comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartialLocator {
    /// A string that still needs classification (path or literal source).
    Unclassified(String),
    /// `{ "path": "..." }`
    Path(PathBuf),
    /// `{ "source": "..." }`
    Source(String),
}

impl RenderOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build options from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, RenderError> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            Value::Null => Ok(Self::default()),
            other => Err(RenderError::InvalidOptions(format!(
                "render options must be an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Build options from any serializable data.
    pub fn from_serialize<T: Serialize>(data: &T) -> Result<Self, RenderError> {
        let value = serde_json::to_value(data)
            .map_err(|e| RenderError::InvalidOptions(e.to_string()))?;
        Self::from_value(value)
    }

    /// Insert a key, returning `self` for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Insert a key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Get a raw value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The whole option object as template data.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// The whole option object as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    /// `cache` as a bool, if present.
    ///
    /// Any JSON value is accepted and judged by truthiness, so `"yes"` and
    /// `1` enable caching while `0`, `""` and `null` do not.
    pub fn cache(&self) -> Option<bool> {
        self.values.get(CACHE_KEY).map(is_truthy)
    }

    /// Effective cache flag given the configured default.
    pub fn cache_or(&self, default: bool) -> bool {
        self.cache().unwrap_or(default)
    }

    /// `filename`, if present and a string.
    pub fn filename(&self) -> Option<&str> {
        self.values.get(FILENAME_KEY).and_then(Value::as_str)
    }

    /// Set `filename`.
    pub fn set_filename(&mut self, path: &Path) {
        self.values.insert(
            FILENAME_KEY.to_string(),
            Value::String(path.to_string_lossy().into_owned()),
        );
    }

    /// Base directories for bare partial names.
    ///
    /// `views` takes precedence over `settings.views`. Either may be a
    /// string or a list of strings.
    pub fn views(&self) -> Result<Vec<PathBuf>, RenderError> {
        let raw = self.values.get(VIEWS_KEY).or_else(|| {
            self.values
                .get(SETTINGS_KEY)
                .and_then(|settings| settings.get(VIEWS_KEY))
        });
        match raw {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(dir)) => Ok(vec![PathBuf::from(dir)]),
            Some(Value::Array(dirs)) => dirs
                .iter()
                .map(|d| {
                    d.as_str().map(PathBuf::from).ok_or_else(|| {
                        RenderError::InvalidOptions(format!(
                            "views entries must be strings, got {}",
                            json_kind(d)
                        ))
                    })
                })
                .collect(),
            Some(other) => Err(RenderError::InvalidOptions(format!(
                "views must be a string or a list of strings, got {}",
                json_kind(other)
            ))),
        }
    }

    /// Explicit partial registrations, in declaration order.
    ///
    /// Entries whose value is `null` or `false` are skipped.
    pub fn partials(&self) -> Result<Vec<(String, PartialLocator)>, RenderError> {
        let map = match self.values.get(PARTIALS_KEY) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(RenderError::InvalidOptions(format!(
                    "partials must be an object, got {}",
                    json_kind(other)
                )));
            }
        };

        let mut partials = Vec::with_capacity(map.len());
        for (name, value) in map {
            let locator = match value {
                Value::Null | Value::Bool(false) => continue,
                Value::String(s) => PartialLocator::Unclassified(s.clone()),
                Value::Object(obj) => match (obj.get("path"), obj.get("source")) {
                    (Some(Value::String(p)), None) => PartialLocator::Path(PathBuf::from(p)),
                    (None, Some(Value::String(s))) => PartialLocator::Source(s.clone()),
                    _ => {
                        return Err(RenderError::InvalidOptions(format!(
                            "partial '{}' must have exactly one of 'path' or 'source'",
                            name
                        )));
                    }
                },
                other => {
                    return Err(RenderError::InvalidOptions(format!(
                        "partial '{}' must be a string or an object, got {}",
                        name,
                        json_kind(other)
                    )));
                }
            };
            partials.push((name.clone(), locator));
        }
        Ok(partials)
    }
}

impl From<Map<String, Value>> for RenderOptions {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl TryFrom<Value> for RenderOptions {
    type Error = RenderError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

/// JavaScript-style truthiness, used for flag options.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
