/*
 * engine/context.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Compile context and partial types handed to engines.
 */

//! Compile context and partial types handed to engines.

use std::path::{Path, PathBuf};

use hashlink::LinkedHashMap;

use crate::options::RenderOptions;

/// A partial reference found in template source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartialRef {
    /// The name exactly as written in the template
    pub name: String,
    /// Whether a missing partial is tolerated (`ignore missing`)
    pub optional: bool,
}

impl PartialRef {
    /// A reference that must resolve.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
        }
    }

    /// A reference that may be missing.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: true,
        }
    }
}

/// A loaded partial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partial {
    /// Name the partial is registered under
    pub name: String,
    /// Template source
    pub source: String,
    /// File it was read from; `None` for literal sources
    pub path: Option<PathBuf>,
}

impl Partial {
    /// A partial whose source was given literally.
    pub fn literal(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            path: None,
        }
    }

    /// A partial read from a file.
    pub fn from_file(name: impl Into<String>, source: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            path: Some(path),
        }
    }

    /// The source with a single final newline removed.
    ///
    /// Editors usually end files with a newline, which shows up in the
    /// output when the partial is used inline.
    pub fn strip_final_newline(&self) -> &str {
        self.source
            .strip_suffix("\r\n")
            .or_else(|| self.source.strip_suffix('\n'))
            .unwrap_or(&self.source)
    }
}

/// Every partial needed by one top-level template, in load order.
#[derive(Debug, Clone, Default)]
pub struct PartialSet {
    partials: LinkedHashMap<String, Partial>,
}

impl PartialSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a partial, replacing any previous one with the same name.
    pub fn insert(&mut self, partial: Partial) {
        self.partials.insert(partial.name.clone(), partial);
    }

    /// Look up a partial by name.
    pub fn get(&self, name: &str) -> Option<&Partial> {
        self.partials.get(name)
    }

    /// Whether a partial with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.partials.contains_key(name)
    }

    /// Partial names in load order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.partials.keys().map(String::as_str)
    }

    /// Partials in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Partial> {
        self.partials.values()
    }

    pub fn len(&self) -> usize {
        self.partials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }
}

impl FromIterator<Partial> for PartialSet {
    fn from_iter<I: IntoIterator<Item = Partial>>(iter: I) -> Self {
        let mut set = Self::new();
        for partial in iter {
            set.insert(partial);
        }
        set
    }
}

/// Everything an engine gets to compile one template.
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    /// Name the template is registered under inside the engine
    pub name: &'a str,
    /// File the template came from, for path renders
    pub path: Option<&'a Path>,
    /// Resolved partials
    pub partials: &'a PartialSet,
    /// Per-call options
    pub options: &'a RenderOptions,
}

impl<'a> CompileContext<'a> {
    pub fn new(name: &'a str, partials: &'a PartialSet, options: &'a RenderOptions) -> Self {
        Self {
            name,
            path: None,
            partials,
            options,
        }
    }

    /// Set the file the template came from.
    pub fn with_path(mut self, path: Option<&'a Path>) -> Self {
        self.path = path;
        self
    }
}
