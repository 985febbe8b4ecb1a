/*
 * engine/scan.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Partial reference scanners for the bundled template syntaxes.
 */

//! Partial reference scanners.
//!
//! These are deliberately shallow: they find literal partial names and
//! nothing else. Dynamic names (`{{> (lookup ...)}}`, `{% include var %}`)
//! cannot be known before render and are left to the engine.
//!
//! Spans the engine never executes (comments, raw blocks) are blanked out
//! before matching, so references inside them are not reported.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

use super::context::PartialRef;

/// `{{> name}}`, `{{~> name}}`, `{{#> layout}}` and quoted names.
static HANDLEBARS_PARTIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{\{~?\s*#?>\s*(?:"([^"]+)"|'([^']+)'|([A-Za-z0-9_@./\-]+))"#)
        .expect("Invalid regex pattern for handlebars partials")
});

/// `{% include "x" %}`, `{% extends 'x' %}`, `{% import "x" as m %}`,
/// `{% from "x" import y %}`, with optional whitespace control and
/// `ignore missing`.
static JINJA_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{%[-+]?\s*(?:include|extends|import|from)\s+(?:"([^"]+)"|'([^']+)')([^%]*)[-+]?%\}"#)
        .expect("Invalid regex pattern for jinja references")
});

/// `{{!-- ... --}}`, `{{! ... }}`, `{{{{raw}}}} ... {{{{/raw}}}}` and
/// escaped mustaches (`\{{> x}}`).
static HANDLEBARS_INERT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)\{\{~?!--.*?--~?\}\}|\{\{~?![^}]*\}\}|\{\{\{\{\s*raw\s*\}\}\}\}.*?\{\{\{\{/\s*raw\s*\}\}\}\}|\\\{\{[^}]*\}\}",
    )
    .expect("Invalid regex pattern for handlebars comments")
});

/// `{{#*inline "name"}}`: a partial defined inside the template itself.
static HANDLEBARS_INLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{\{~?\s*#\*inline\s+(?:"([^"]+)"|'([^']+)'|([A-Za-z0-9_@./\-]+))"#)
        .expect("Invalid regex pattern for handlebars inline partials")
});

/// `{# ... #}`, `{% raw %} ... {% endraw %}` and `{{ ... }}` expressions,
/// whose string literals may look like statements.
static JINJA_INERT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)\{#.*?#\}|\{%[-+]?\s*raw\s*[-+]?%\}.*?\{%[-+]?\s*endraw\s*[-+]?%\}|\{\{.*?\}\}",
    )
    .expect("Invalid regex pattern for jinja comments")
});

static IGNORE_MISSING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bignore\s+missing\b").expect("Invalid regex pattern for ignore missing")
});

/// Partial names referenced by a handlebars template, first occurrence
/// first, without duplicates.
///
/// Partials the template defines with `{{#*inline}}` are not reported.
pub fn scan_handlebars(source: &str) -> Vec<PartialRef> {
    let source = blank(&HANDLEBARS_INERT, source);
    let inline: Vec<&str> = HANDLEBARS_INLINE
        .captures_iter(&source)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| m.as_str())
        .collect();

    let mut refs: Vec<PartialRef> = Vec::new();
    for caps in HANDLEBARS_PARTIAL.captures_iter(&source) {
        let Some(name) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
            continue;
        };
        let name = name.as_str();
        // @partial-block and friends are provided by the engine
        if name.starts_with('@') || inline.contains(&name) {
            continue;
        }
        if !refs.iter().any(|r| r.name == name) {
            refs.push(PartialRef::required(name));
        }
    }
    refs
}

/// Template names referenced by a jinja-family template (tera, minijinja).
///
/// A name referenced both with and without `ignore missing` is required.
pub fn scan_jinja(source: &str) -> Vec<PartialRef> {
    let source = blank(&JINJA_INERT, source);
    let mut refs: Vec<PartialRef> = Vec::new();
    for caps in JINJA_REFERENCE.captures_iter(&source) {
        let Some(name) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let optional = caps
            .get(3)
            .is_some_and(|rest| IGNORE_MISSING.is_match(rest.as_str()));
        match refs.iter_mut().find(|r| r.name == name.as_str()) {
            Some(existing) => existing.optional &= optional,
            None => refs.push(PartialRef {
                name: name.as_str().to_string(),
                optional,
            }),
        }
    }
    refs
}

/// Replace every match with a space.
fn blank<'a>(inert: &Regex, source: &'a str) -> Cow<'a, str> {
    inert.replace_all(source, " ")
}
