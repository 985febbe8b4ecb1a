/*
 * identity.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template identities used as cache keys.

use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Logical identity of a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateIdentity {
    /// A template rendered by path.
    File(PathBuf),
    /// A template rendered from a source string.
    Inline {
        /// Hex SHA-256 over engine, filename and source
        digest: String,
    },
}

impl TemplateIdentity {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Identity of a source string rendered by `engine`.
    ///
    /// The optional `filename` takes part in the digest because it changes
    /// how relative partials resolve, so the same text under two filenames
    /// compiles to two different artifacts.
    pub fn inline(engine: &str, filename: Option<&str>, source: &str) -> Self {
        let mut hasher = Sha256::new();
        for part in [engine, filename.unwrap_or(""), source] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self::Inline {
            digest: hex::encode(hasher.finalize()),
        }
    }

    /// The file path, for file identities.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Inline { .. } => None,
        }
    }
}

impl fmt::Display for TemplateIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Inline { digest } => write!(f, "<inline:{}>", &digest[..12.min(digest.len())]),
        }
    }
}

/// Key of the compiled-artifact cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledKey {
    pub engine: String,
    pub identity: TemplateIdentity,
}

impl CompiledKey {
    pub fn new(engine: impl Into<String>, identity: TemplateIdentity) -> Self {
        Self {
            engine: engine.into(),
            identity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_digest_is_stable() {
        let a = TemplateIdentity::inline("handlebars", None, "<p>{{x}}</p>");
        let b = TemplateIdentity::inline("handlebars", None, "<p>{{x}}</p>");
        assert_eq!(a, b);
        match a {
            TemplateIdentity::Inline { digest } => assert_eq!(digest.len(), 64),
            TemplateIdentity::File(_) => panic!("expected inline identity"),
        }
    }

    #[test]
    fn test_inline_digest_depends_on_every_part() {
        let base = TemplateIdentity::inline("tera", None, "x");
        assert_ne!(base, TemplateIdentity::inline("minijinja", None, "x"));
        assert_ne!(base, TemplateIdentity::inline("tera", Some("/v/a.tera"), "x"));
        assert_ne!(base, TemplateIdentity::inline("tera", None, "y"));
        // length prefixes keep part boundaries apart
        assert_ne!(
            TemplateIdentity::inline("ab", None, "c"),
            TemplateIdentity::inline("a", None, "bc")
        );
    }

    #[test]
    fn test_path_and_display() {
        let file = TemplateIdentity::file("/views/user.hbs");
        assert_eq!(file.path(), Some(Path::new("/views/user.hbs")));
        assert_eq!(file.to_string(), "/views/user.hbs");

        let inline = TemplateIdentity::inline("tera", None, "x");
        assert_eq!(inline.path(), None);
        assert!(inline.to_string().starts_with("<inline:"));
    }

    #[test]
    fn test_compiled_keys_distinguish_engines() {
        let id = TemplateIdentity::file("/views/user.html");
        assert_ne!(
            CompiledKey::new("tera", id.clone()),
            CompiledKey::new("minijinja", id)
        );
    }
}
