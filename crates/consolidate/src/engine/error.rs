/*
 * engine/error.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Error types for template engines and their acquisition.
 */

//! Error types for template engines.

use thiserror::Error;

/// Errors reported by a [`TemplateEngine`](super::TemplateEngine) or one of
/// its compiled artifacts.
///
/// Engines only know about template text, so these carry a message and
/// nothing else. The render façade attaches the engine and template names
/// when it turns them into a [`RenderError`](crate::RenderError).
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine rejected the template source.
    #[error("compile failed: {0}")]
    Compile(String),

    /// The compiled template failed while rendering.
    #[error("render failed: {0}")]
    Execution(String),

    /// An engine-specific option had an unusable value.
    #[error("invalid option '{option}': {message}")]
    InvalidOption {
        /// The option key
        option: String,
        /// What was wrong with it
        message: String,
    },
}

impl EngineError {
    /// Create a compile error from any displayable engine error.
    pub fn compile(err: impl std::fmt::Display) -> Self {
        Self::Compile(err.to_string())
    }

    /// Create an execution error from any displayable engine error.
    pub fn execution(err: impl std::fmt::Display) -> Self {
        Self::Execution(err.to_string())
    }
}

/// A single provider's failure inside a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// Name of the provider that failed
    pub provider: String,
    /// Why it failed
    pub message: String,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.message)
    }
}

/// Errors that can occur while acquiring an engine from the registry.
#[derive(Debug, Clone, Error)]
pub enum AcquireError {
    /// No engine is registered under this name.
    #[error("Engine not registered: {name}")]
    Unregistered {
        /// The requested engine name
        name: String,
    },

    /// Every provider in the fallback chain failed.
    #[error("Engine '{name}' could not be acquired: {}", format_attempts(.attempts))]
    AllProvidersFailed {
        /// The requested engine name
        name: String,
        /// One entry per provider, in the order they were tried
        attempts: Vec<ProviderFailure>,
    },
}

fn format_attempts(attempts: &[ProviderFailure]) -> String {
    if attempts.is_empty() {
        return "no providers registered".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
