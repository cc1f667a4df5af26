//! Tween engine error types

use thiserror::Error;

/// Errors surfaced by the tween engine
///
/// Only construction problems are errors. Numeric edge cases are clamped and
/// ownership conflicts are resolved silently by the registry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TweenError {
    /// Tween could not be constructed (no target, unusable arguments)
    #[error("Invalid Tween: {0}")]
    InvalidTween(String),

    /// Cubic bezier control points out of range
    #[error("Invalid cubic-bezier control points: {0:?}")]
    InvalidBezier([f64; 4]),

    /// Timeline step rejected by validation
    #[error("Invalid timeline step `{label}`: {reason}")]
    InvalidStep { label: String, reason: String },

    /// Timeline label without a definition
    #[error("Unknown timeline label: {0}")]
    UnknownLabel(String),

    /// Malformed engine or tween configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl TweenError {
    pub(crate) fn invalid_step(label: &str, reason: impl Into<String>) -> Self {
        Self::InvalidStep {
            label: label.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for tween engine operations
pub type Result<T> = std::result::Result<T, TweenError>;
