//! Error types for the mapress core

use thiserror::Error;

/// An outline or topic map that does not conform to its shape constraints.
///
/// `path` points at the offending element, e.g. `categories[2].facts[0].bullets[1]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{path}: expected between {min} and {max}, found {actual}")]
    Count {
        path: String,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("{path}: expected at least {min}, found {actual}")]
    TooFew {
        path: String,
        min: usize,
        actual: usize,
    },

    #[error("{path}: {actual} characters exceeds the limit of {max}")]
    TooLong {
        path: String,
        max: usize,
        actual: usize,
    },

    #[error("{path}: invalid url {url:?}: {reason}")]
    InvalidUrl {
        path: String,
        url: String,
        reason: String,
    },

    #[error("{path}: must not be empty")]
    Empty { path: String },
}

impl ValidationError {
    pub fn path(&self) -> &str {
        match self {
            Self::Count { path, .. }
            | Self::TooFew { path, .. }
            | Self::TooLong { path, .. }
            | Self::InvalidUrl { path, .. }
            | Self::Empty { path } => path,
        }
    }
}

/// Failure to turn raw LLM output into a usable outline.
#[derive(Debug, Error)]
pub enum OutlineError {
    #[error("outline is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("outline failed validation: {0}")]
    Invalid(#[from] ValidationError),
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}
