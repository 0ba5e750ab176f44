//! Error types shared by the model service and the HTTP layer.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while reading or writing model artifacts. At startup these are fatal.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write model artifact {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("invalid model metadata {path}: {source}")]
    Metadata {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("model predicts {found} classes, expected {expected}")]
    ClassCount { expected: usize, found: usize },
}

/// Failures of the model call itself, surfaced to clients as 500.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("X has {found} features, but the model is expecting {expected} features as input")]
    Shape { expected: usize, found: usize },

    #[error("model produced unknown class index {0}")]
    UnknownClass(usize),
}
