//! Typed errors for the provisioning and query paths.
//!
//! Provisioning errors ([`DataLoadError`], [`IndexLoadError`]) are fatal:
//! they abort startup and surface through `anyhow` at the CLI boundary.
//! [`QueryError`] is recovered at the pipeline boundary — it becomes a
//! visible assistant message and the session keeps going.

use std::path::PathBuf;
use thiserror::Error;

/// Source documents could not be turned into an index.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("document directory does not exist: {0}")]
    MissingSourceDir(PathBuf),

    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no usable documents found in {0}")]
    EmptyCorpus(PathBuf),

    #[error("invalid glob pattern: {0}")]
    BadGlob(#[from] globset::Error),

    #[error("embedding backend failed during index build: {0}")]
    Embedding(#[source] anyhow::Error),
}

/// The persisted index exists but could not be reloaded.
#[derive(Debug, Error)]
pub enum IndexLoadError {
    #[error("persisted index is missing required file: {0}")]
    MissingFile(PathBuf),

    #[error("persisted index is corrupt: {0}")]
    Corrupt(String),

    #[error("failed to open persisted index: {0}")]
    Storage(#[from] sqlx::Error),
}

/// A query against the index failed. Never fatal to the host process.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to embed query: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("chat backend failed: {0}")]
    Backend(#[source] anyhow::Error),

    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
}

/// Union returned by the index provisioner.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    DataLoad(#[from] DataLoadError),

    #[error(transparent)]
    IndexLoad(#[from] IndexLoadError),

    #[error("failed to persist index: {0}")]
    Persist(#[source] anyhow::Error),
}
