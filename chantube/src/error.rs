//! Application-wide error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error while {op} {}: {source}", path.display())]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Process error: {0}")]
    Process(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn process(msg: impl Into<String>) -> Self {
        Self::Process(msg.into())
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Failure scoped to a single channel's pipeline.
///
/// Never crosses channel boundaries: the worker that hit it logs it and
/// marks its own channel as failed.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("storage unavailable: {0}")]
    Storage(#[source] Error),

    #[error("discovery failed: {0}")]
    Discovery(#[source] Error),

    #[error("acquisition of '{title}' failed: {source}")]
    Acquisition {
        title: String,
        #[source]
        source: Error,
    },

    #[error("retention sweep failed: {0}")]
    Retention(#[source] Error),

    #[error("channel {0} no longer exists")]
    Removed(u64),
}

/// Failure at the coordinator level, after channel work has been recorded.
#[derive(Error, Debug)]
pub enum PassError {
    #[error("failed to persist channel registry: {0}")]
    Persist(#[source] Error),

    #[error("library refresh failed for {failed} of {attempted} services")]
    Dispatch { attempted: usize, failed: usize },
}
