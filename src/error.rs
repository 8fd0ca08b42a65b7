//! Error types for seqlsh.

use crate::persistence::PersistenceError;
use thiserror::Error;

/// Errors that can occur while building or querying an index.
///
/// Bin overflow is deliberately absent: a full bin degrades into a
/// collision marker and never surfaces as an error.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Invalid parameter value, detected before any work starts.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed input (empty header, empty sequence, missing feature label).
    #[error("input format error: {0}")]
    InputFormat(String),

    /// A signature was requested for an id that was never indexed.
    #[error("no signature cached for instance {0}")]
    UnknownInstance(u32),

    /// The whole run produced no instances.
    #[error("no instances were produced from the input")]
    NoInstances,

    /// A pipeline stage died without reporting an error of its own.
    #[error("pipeline failure: {0}")]
    Pipeline(String),

    /// Snapshot read/write failure.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// I/O error while reading input.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub(crate) fn input(msg: impl Into<String>) -> Self {
        Self::InputFormat(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
