//! Error types for snapshot persistence.

use thiserror::Error;

/// Errors that can occur while writing or reading an index snapshot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// I/O error (file operations, disk I/O)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Format error (bad magic, truncation, inconsistent sections)
    #[error("format error: {0}")]
    Format(String),

    /// Snapshot written by an incompatible format version
    #[error("format version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },
}

impl PersistenceError {
    /// Map an I/O error from a reader; premature EOF means a truncated file.
    pub(crate) fn from_read(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::Format("snapshot is truncated".to_string())
        } else {
            Self::Io(e)
        }
    }
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_maps_to_format() {
        let eof = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert!(matches!(
            PersistenceError::from_read(eof),
            PersistenceError::Format(_)
        ));
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(
            PersistenceError::from_read(denied),
            PersistenceError::Io(_)
        ));
    }
}
