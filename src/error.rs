use std::io;
use thiserror::Error;

/// Failure of a single store write.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("invalid media name {0:?}")]
    InvalidName(String),
}

impl StoreError {
    /// Transient failures are retried by re-enqueueing the file.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{} files have invalid file names: {}", .0.len(), .0.join(", "))]
    UnnormalizedNames(Vec<String>),
    #[error("There are multiple files with same filename: {0}")]
    AmbiguousName(String),
    #[error("failed to compare {name}")]
    Compare {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("store saved {requested:?} as {stored:?}")]
    Integrity { requested: String, stored: String },
    #[error("failed to import {name}")]
    Write {
        name: String,
        #[source]
        source: StoreError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_and_unavailable_are_recoverable() {
        let io_err = StoreError::from(io::Error::new(io::ErrorKind::TimedOut, "slow disk"));
        assert!(io_err.is_recoverable());
        assert!(StoreError::Unavailable("offline".to_string()).is_recoverable());
        assert!(!StoreError::InvalidName("a/b".to_string()).is_recoverable());
    }

    #[test]
    fn unnormalized_message_lists_names() {
        let err = ImportError::UnnormalizedNames(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "2 files have invalid file names: a, b");
    }
}
