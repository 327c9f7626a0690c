//! Error types shared by the backup engine, scheduler and watcher.

use std::path::PathBuf;

use thiserror::Error;

use crate::error_codes::{
    ERR_CONFIG, ERR_INVALID_DESTINATION, ERR_INVALID_INTERVAL, ERR_INVALID_SOURCE, ERR_IO,
    ERR_NO_RUNTIME, ERR_PATH_UNAVAILABLE, ERR_WATCH_ROOT_LOST, ERR_WATCH_START_FAILED,
};

/// Source/destination validation and volume lookup failures.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Invalid source path: {0}")]
    InvalidSource(PathBuf),

    #[error("Invalid destination path: {0}")]
    InvalidDestination(PathBuf),

    #[error("Path unavailable: {path}: {reason}")]
    PathUnavailable { path: PathBuf, reason: String },
}

impl PathError {
    pub fn code(&self) -> &'static str {
        match self {
            PathError::InvalidSource(_) => ERR_INVALID_SOURCE,
            PathError::InvalidDestination(_) => ERR_INVALID_DESTINATION,
            PathError::PathUnavailable { .. } => ERR_PATH_UNAVAILABLE,
        }
    }
}

/// Whole-pass failures of a synchronize call. Per-file failures are
/// collected in the report instead.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },

    #[error("Sync root is not a directory: {0}")]
    InvalidRoot(PathBuf),
}

impl SyncError {
    pub fn code(&self) -> &'static str {
        ERR_IO
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IntervalError {
    #[error("Invalid input. Please enter a valid number of minutes.")]
    InvalidInterval,
}

impl IntervalError {
    pub fn code(&self) -> &'static str {
        ERR_INVALID_INTERVAL
    }
}

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to subscribe to {path}: {source}")]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Watch root lost: {0}")]
    RootLost(PathBuf),

    #[error(transparent)]
    Path(#[from] PathError),
}

impl WatchError {
    pub fn code(&self) -> &'static str {
        match self {
            WatchError::Subscribe { .. } => ERR_WATCH_START_FAILED,
            WatchError::RootLost(_) => ERR_WATCH_ROOT_LOST,
            WatchError::Path(e) => e.code(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Interval(#[from] IntervalError),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Interval(e) => e.code(),
            _ => ERR_CONFIG,
        }
    }
}

/// Errors surfaced by scheduler operations.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error("No async runtime available to drive the backup timer")]
    NoRuntime,
}

impl SchedulerError {
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::Path(e) => e.code(),
            SchedulerError::Sync(e) => e.code(),
            SchedulerError::Interval(e) => e.code(),
            SchedulerError::NoRuntime => ERR_NO_RUNTIME,
        }
    }
}

impl serde::Serialize for SchedulerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            PathError::InvalidSource(PathBuf::from("/x")).code(),
            "ERR_INVALID_SOURCE"
        );
        assert_eq!(
            PathError::InvalidDestination(PathBuf::from("/x")).code(),
            "ERR_INVALID_DESTINATION"
        );
        assert_eq!(IntervalError::InvalidInterval.code(), "ERR_INVALID_INTERVAL");
        assert_eq!(
            SchedulerError::from(IntervalError::InvalidInterval).code(),
            "ERR_INVALID_INTERVAL"
        );
        assert_eq!(WatchError::RootLost(PathBuf::from("/x")).code(), "ERR_WATCH_ROOT_LOST");
    }

    #[test]
    fn test_scheduler_error_serializes_as_message() {
        let err = SchedulerError::from(PathError::InvalidDestination(PathBuf::from("/dst")));
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Invalid destination path: /dst\"");
    }
}
