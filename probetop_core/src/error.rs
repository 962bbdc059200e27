//! Error taxonomy for readers and engine configuration.
//!
//! Read errors never escape a sampling pipeline: they are folded into
//! availability flags or one-cycle gaps. `EngineError` is the only type handed
//! back to callers, and only for configuration mistakes or startup failures.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::Category;

#[derive(Debug, Error)]
pub enum ReadError {
    /// Source missing or not readable by this user. Retried at a slow cadence.
    #[error("{path}: unavailable ({source})")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Any other I/O failure. Retried next tick.
    #[error("{path}: read failed ({source})")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Content was truncated or not in the expected format. Retried next tick.
    #[error("{path}: malformed ({reason})")]
    Malformed { path: PathBuf, reason: String },
    /// Process exited between enumeration and detail read.
    #[error("pid {0} vanished during scan")]
    Vanished(u32),
}

impl ReadError {
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                ReadError::Unavailable { path, source }
            }
            _ => ReadError::Io { path, source },
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ReadError::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when retrying on the very next tick is pointless.
    pub fn is_persistent(&self) -> bool {
        matches!(self, ReadError::Unavailable { .. })
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid rate for {category}: {reason}")]
    InvalidRate { category: Category, reason: String },
    #[error("invalid display scale for {category}: min {min} must be below max {max}")]
    InvalidScale {
        category: Category,
        min: f64,
        max: f64,
    },
    #[error("history capacity must be at least 1")]
    ZeroHistory,
    #[error("clock ticks per second must be at least 1")]
    ZeroClockTicks,
    #[error("page size must be at least 1 byte")]
    ZeroPageSize,
    #[error("engine already shut down")]
    Stopped,
}
