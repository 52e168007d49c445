//! Unified error handling for the replay engine
//!
//! Only a handful of conditions abort a call: time that does not advance or
//! does not sit on a whole second, a starting snapshot that is missing or too
//! old, and failures of the historical data collaborators. Everything the
//! historical feed can legitimately throw at the matching engine (unknown
//! cancellation targets, redundant deletions) is tolerated and never surfaces
//! here.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum ReplayError {
    // Episode timing errors
    NonGranularTime(DateTime<Utc>),
    NonMonotonicStep {
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    },
    EpisodeNotStarted,

    // Historical data errors
    SnapshotMissing {
        ticker: String,
        at: DateTime<Utc>,
    },
    SnapshotStale {
        at: DateTime<Utc>,
        snapshot_time: DateTime<Utc>,
        max_age: Duration,
    },
    DataSource(String),

    // Configuration errors
    ConfigNotFound(String),
    ConfigParse(String),
    ConfigValidation(String),

    // IO errors
    FileNotFound(String),
    FileRead(String),
    FileWrite(String),
    DataParse(String),
}

impl ReplayError {
    /// Get a user-friendly error message with helpful context
    pub fn user_message(&self) -> String {
        match self {
            ReplayError::NonGranularTime(at) => {
                format!(
                    "Episode time {} is not on a whole second\n\n\
                    💡 Episodes start and step on second boundaries; drop the sub-second part",
                    at
                )
            }
            ReplayError::SnapshotMissing { ticker, at } => {
                format!(
                    "No {} book snapshot at or before {}\n\n\
                    💡 Check:\n\
                    - The history covers the requested trading day\n\
                    - The episode does not start before the first snapshot",
                    ticker, at
                )
            }
            ReplayError::SnapshotStale { at, snapshot_time, max_age } => {
                format!(
                    "Latest snapshot before {} was taken at {} (more than {}s earlier)\n\n\
                    💡 Pick a start time on a day the history covers",
                    at,
                    snapshot_time,
                    max_age.num_seconds()
                )
            }
            ReplayError::ConfigNotFound(path) => {
                format!(
                    "Configuration file not found: {}\n\n\
                    💡 Run with --init to write a default config",
                    path
                )
            }
            _ => self.to_string(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ReplayError::NonGranularTime(_)
            | ReplayError::NonMonotonicStep { .. }
            | ReplayError::EpisodeNotStarted => "episode",

            ReplayError::SnapshotMissing { .. }
            | ReplayError::SnapshotStale { .. }
            | ReplayError::DataSource(_) => "history",

            ReplayError::ConfigNotFound(_)
            | ReplayError::ConfigParse(_)
            | ReplayError::ConfigValidation(_) => "config",

            ReplayError::FileNotFound(_)
            | ReplayError::FileRead(_)
            | ReplayError::FileWrite(_)
            | ReplayError::DataParse(_) => "io",
        }
    }
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::NonGranularTime(at) => {
                write!(f, "Episode time must fall on a whole second, got {}", at)
            }
            ReplayError::NonMonotonicStep { now, until } => {
                write!(
                    f,
                    "The current time is {}, but we are trying to step forward until {}",
                    now, until
                )
            }
            ReplayError::EpisodeNotStarted => {
                write!(f, "No episode is running; call reset_episode first")
            }

            ReplayError::SnapshotMissing { ticker, at } => {
                write!(f, "There is no {} snapshot at or before {}", ticker, at)
            }
            ReplayError::SnapshotStale { at, snapshot_time, max_age } => {
                write!(
                    f,
                    "Snapshot at {} is more than {}s older than {}",
                    snapshot_time,
                    max_age.num_seconds(),
                    at
                )
            }
            ReplayError::DataSource(msg) => {
                write!(f, "Historical data error: {}", msg)
            }

            ReplayError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path)
            }
            ReplayError::ConfigParse(msg) => {
                write!(f, "Configuration parse error: {}", msg)
            }
            ReplayError::ConfigValidation(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }

            ReplayError::FileNotFound(path) => {
                write!(f, "File not found: {}", path)
            }
            ReplayError::FileRead(msg) => {
                write!(f, "File read error: {}", msg)
            }
            ReplayError::FileWrite(msg) => {
                write!(f, "File write error: {}", msg)
            }
            ReplayError::DataParse(msg) => {
                write!(f, "Data parse error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ReplayError {}

// Conversion implementations for common error types

impl From<io::Error> for ReplayError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ReplayError::FileNotFound(err.to_string()),
            _ => ReplayError::FileRead(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ReplayError {
    fn from(err: serde_json::Error) -> Self {
        ReplayError::DataParse(format!("JSON parse error: {}", err))
    }
}

impl From<toml::de::Error> for ReplayError {
    fn from(err: toml::de::Error) -> Self {
        ReplayError::ConfigParse(format!("TOML parse error: {}", err))
    }
}

impl From<crate::config::ConfigError> for ReplayError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::FileRead(msg) => ReplayError::ConfigNotFound(msg),
            ConfigError::FileWrite(msg) => ReplayError::FileWrite(msg),
            ConfigError::Parse(msg) | ConfigError::Serialize(msg) => ReplayError::ConfigParse(msg),
            ConfigError::Validation(msg) => ReplayError::ConfigValidation(msg),
        }
    }
}

/// Result type alias using ReplayError
pub type ReplayResult<T> = Result<T, ReplayError>;
