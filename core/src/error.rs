//! Error types shared across the core crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by prefix, ledger, config, and process operations.
///
/// Verification problems (a verb missing from the winetricks log, a missing
/// installer binary) are not errors; they are logged and reported through
/// boolean results instead.
#[derive(Debug, Error)]
pub enum FixError {
    /// Filesystem I/O failed on the given path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required environment variable is not set.
    #[error("environment variable {0} is not set")]
    MissingEnv(String),

    /// The configuration file could not be parsed or written.
    #[error("config error: {0}")]
    Config(String),

    /// A child process could not be spawned.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The JSON ledger index is corrupt.
    #[error("ledger index {} is corrupt: {message}", path.display())]
    Index { path: PathBuf, message: String },
}

impl FixError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FixError::Io {
            path: path.into(),
            source,
        }
    }
}
