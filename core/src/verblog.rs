//! Readers for the winetricks verb logs.
//!
//! winetricks appends one line per installed verb to `winetricks.log`. Bare
//! verbs (`vcrun2019`) are installed once they appear anywhere in the log.
//! Setting verbs (`sound=alsa`) can change over time, so only the last line
//! for a given key counts.
//!
//! The forced log (`winetricks.log.forced`) is written by us, never by
//! winetricks, and any verb in it is treated as installed.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::data::prefix::PrefixLayout;
use crate::error::FixError;

/// One append-only verb log file.
#[derive(Debug, Clone)]
pub struct VerbLog {
    path: PathBuf,
}

impl VerbLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        VerbLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `verb` is recorded as installed in this log.
    ///
    /// A missing log means nothing is installed. Other read errors are logged
    /// and also read as "not installed".
    pub fn is_installed(&self, verb: &str) -> bool {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => log_contains(&content, verb),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read verb log");
                false
            }
        }
    }

    /// Append `verb` as a new line, creating the log if needed.
    pub fn append(&self, verb: &str) -> Result<(), FixError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| FixError::io(&self.path, e))?;
        writeln!(file, "{}", verb).map_err(|e| FixError::io(&self.path, e))
    }
}

/// Apply the verb matching rules to log content.
pub fn log_contains(content: &str, verb: &str) -> bool {
    match verb.split_once('=') {
        None => content.lines().any(|line| line.trim() == verb),
        Some((key, _)) => {
            let prefix = format!("{}=", key);
            content
                .lines()
                .map(str::trim)
                .filter(|line| line.starts_with(&prefix))
                .last()
                .is_some_and(|line| line == verb)
        }
    }
}

/// The standard and forced logs of one prefix.
#[derive(Debug, Clone)]
pub struct VerbLogs {
    standard: VerbLog,
    forced: VerbLog,
}

impl VerbLogs {
    pub fn new(standard: VerbLog, forced: VerbLog) -> Self {
        VerbLogs { standard, forced }
    }

    pub fn for_prefix(layout: &PrefixLayout) -> Self {
        VerbLogs::new(
            VerbLog::new(layout.verb_log()),
            VerbLog::new(layout.forced_verb_log()),
        )
    }

    pub fn standard(&self) -> &VerbLog {
        &self.standard
    }

    pub fn forced(&self) -> &VerbLog {
        &self.forced
    }

    /// Installed per the forced log, else per the winetricks log.
    pub fn check_installed(&self, verb: &str) -> bool {
        info!(verb, "checking if winetricks verb is installed");
        if self.forced.is_installed(verb) {
            debug!(verb, "found in forced log");
            return true;
        }
        self.standard.is_installed(verb)
    }

    /// Record `verb` in the forced log so it is never installed again.
    pub fn force_record(&self, verb: &str) -> Result<(), FixError> {
        self.forced.append(verb)
    }
}
