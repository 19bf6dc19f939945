//! Single-file JSON ledger.
//!
//! The whole index is read on every query and rewritten on every mark, via a
//! temp file and rename so a crash never leaves a half-written index.
//!
//! A corrupt index is never overwritten: queries answer "not run" and marks
//! fail. Until the file is repaired or removed, once-only protection is lost
//! for every action in the prefix, and a `MarkAlways` action runs again on
//! each launch, its `run_once` call returning the ledger error.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ActionId, Ledger};
use crate::error::FixError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    #[serde(default)]
    completed: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct IndexLedger {
    path: PathBuf,
}

impl IndexLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        IndexLedger { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<IndexFile, FixError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(IndexFile::default())
            }
            Err(e) => return Err(FixError::io(&self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(IndexFile::default());
        }
        serde_json::from_str(&content).map_err(|e| FixError::Index {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn write(&self, index: &IndexFile) -> Result<(), FixError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FixError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(index).map_err(|e| FixError::Index {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| FixError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| FixError::io(&self.path, e))
    }
}

impl Ledger for IndexLedger {
    fn has_run(&self, id: &ActionId) -> bool {
        match self.read() {
            Ok(index) => index.completed.contains(id.as_str()),
            Err(e) => {
                warn!(
                    action = %id,
                    path = %self.path.display(),
                    error = %e,
                    "ledger index unreadable, treating as not run; \
                     once-only actions will repeat until it is repaired"
                );
                false
            }
        }
    }

    fn mark_run(&self, id: &ActionId) -> Result<(), FixError> {
        let mut index = self.read()?;
        if !index.completed.insert(id.as_str().to_string()) {
            return Ok(());
        }
        self.write(&index)?;
        debug!(action = %id, path = %self.path.display(), "ledger index updated");
        Ok(())
    }
}
