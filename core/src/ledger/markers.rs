//! Marker-file ledger: presence of `<dir>/<action id>` means done.

use std::fs::OpenOptions;
use std::path::PathBuf;

use tracing::debug;

use super::{ActionId, Ledger};
use crate::error::FixError;

#[derive(Debug, Clone)]
pub struct MarkerLedger {
    dir: PathBuf,
}

impl MarkerLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        MarkerLedger { dir: dir.into() }
    }

    fn marker(&self, id: &ActionId) -> PathBuf {
        self.dir.join(id.as_str())
    }
}

impl Ledger for MarkerLedger {
    fn has_run(&self, id: &ActionId) -> bool {
        self.marker(id).exists()
    }

    fn mark_run(&self, id: &ActionId) -> Result<(), FixError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| FixError::io(&self.dir, e))?;
        let path = self.marker(id);
        // Opening in append mode leaves an existing marker untouched.
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| FixError::io(&path, e))?;
        debug!(action = %id, path = %path.display(), "ledger marker written");
        Ok(())
    }
}
