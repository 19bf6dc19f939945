//! Filesystem layout of a Proton prefix (one environment instance).

use std::path::{Path, PathBuf};

use crate::error::FixError;

/// Environment variable naming the compat data directory; the prefix is its
/// `pfx/` subdirectory.
pub const COMPAT_DATA_ENV: &str = "STEAM_COMPAT_DATA_PATH";

/// Paths derived from a prefix root. Constructing one touches nothing on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixLayout {
    root: PathBuf,
}

impl PrefixLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PrefixLayout { root: root.into() }
    }

    /// `$STEAM_COMPAT_DATA_PATH/pfx`.
    pub fn from_env() -> Result<Self, FixError> {
        let data = std::env::var(COMPAT_DATA_ENV)
            .map_err(|_| FixError::MissingEnv(COMPAT_DATA_ENV.into()))?;
        Ok(PrefixLayout::new(Path::new(&data).join("pfx")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of per-action marker files.
    pub fn ledger_dir(&self) -> PathBuf {
        self.root.join("drive_c").join("protonfixes").join("run")
    }

    /// Single-file alternative to the marker directory.
    pub fn ledger_index(&self) -> PathBuf {
        self.root.join("drive_c").join("protonfixes").join("run.json")
    }

    pub fn verb_log(&self) -> PathBuf {
        self.root.join("winetricks.log")
    }

    pub fn forced_verb_log(&self) -> PathBuf {
        self.root.join("winetricks.log.forced")
    }
}
