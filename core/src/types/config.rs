use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which backing store the ledger uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    /// One zero-byte marker file per action under `drive_c/protonfixes/run/`.
    #[default]
    Markers,
    /// A single JSON index file at `drive_c/protonfixes/run.json`.
    Index,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub version: String,
    /// Explicit winetricks path. When unset, `winetricks` beside the running
    /// executable is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_path: Option<PathBuf>,
    /// User-local custom verb directory, searched before the bundled one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_verb_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundled_verb_dir: Option<PathBuf>,
    /// Executable names killed after every installer run. An empty list
    /// disables reaping; an absent key means `default_hang_denylist()`.
    #[serde(default = "default_hang_denylist")]
    pub hang_denylist: Vec<String>,
    #[serde(default)]
    pub ledger_backend: LedgerBackend,
    #[serde(default)]
    pub log_level: String,
}

/// .NET's `mscorsvw.exe` outlives its installer and keeps wineserver busy.
pub fn default_hang_denylist() -> Vec<String> {
    vec!["mscorsvw.exe".into()]
}
