use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::FixError;
use crate::types::config::{default_hang_denylist, LedgerBackend, Settings};

/// The current settings version. Bump this when the settings format changes.
pub const SETTINGS_VERSION: &str = "0.1.0";

/// Returns sensible defaults for all settings fields.
pub fn default_settings() -> Settings {
    Settings {
        version: SETTINGS_VERSION.into(),
        installer_path: None,
        local_verb_dir: None,
        bundled_verb_dir: None,
        hang_denylist: default_hang_denylist(),
        ledger_backend: LedgerBackend::Markers,
        log_level: "info".into(),
    }
}


/// Resolve the config file location: `$PROTONFIX_CONFIG`, else
/// `~/.config/protonfixes/config.yaml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("PROTONFIX_CONFIG") {
        return PathBuf::from(path);
    }
    user_config_dir().join("config.yaml")
}


/// `~/.config/protonfixes`, the root for user-local overrides.
pub fn user_config_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".config").join("protonfixes")
}


/// Load `Settings` from a YAML file. A missing file yields the defaults;
/// fields absent from the file keep their default values.
pub fn load(path: &Path) -> Result<Settings, FixError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(default_settings());
        }
        Err(e) => return Err(FixError::io(path, e)),
    };
    parse(&content)
}


/// Parse settings from a YAML string, filling unset fields from defaults.
pub fn parse(content: &str) -> Result<Settings, FixError> {
    if content.trim().is_empty() {
        return Ok(default_settings());
    }
    let mut s: Settings =
        serde_yaml::from_str(content).map_err(|e| FixError::Config(e.to_string()))?;
    let defaults = default_settings();
    if s.version.is_empty() {
        s.version = defaults.version;
    }
    if s.log_level.is_empty() {
        s.log_level = defaults.log_level;
    }
    Ok(s)
}


pub fn serialize(settings: &Settings) -> Result<String, FixError> {
    serde_yaml::to_string(settings).map_err(|e| FixError::Config(e.to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_known_hanger() {
        let s = default_settings();
        assert_eq!(s.hang_denylist, vec!["mscorsvw.exe".to_string()]);
        assert_eq!(s.ledger_backend, LedgerBackend::Markers);
        assert_eq!(s.version, SETTINGS_VERSION);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = load(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(s, default_settings());
    }

    #[test]
    fn partial_file_keeps_defaults_for_unset_fields() {
        let s = parse("installer_path: /opt/winetricks\nledger_backend: index\n").unwrap();
        assert_eq!(s.installer_path, Some(PathBuf::from("/opt/winetricks")));
        assert_eq!(s.ledger_backend, LedgerBackend::Index);
        assert_eq!(s.hang_denylist, vec!["mscorsvw.exe".to_string()]);
        assert_eq!(s.log_level, "info");
    }

    #[test]
    fn explicit_denylist_replaces_default() {
        let s = parse("hang_denylist:\n  - foo.exe\n  - bar.exe\n").unwrap();
        assert_eq!(s.hang_denylist, vec!["foo.exe".to_string(), "bar.exe".to_string()]);
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        let err = parse("hang_denylist: [unterminated").unwrap_err();
        assert!(matches!(err, FixError::Config(_)));
    }

    #[test]
    fn empty_denylist_disables_reaping() {
        let s = parse("hang_denylist: []
").unwrap();
        assert!(s.hang_denylist.is_empty());
    }

    #[test]
    fn shown_settings_load_back_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut s = default_settings();
        s.local_verb_dir = Some(PathBuf::from("/home/u/verbs"));
        s.hang_denylist = Vec::new();
        s.log_level = "debug".into();
        std::fs::write(&path, serialize(&s).unwrap()).unwrap();
        assert_eq!(load(&path).unwrap(), s);
    }
}
