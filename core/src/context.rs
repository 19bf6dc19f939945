//! Launch context: the host runtime's argument vector and environment.
//!
//! Fixes never touch the process-global environment. They mutate a
//! `LaunchContext` that the host hands in, and the host decides what to do
//! with the result (exec the game, pass env to the installer, ...).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::data::prefix::PrefixLayout;

/// Launch verb that makes the runtime start the game immediately.
pub const RUN_VERB: &str = "run";
/// Launch verb that makes the runtime wait for wineserver before starting.
pub const WAIT_RUN_VERB: &str = "waitforexitandrun";

/// DLLs disabled by `disable_nvapi`.
const NVAPI_DLLS: [&str; 6] = [
    "nvapi",
    "nvapi64",
    "nvcuda",
    "nvcuvid",
    "nvencodeapi",
    "nvencodeapi64",
];

#[derive(Debug, Clone)]
pub struct LaunchContext {
    args: Vec<String>,
    env: BTreeMap<String, String>,
    dll_overrides: BTreeMap<String, String>,
    prefix: PrefixLayout,
}

impl LaunchContext {
    pub fn new(
        args: Vec<String>,
        env: BTreeMap<String, String>,
        prefix: PrefixLayout,
    ) -> Self {
        LaunchContext {
            args,
            env,
            dll_overrides: BTreeMap::new(),
            prefix,
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn prefix(&self) -> &PrefixLayout {
        &self.prefix
    }

    // -------------------------------------------------------------------
    // Environment
    // -------------------------------------------------------------------

    /// Add or override an environment variable.
    pub fn set_env(&mut self, key: &str, value: &str) {
        info!(key, value, "setting env");
        self.env.insert(key.to_string(), value.to_string());
    }

    /// Remove an environment variable. Removing an unset variable is fine.
    pub fn del_env(&mut self, key: &str) {
        info!(key, "removing env");
        self.env.remove(key);
    }

    pub fn disable_dxvk(&mut self) {
        self.set_env("PROTON_USE_WINED3D", "1");
    }

    pub fn enable_dxvk_async(&mut self) {
        self.set_env("DXVK_ASYNC", "1");
    }

    pub fn disable_esync(&mut self) {
        self.set_env("PROTON_NO_ESYNC", "1");
    }

    pub fn disable_fsync(&mut self) {
        self.set_env("PROTON_NO_FSYNC", "1");
    }

    pub fn force_lgadd(&mut self) {
        self.set_env("PROTON_FORCE_LARGE_ADDRESS_AWARE", "1");
    }

    pub fn use_seccomp(&mut self) {
        self.set_env("PROTON_USE_SECCOMP", "1");
    }

    // -------------------------------------------------------------------
    // DLL overrides
    // -------------------------------------------------------------------

    /// Override how Wine loads `dll` (`"n"`, `"b"`, `"n,b"`, or `""` to disable).
    pub fn winedll_override(&mut self, dll: &str, kind: &str) {
        info!(dll, kind, "overriding dll");
        self.dll_overrides.insert(dll.to_string(), kind.to_string());
    }

    pub fn disable_nvapi(&mut self) {
        info!("disabling NvAPI");
        for dll in NVAPI_DLLS {
            self.winedll_override(dll, "");
        }
    }

    pub fn dll_overrides(&self) -> &BTreeMap<String, String> {
        &self.dll_overrides
    }

    /// Render overrides in `WINEDLLOVERRIDES` syntax: `name=kind;name=kind`.
    pub fn dll_overrides_string(&self) -> String {
        self.dll_overrides
            .iter()
            .map(|(dll, kind)| format!("{}={}", dll, kind))
            .collect::<Vec<_>>()
            .join(";")
    }

    // -------------------------------------------------------------------
    // Argument vector
    // -------------------------------------------------------------------

    /// Switch the launch verb from `run` to `waitforexitandrun` so the runtime
    /// waits for installers we start. Returns whether anything changed; calling
    /// it again is a no-op.
    pub fn ensure_wait_for_exit(&mut self) -> bool {
        let mut changed = false;
        for arg in self.args.iter_mut() {
            if arg == RUN_VERB {
                *arg = WAIT_RUN_VERB.to_string();
                changed = true;
            }
        }
        if changed {
            debug!(args = ?self.args, "launch verb switched to waitforexitandrun");
        }
        changed
    }

    /// Replace `orig` with `repl` inside every argument containing it.
    pub fn replace_command(&mut self, orig: &str, repl: &str) {
        info!(orig, repl, "changing command line");
        for arg in self.args.iter_mut() {
            if arg.contains(orig) {
                *arg = arg.replace(orig, repl);
            }
        }
    }

    pub fn append_argument(&mut self, argument: &str) {
        info!(argument, "adding argument");
        self.args.push(argument.to_string());
        debug!(args = ?self.args, "new command line");
    }

    // -------------------------------------------------------------------
    // Runtime detection
    // -------------------------------------------------------------------

    /// Directory holding the runtime script (dirname of argv[0]).
    pub fn runtime_dir(&self) -> PathBuf {
        self.args
            .first()
            .and_then(|a| Path::new(a).parent())
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// `"<major>.<minor>"` parsed from a `Proton X.Y` component of argv[0].
    pub fn name_version(&self) -> Option<String> {
        let version = self.args.first().and_then(|a| parse_name_version(a));
        if version.is_none() {
            warn!("runtime version not parsed from command line");
        }
        version
    }

    /// Build timestamp from the first line of `<runtime_dir>/version`; 0 when
    /// the file is missing or malformed.
    pub fn time_version(&self) -> u64 {
        let path = self.runtime_dir().join("version");
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => {
                warn!(path = %path.display(), "runtime version file not found");
                return 0;
            }
        };
        let first = content
            .lines()
            .next()
            .and_then(|l| l.split_whitespace().next());
        match first.and_then(|t| t.parse::<u64>().ok()) {
            Some(ts) => ts,
            None => {
                warn!(path = %path.display(), "runtime version not parsed from file");
                0
            }
        }
    }

    pub fn wine_bin(&self) -> PathBuf {
        self.dist_bin_dir().join("wine")
    }

    pub fn wineserver_bin(&self) -> PathBuf {
        self.dist_bin_dir().join("wineserver")
    }

    /// `files/bin` in current runtimes, `dist/bin` in older ones.
    fn dist_bin_dir(&self) -> PathBuf {
        let dir = self.runtime_dir();
        let files = dir.join("files").join("bin");
        if files.is_dir() {
            return files;
        }
        let dist = dir.join("dist").join("bin");
        if dist.is_dir() {
            return dist;
        }
        files
    }
}

fn parse_name_version(arg: &str) -> Option<String> {
    let rest = &arg[arg.find("Proton ")? + "Proton ".len()..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    let candidate = &rest[..end];
    let (major, minor) = candidate.split_once('.')?;
    let minor: String = minor.chars().take_while(|c| c.is_ascii_digit()).collect();
    if major.is_empty() || minor.is_empty() {
        return None;
    }
    Some(format!("{}.{}", major, minor))
}
