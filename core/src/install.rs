//! Idempotent winetricks verb installation.
//!
//! `VerbInstaller::ensure_verb_installed` is the entry point fixes call. It
//! installs a verb at most once per prefix: the winetricks log (and our
//! forced log) is consulted first, and after an install that the log does
//! not reflect the verb is force-recorded so it is never retried.
//!
//! Force-recording also fires when winetricks failed outright before doing
//! anything, so a failed install can end up recorded as done. This matches
//! long-standing behaviour fixes rely on; remove the verb from
//! `winetricks.log.forced` to retry.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::context::LaunchContext;
use crate::data::settings::user_config_dir;
use crate::infrastructure::Invocation;
use crate::supervisor::{installer_env, Supervisor};
use crate::types::config::Settings;
use crate::verblog::VerbLogs;

/// File name of the bundled installer.
pub const INSTALLER_NAME: &str = "winetricks";

/// Where the installer and custom verb definitions live.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallerPaths {
    pub installer: PathBuf,
    /// Searched first, so users can override bundled verbs.
    pub local_verb_dir: PathBuf,
    pub bundled_verb_dir: PathBuf,
}

impl InstallerPaths {
    /// Resolve paths from settings, defaulting to locations beside the
    /// running executable and under `~/.config/protonfixes`.
    pub fn from_settings(settings: &Settings) -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        InstallerPaths {
            installer: settings
                .installer_path
                .clone()
                .unwrap_or_else(|| exe_dir.join(INSTALLER_NAME)),
            local_verb_dir: settings
                .local_verb_dir
                .clone()
                .unwrap_or_else(|| user_config_dir().join("localfixes").join("verbs")),
            bundled_verb_dir: settings
                .bundled_verb_dir
                .clone()
                .unwrap_or_else(|| exe_dir.join("gamefixes").join("verbs")),
        }
    }

    /// Path to `<verb>.verb`, local directory first.
    pub fn custom_verb(&self, verb: &str) -> Option<PathBuf> {
        let file_name = format!("{}.verb", verb);
        for dir in [&self.local_verb_dir, &self.bundled_verb_dir] {
            let candidate = dir.join(&file_name);
            if candidate.is_file() {
                debug!(path = %candidate.display(), "using custom winetricks verb");
                return Some(candidate);
            }
        }
        None
    }
}

pub struct VerbInstaller<'a> {
    paths: InstallerPaths,
    supervisor: Supervisor<'a>,
}

impl<'a> VerbInstaller<'a> {
    pub fn new(paths: InstallerPaths, supervisor: Supervisor<'a>) -> Self {
        VerbInstaller { paths, supervisor }
    }

    /// Make sure `verb` is installed in the context's prefix.
    ///
    /// Returns `false` only when the installer or the runtime's wineserver
    /// is missing; nothing is run or recorded then. Installer failures are
    /// logged but still return `true`; see the module docs.
    pub fn ensure_verb_installed(&self, ctx: &mut LaunchContext, verb: &str) -> bool {
        self.install(ctx, verb, false)
    }

    /// Like `ensure_verb_installed`, but passes `--force` so winetricks
    /// reinstalls over a partial earlier attempt.
    pub fn ensure_verb_forced(&self, ctx: &mut LaunchContext, verb: &str) -> bool {
        self.install(ctx, verb, true)
    }

    /// Installer arguments for `verb`: a custom verb file if one exists,
    /// otherwise the verb's whitespace-separated tokens.
    pub fn installer_args(&self, verb: &str, force: bool) -> Vec<String> {
        let mut args = vec!["--unattended".to_string()];
        if let Some(custom) = self.paths.custom_verb(verb) {
            args.push(custom.display().to_string());
            return args;
        }
        if force {
            args.push("--force".to_string());
        }
        args.extend(verb.split_whitespace().map(str::to_string));
        args
    }

    fn install(&self, ctx: &mut LaunchContext, verb: &str, force: bool) -> bool {
        let logs = VerbLogs::for_prefix(ctx.prefix());
        if logs.check_installed(verb) {
            return true;
        }

        info!(verb, force, "installing winetricks verb");
        let args = self.installer_args(verb, force);
        if !self.paths.installer.is_file() {
            warn!(
                path = %self.paths.installer.display(),
                verb,
                "winetricks not found, cannot install verb"
            );
            return false;
        }
        // The installer env points at the runtime's wine binaries.
        let wineserver = ctx.wineserver_bin();
        if !wineserver.is_file() {
            warn!(
                path = %wineserver.display(),
                verb,
                "runtime wineserver not found, cannot install verb"
            );
            return false;
        }

        if ctx.ensure_wait_for_exit() {
            debug!(args = ?ctx.args(), "runtime will wait for the installer");
        }

        let command = Invocation::new(self.paths.installer.clone(), args, installer_env(ctx));
        // The exit status is not trusted either way; the log re-check decides.
        if let Err(e) = self.supervisor.run_installer(&command) {
            warn!(verb, error = %e, "installer run failed");
        }

        if !logs.check_installed(verb) {
            warn!(verb, "not recorded as installed by winetricks, forcing");
            if let Err(e) = logs.force_record(verb) {
                warn!(verb, error = %e, "could not record forced verb");
            }
        }

        info!(verb, "winetricks complete");
        true
    }
}
