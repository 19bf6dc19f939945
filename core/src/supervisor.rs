//! Process supervisor for the verb installer.
//!
//! Runs one installer invocation to completion: settle wineserver first,
//! run the installer, then reap known hangers it left behind. There is no
//! timeout; a hung installer blocks the launch until it is killed externally.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::context::LaunchContext;
use crate::error::FixError;
use crate::infrastructure::{CommandRunner, ExitOutcome, HangReaper, Invocation};

/// Build the installer's complete environment from the launch context.
pub fn installer_env(ctx: &LaunchContext) -> BTreeMap<String, String> {
    let mut env = ctx.env().clone();
    let wine = ctx.wine_bin().display().to_string();
    let wineserver = ctx.wineserver_bin().display().to_string();
    env.insert(
        "WINEPREFIX".into(),
        ctx.prefix().root().display().to_string(),
    );
    env.insert("WINE".into(), wine.clone());
    env.insert("WINELOADER".into(), wine);
    env.insert("WINESERVER".into(), wineserver);
    env.insert("WINETRICKS_LATEST_VERSION_CHECK".into(), "disabled".into());
    env.insert("LD_PRELOAD".into(), String::new());
    env
}

pub struct Supervisor<'a> {
    runner: &'a dyn CommandRunner,
    reaper: &'a dyn HangReaper,
    denylist: Vec<String>,
}

impl<'a> Supervisor<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        reaper: &'a dyn HangReaper,
        denylist: Vec<String>,
    ) -> Self {
        Supervisor {
            runner,
            reaper,
            denylist,
        }
    }

    /// Run `command` and return its raw exit outcome. The caller decides what
    /// the outcome means.
    ///
    /// Hangers are reaped after the installer returns whatever its outcome,
    /// including a failure to spawn it.
    pub fn run_installer(&self, command: &Invocation) -> Result<ExitOutcome, FixError> {
        self.wait_for_wineserver(&command.env);

        info!(command = %command, "running installer");
        let result = self.runner.run(command);
        match &result {
            Ok(outcome) if outcome.success() => debug!("installer exited cleanly"),
            Ok(outcome) => warn!(code = ?outcome.code, "installer exited with failure"),
            Err(e) => warn!(error = %e, "installer could not be run"),
        }

        let killed = self.reaper.reap_known_hangers(&self.denylist);
        if !killed.is_empty() {
            info!(?killed, "reaped hanging processes after install");
        }
        result
    }

    /// `wineserver -w` blocks until the prefix's wineserver is idle, so a
    /// server started by the game launch cannot race the installer.
    fn wait_for_wineserver(&self, env: &BTreeMap<String, String>) {
        let Some(wineserver) = env.get("WINESERVER") else {
            debug!("no WINESERVER in installer env, not waiting");
            return;
        };
        let wait = Invocation::new(PathBuf::from(wineserver), vec!["-w".into()], env.clone());
        match self.runner.run(&wait) {
            Ok(outcome) if !outcome.success() => {
                debug!(code = ?outcome.code, "wineserver -w returned non-zero")
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "could not wait for wineserver"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::prefix::PrefixLayout;
    use crate::infrastructure::{MockReaper, MockRunner};

    fn context() -> LaunchContext {
        let mut env = BTreeMap::new();
        env.insert("LD_PRELOAD".to_string(), "/usr/lib/libgameoverlay.so".to_string());
        env.insert("HOME".to_string(), "/home/player".to_string());
        LaunchContext::new(
            vec!["/steam/common/Proton 8.0/proton".into(), "run".into()],
            env,
            PrefixLayout::new("/steam/compatdata/1237970/pfx"),
        )
    }

    fn installer(env: BTreeMap<String, String>) -> Invocation {
        Invocation::new(
            "/opt/protonfix/winetricks",
            vec!["--unattended".into(), "d3dcompiler_47".into()],
            env,
        )
    }

    #[test]
    fn env_is_fully_specified() {
        let env = installer_env(&context());
        assert_eq!(env["WINEPREFIX"], "/steam/compatdata/1237970/pfx");
        assert_eq!(env["WINE"], "/steam/common/Proton 8.0/files/bin/wine");
        assert_eq!(env["WINELOADER"], env["WINE"]);
        assert_eq!(env["WINESERVER"], "/steam/common/Proton 8.0/files/bin/wineserver");
        assert_eq!(env["WINETRICKS_LATEST_VERSION_CHECK"], "disabled");
        assert_eq!(env["LD_PRELOAD"], "");
        assert_eq!(env["HOME"], "/home/player");
    }

    #[test]
    fn waits_for_wineserver_then_runs_installer_then_reaps() {
        let runner = MockRunner::new();
        let reaper = MockReaper::new();
        let sup = Supervisor::new(&runner, &reaper, vec!["mscorsvw.exe".into()]);

        let outcome = sup.run_installer(&installer(installer_env(&context()))).unwrap();
        assert!(outcome.success());

        let calls = runner.invocations();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].program,
            PathBuf::from("/steam/common/Proton 8.0/files/bin/wineserver")
        );
        assert_eq!(calls[0].args, vec!["-w"]);
        assert_eq!(calls[1].program, PathBuf::from("/opt/protonfix/winetricks"));
        assert_eq!(reaper.calls(), vec![vec!["mscorsvw.exe".to_string()]]);
    }

    #[test]
    fn reaps_even_when_installer_fails() {
        let runner = MockRunner::with_responses(vec![ExitOutcome::code(0), ExitOutcome::code(1)]);
        let reaper = MockReaper::reporting(vec![4242]);
        let sup = Supervisor::new(&runner, &reaper, vec!["mscorsvw.exe".into()]);

        let outcome = sup.run_installer(&installer(installer_env(&context()))).unwrap();
        assert_eq!(outcome, ExitOutcome::code(1));
        assert_eq!(reaper.calls().len(), 1);
    }

    #[test]
    fn spawn_failure_is_returned_after_reaping() {
        let runner = crate::infrastructure::ProcessRunner;
        let reaper = MockReaper::new();
        let sup = Supervisor::new(&runner, &reaper, vec!["mscorsvw.exe".into()]);
        let mut env = BTreeMap::new();
        env.insert("WINESERVER".to_string(), "/nonexistent/wineserver".to_string());
        let cmd = Invocation::new("/nonexistent/winetricks", vec!["--unattended".into()], env);

        assert!(matches!(sup.run_installer(&cmd), Err(FixError::Spawn { .. })));
        assert_eq!(reaper.calls().len(), 1);
    }

    #[test]
    fn skips_wineserver_wait_without_wineserver_env() {
        let runner = MockRunner::new();
        let reaper = MockReaper::new();
        let sup = Supervisor::new(&runner, &reaper, Vec::new());
        sup.run_installer(&installer(BTreeMap::new())).unwrap();
        assert_eq!(runner.invocations().len(), 1);
    }
}
