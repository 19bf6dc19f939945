use crate::command::Command;
use crate::context::LaunchContext;
use crate::data::settings;
use crate::error::FixError;
use crate::infrastructure::{CommandRunner, HangReaper, ProcReaper, ProcessRunner};
use crate::install::{InstallerPaths, VerbInstaller};
use crate::ledger::{self, ActionId, Ledger};
use crate::once::{run_once, OncePolicy, Outcome};
use crate::response::Response;
use crate::supervisor::Supervisor;
use crate::types::config::Settings;
use crate::verblog::VerbLogs;


/// Entry point for fixes and the CLI. Owns the launch context, settings, and
/// OS backends for one prefix, and dispatches commands.
pub struct Fixer {
    settings: Settings,
    ctx: LaunchContext,
    runner: Box<dyn CommandRunner>,
    reaper: Box<dyn HangReaper>,
}


impl Fixer {
    /// Create a Fixer that runs real processes and scans `/proc`.
    pub fn new(settings: Settings, ctx: LaunchContext) -> Fixer {
        Fixer::with_backends(settings, ctx, Box::new(ProcessRunner), Box::new(ProcReaper::new()))
    }

    /// Create a Fixer with explicit backends. Useful for testing.
    pub fn with_backends(
        settings: Settings,
        ctx: LaunchContext,
        runner: Box<dyn CommandRunner>,
        reaper: Box<dyn HangReaper>,
    ) -> Fixer {
        Fixer {
            settings,
            ctx,
            runner,
            reaper,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn context(&self) -> &LaunchContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut LaunchContext {
        &mut self.ctx
    }

    pub fn ledger(&self) -> Box<dyn Ledger> {
        ledger::open(self.settings.ledger_backend, self.ctx.prefix())
    }

    pub fn verb_logs(&self) -> VerbLogs {
        VerbLogs::for_prefix(self.ctx.prefix())
    }

    /// Run a fix action at most once per prefix under `policy`.
    pub fn run_once<T, E, F>(
        &mut self,
        module: &str,
        action: &str,
        policy: OncePolicy,
        f: F,
    ) -> Result<Outcome<T>, E>
    where
        F: FnOnce(&mut LaunchContext) -> Result<T, E>,
        E: From<FixError>,
    {
        let ledger = self.ledger();
        let id = ActionId::new(module, action);
        let ctx = &mut self.ctx;
        run_once(ledger.as_ref(), &id, policy, || f(ctx))
    }

    /// Install `verb` unless the prefix already has it. See `VerbInstaller`.
    pub fn ensure_verb_installed(&mut self, verb: &str) -> bool {
        self.install_verb(verb, false)
    }

    fn install_verb(&mut self, verb: &str, force: bool) -> bool {
        let supervisor = Supervisor::new(
            self.runner.as_ref(),
            self.reaper.as_ref(),
            self.settings.hang_denylist.clone(),
        );
        let paths = InstallerPaths::from_settings(&self.settings);
        let installer = VerbInstaller::new(paths, supervisor);
        if force {
            installer.ensure_verb_forced(&mut self.ctx, verb)
        } else {
            installer.ensure_verb_installed(&mut self.ctx, verb)
        }
    }

    /// The single dispatch method. Every command enters here.
    pub fn execute(&mut self, cmd: Command) -> Response {
        match cmd {
            Command::VerbCheck { verb } => self.cmd_verb_check(verb),
            Command::VerbInstall { verbs, force } => self.cmd_verb_install(verbs, force),
            Command::Reap => self.cmd_reap(),
            Command::LedgerHas { id } => self.cmd_ledger_has(id),
            Command::LedgerMark { id } => self.cmd_ledger_mark(id),
            Command::ConfigShow => self.cmd_config_show(),
        }
    }

    fn cmd_verb_check(&self, verb: String) -> Response {
        if self.verb_logs().check_installed(&verb) {
            Response::ok(format!("{}: installed", verb))
        } else {
            Response::ok(format!("{}: not installed", verb))
        }
    }

    fn cmd_verb_install(&mut self, verbs: Vec<String>, force: bool) -> Response {
        if verbs.is_empty() {
            return Response::error("no verbs given");
        }
        let mut lines = Vec::new();
        for verb in &verbs {
            if !self.install_verb(verb, force) {
                return Response::error(format!(
                    "{}: cannot install, missing winetricks ({}) or wineserver ({})",
                    verb,
                    InstallerPaths::from_settings(&self.settings).installer.display(),
                    self.ctx.wineserver_bin().display()
                ));
            }
            lines.push(format!("{}: installed", verb));
        }
        Response::ok(lines.join("\n"))
    }

    fn cmd_reap(&self) -> Response {
        let killed = self.reaper.reap_known_hangers(&self.settings.hang_denylist);
        if killed.is_empty() {
            return Response::ok("no hanging processes");
        }
        let pids: Vec<String> = killed.iter().map(|p| p.to_string()).collect();
        Response::ok(format!("killed: {}", pids.join(" ")))
    }

    fn cmd_ledger_has(&self, id: String) -> Response {
        let id = ActionId::from_key(&id);
        if self.ledger().has_run(&id) {
            Response::ok(format!("{}: done", id))
        } else {
            Response::ok(format!("{}: pending", id))
        }
    }

    fn cmd_ledger_mark(&self, id: String) -> Response {
        let id = ActionId::from_key(&id);
        match self.ledger().mark_run(&id) {
            Ok(()) => Response::ok(format!("{}: marked", id)),
            Err(e) => Response::error(e.to_string()),
        }
    }

    fn cmd_config_show(&self) -> Response {
        match settings::serialize(&self.settings) {
            Ok(yaml) => Response::ok(yaml.trim_end()),
            Err(e) => Response::error(e.to_string()),
        }
    }
}
