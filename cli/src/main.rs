//! protonfix CLI: inspect and maintain the fix state of one Proton prefix.
//!
//! # Usage
//!
//! ```text
//! protonfix check d3dcompiler_47
//! protonfix install --force corefonts liberation
//! protonfix reap
//! protonfix ledger has 1237970.disable_nvapi
//! protonfix --prefix ~/.steam/steam/steamapps/compatdata/1237970/pfx \
//!     ledger mark 1237970.disable_nvapi
//! protonfix config show
//! ```
//!
//! The prefix defaults to `$STEAM_COMPAT_DATA_PATH/pfx`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use protonfix_core::command::Command;
use protonfix_core::context::LaunchContext;
use protonfix_core::data::prefix::PrefixLayout;
use protonfix_core::data::settings;
use protonfix_core::error::FixError;
use protonfix_core::response::Response;
use protonfix_core::sys::Fixer;

/// Environment variable holding a tracing filter; overrides `--log-level`.
const LOG_ENV: &str = "PROTONFIX_LOG";

#[derive(Parser, Debug)]
#[command(name = "protonfix")]
#[command(version, about = "Maintain per-game fix state in a Proton prefix", long_about = None)]
struct Cli {
    /// Prefix directory (defaults to $STEAM_COMPAT_DATA_PATH/pfx)
    #[arg(long, global = true)]
    prefix: Option<PathBuf>,

    /// Path to the Proton runtime script; locates wine and wineserver
    #[arg(long, global = true)]
    proton: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print the response as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report whether a winetricks verb is installed
    Check {
        verb: String,
    },

    /// Install winetricks verbs that are not installed yet
    Install {
        /// Reinstall over a partial earlier attempt
        #[arg(long)]
        force: bool,

        #[arg(required = true)]
        verbs: Vec<String>,
    },

    /// Kill processes known to hang after an install
    Reap,

    /// Query or update the run-once ledger
    #[command(subcommand)]
    Ledger(LedgerCommands),

    /// Settings
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum LedgerCommands {
    /// Report whether an action has run
    Has { id: String },
    /// Record an action as done
    Mark { id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print effective settings
    Show,
}


fn main() {
    let cli = Cli::parse();

    let config_path = settings::config_path();
    let settings = match settings::load(&config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("protonfix: {}", e);
            process::exit(1);
        }
    };

    init_tracing(cli.log_level.as_deref().unwrap_or(&settings.log_level));

    let ctx = match build_context(cli.prefix.clone(), cli.proton.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("protonfix: {} (use --prefix)", e);
            process::exit(1);
        }
    };

    if needs_runtime(&cli.command) && cli.proton.is_none() {
        eprintln!("protonfix: installing verbs needs --proton <runtime script>");
        process::exit(1);
    }

    let cmd = to_command(cli.command);
    debug!(?cmd, prefix = %ctx.prefix().root().display(), "dispatching");
    let mut fixer = Fixer::new(settings, ctx);
    let response = fixer.execute(cmd);

    if cli.json {
        match serde_json::to_string(&response) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("protonfix: {}", e);
                process::exit(1);
            }
        }
        if !response.is_ok() {
            process::exit(1);
        }
        return;
    }

    match response {
        Response::Ok { output } => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Response::Error { message } => {
            eprintln!("protonfix error: {}", message);
            process::exit(1);
        }
    }
}


/// Logs go to stderr so command output stays clean on stdout.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}


fn build_context(
    prefix: Option<PathBuf>,
    proton: Option<PathBuf>,
) -> Result<LaunchContext, FixError> {
    let layout = match prefix {
        Some(root) => PrefixLayout::new(root),
        None => PrefixLayout::from_env()?,
    };
    let args = proton
        .map(|p| vec![p.display().to_string()])
        .unwrap_or_default();
    let env: BTreeMap<String, String> = std::env::vars().collect();
    Ok(LaunchContext::new(args, env, layout))
}


/// Commands that run wine and so must know where the runtime lives.
fn needs_runtime(cmd: &Commands) -> bool {
    matches!(cmd, Commands::Install { .. })
}


fn to_command(cmd: Commands) -> Command {
    match cmd {
        Commands::Check { verb } => Command::VerbCheck { verb },
        Commands::Install { force, verbs } => Command::VerbInstall { verbs, force },
        Commands::Reap => Command::Reap,
        Commands::Ledger(LedgerCommands::Has { id }) => Command::LedgerHas { id },
        Commands::Ledger(LedgerCommands::Mark { id }) => Command::LedgerMark { id },
        Commands::Config(ConfigCommands::Show) => Command::ConfigShow,
    }
}
