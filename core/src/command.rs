//! Command: the typed interface for every protonfix operation.
//!
//! Every operation that can be dispatched through `Fixer::execute()` is a
//! variant of the `Command` enum. Commands serialize as JSON objects with a
//! `"command"` discriminant:
//!
//! ```json
//! {"command": "verb.check", "verb": "vcrun2019"}
//! {"command": "verb.install", "verbs": ["d3dcompiler_47"], "force": false}
//! {"command": "ledger.mark", "id": "1237970.disable_overlay"}
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command")]
pub enum Command {
    /// Report whether a verb is installed in the prefix.
    #[serde(rename = "verb.check")]
    VerbCheck { verb: String },

    /// Install verbs that are not yet installed.
    #[serde(rename = "verb.install")]
    VerbInstall {
        verbs: Vec<String>,
        /// Pass `--force` to winetricks.
        #[serde(default)]
        force: bool,
    },

    /// Kill denylisted processes left over from earlier installs.
    #[serde(rename = "reap")]
    Reap,

    #[serde(rename = "ledger.has")]
    LedgerHas { id: String },

    /// Record an action as done without running anything.
    #[serde(rename = "ledger.mark")]
    LedgerMark { id: String },

    /// Print the effective settings as YAML.
    #[serde(rename = "config.show")]
    ConfigShow,
}
