//! Ledger of one-time actions already performed in a prefix.
//!
//! Callers only see the `Ledger` trait. `MarkerLedger` keeps one zero-byte
//! file per action (the on-disk format older fix runs already left behind);
//! `IndexLedger` keeps a single JSON file. Neither backend locks: two launches
//! of the same prefix racing on a first run may both execute the action.

pub mod index;
pub mod markers;

use std::fmt;

use crate::data::prefix::PrefixLayout;
use crate::error::FixError;
use crate::types::config::LedgerBackend;

pub use index::IndexLedger;
pub use markers::MarkerLedger;

/// Stable identity of a one-time action: `<module>.<action_name>`.
///
/// Used verbatim as a marker filename, so path separators are replaced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(String);

impl ActionId {
    pub fn new(module: &str, action: &str) -> Self {
        ActionId::from_key(&format!("{}.{}", module, action))
    }

    /// Build from an already-joined key such as `"1237970.fix_launcher"`.
    pub fn from_key(key: &str) -> Self {
        ActionId(key.replace(['/', '\\', '\0'], "_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persistent record of completed actions for one prefix.
pub trait Ledger {
    /// Whether the action has a recorded entry.
    fn has_run(&self, id: &ActionId) -> bool;

    /// Record the action. Recording an existing entry is a no-op.
    fn mark_run(&self, id: &ActionId) -> Result<(), FixError>;
}

/// Open the ledger for a prefix using the configured backend.
pub fn open(backend: LedgerBackend, layout: &PrefixLayout) -> Box<dyn Ledger> {
    match backend {
        LedgerBackend::Markers => Box::new(MarkerLedger::new(layout.ledger_dir())),
        LedgerBackend::Index => Box::new(IndexLedger::new(layout.ledger_index())),
    }
}
