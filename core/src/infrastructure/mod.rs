//! OS-facing backends: running child processes and reaping hung ones.
//!
//! Each concern is a trait with a production implementation and a recording
//! mock, so the supervisor and orchestrator can be tested without wine.

pub mod reaper;
pub mod runner;

pub use reaper::{HangReaper, MockReaper, ProcReaper};
pub use runner::{CommandRunner, ExitOutcome, Invocation, MockRunner, ProcessRunner};
