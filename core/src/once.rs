//! Once-per-prefix execution of fix actions, backed by the ledger.

use tracing::{debug, warn};

use crate::error::FixError;
use crate::ledger::{ActionId, Ledger};

/// What happens to the ledger when a wrapped action fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OncePolicy {
    /// Record the action even on failure: it is attempted exactly once.
    /// Used for fixes that must never repeat, such as destructive migrations.
    #[default]
    MarkAlways,
    /// Record only on success, so a failure is retried on the next launch.
    RetryUntilSuccess,
}

/// Result of a wrapped action that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The action ran in this call and succeeded.
    Ran(T),
    /// The ledger already held an entry; the action was not invoked.
    ///
    /// Under `MarkAlways` this does not imply an earlier success, only that
    /// no further attempts will be made.
    Skipped,
}

/// Run `action` unless the ledger already records `id`, then apply `policy`.
///
/// A failure of the action is returned to the caller under either policy. A
/// ledger write failure after a successful action is returned as well; one
/// after a failed action is logged and the action's own error wins.
pub fn run_once<T, E, F>(
    ledger: &dyn Ledger,
    id: &ActionId,
    policy: OncePolicy,
    action: F,
) -> Result<Outcome<T>, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<FixError>,
{
    if ledger.has_run(id) {
        debug!(action = %id, "already run in this prefix, skipping");
        return Ok(Outcome::Skipped);
    }

    match action() {
        Ok(value) => {
            ledger.mark_run(id)?;
            debug!(action = %id, "action completed");
            Ok(Outcome::Ran(value))
        }
        Err(err) => {
            match policy {
                OncePolicy::MarkAlways => {
                    if let Err(mark_err) = ledger.mark_run(id) {
                        warn!(action = %id, error = %mark_err, "could not record failed action");
                    }
                    warn!(action = %id, "action failed, it will not be attempted again");
                }
                OncePolicy::RetryUntilSuccess => {
                    warn!(action = %id, "action failed, it will be retried on the next launch");
                }
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MarkerLedger;
    use std::cell::Cell;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Action(&'static str),
        Ledger(String),
    }

    impl From<FixError> for TestError {
        fn from(e: FixError) -> Self {
            TestError::Ledger(e.to_string())
        }
    }

    fn ledger() -> (tempfile::TempDir, MarkerLedger) {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = MarkerLedger::new(tmp.path().join("run"));
        (tmp, ledger)
    }

    #[test]
    fn default_policy_is_mark_always() {
        assert_eq!(OncePolicy::default(), OncePolicy::MarkAlways);
    }

    #[test]
    fn success_runs_once_then_skips() {
        let (_tmp, ledger) = ledger();
        let id = ActionId::new("fix", "ok");
        let calls = Cell::new(0);
        let action = || -> Result<u32, TestError> {
            calls.set(calls.get() + 1);
            Ok(7)
        };

        let first = run_once(&ledger, &id, OncePolicy::MarkAlways, action).unwrap();
        assert_eq!(first, Outcome::Ran(7));
        let second = run_once(&ledger, &id, OncePolicy::MarkAlways, action).unwrap();
        assert_eq!(second, Outcome::Skipped);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn mark_always_records_failure_and_silences_it() {
        let (_tmp, ledger) = ledger();
        let id = ActionId::new("fix", "migrate");
        let calls = Cell::new(0);
        let action = || -> Result<(), TestError> {
            calls.set(calls.get() + 1);
            Err(TestError::Action("boom"))
        };

        let first = run_once(&ledger, &id, OncePolicy::MarkAlways, action);
        assert_eq!(first, Err(TestError::Action("boom")));
        assert!(ledger.has_run(&id));

        let second = run_once(&ledger, &id, OncePolicy::MarkAlways, action);
        assert_eq!(second, Ok(Outcome::Skipped));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retry_policy_never_marks_a_failure() {
        let (_tmp, ledger) = ledger();
        let id = ActionId::new("fix", "download");
        let calls = Cell::new(0);
        let failing = || -> Result<(), TestError> {
            calls.set(calls.get() + 1);
            Err(TestError::Action("offline"))
        };

        for _ in 0..3 {
            let res = run_once(&ledger, &id, OncePolicy::RetryUntilSuccess, failing);
            assert_eq!(res, Err(TestError::Action("offline")));
            assert!(!ledger.has_run(&id));
        }
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retry_policy_marks_on_eventual_success() {
        let (_tmp, ledger) = ledger();
        let id = ActionId::new("fix", "download");
        let calls = Cell::new(0);
        let flaky = || -> Result<(), TestError> {
            calls.set(calls.get() + 1);
            if calls.get() < 2 {
                Err(TestError::Action("offline"))
            } else {
                Ok(())
            }
        };

        assert!(run_once(&ledger, &id, OncePolicy::RetryUntilSuccess, flaky).is_err());
        assert_eq!(
            run_once(&ledger, &id, OncePolicy::RetryUntilSuccess, flaky),
            Ok(Outcome::Ran(()))
        );
        assert_eq!(
            run_once(&ledger, &id, OncePolicy::RetryUntilSuccess, flaky),
            Ok(Outcome::Skipped)
        );
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn ledger_write_failure_after_success_is_returned() {
        let tmp = tempfile::tempdir().unwrap();
        // A regular file where the marker directory should be.
        let blocker = tmp.path().join("run");
        std::fs::write(&blocker, "").unwrap();
        let ledger = MarkerLedger::new(&blocker);
        let id = ActionId::new("fix", "ok");

        let res = run_once(&ledger, &id, OncePolicy::MarkAlways, || Ok::<_, TestError>(()));
        assert!(matches!(res, Err(TestError::Ledger(_))));
    }

    #[test]
    fn action_error_wins_over_ledger_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("run");
        std::fs::write(&blocker, "").unwrap();
        let ledger = MarkerLedger::new(&blocker);
        let id = ActionId::new("fix", "bad");

        let res = run_once(&ledger, &id, OncePolicy::MarkAlways, || {
            Err::<(), _>(TestError::Action("bad"))
        });
        assert_eq!(res, Err(TestError::Action("bad")));
    }

    #[test]
    fn corrupt_index_repeats_mark_always_action() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run.json");
        std::fs::write(&path, "{not json").unwrap();
        let ledger = crate::ledger::IndexLedger::new(&path);
        let id = ActionId::new("fix", "migrate");
        let calls = Cell::new(0);
        let action = || -> Result<(), TestError> {
            calls.set(calls.get() + 1);
            Ok(())
        };

        for _ in 0..2 {
            let res = run_once(&ledger, &id, OncePolicy::MarkAlways, action);
            assert!(matches!(res, Err(TestError::Ledger(_))));
        }
        assert_eq!(calls.get(), 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
    }
}
