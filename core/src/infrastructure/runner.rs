//! Command runner abstraction for executing child processes.
//!
//! `CommandRunner` is the trait the supervisor uses to run programs.
//! `ProcessRunner` is the production implementation that spawns the program
//! with a fully specified environment and waits for it.
//! `MockRunner` is the test double that records invocations and returns preset
//! exit outcomes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use crate::error::FixError;

/// A program, its arguments, and the complete environment it runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(
        program: impl Into<PathBuf>,
        args: Vec<String>,
        env: BTreeMap<String, String>,
    ) -> Self {
        Invocation {
            program: program.into(),
            args,
            env,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// How a child process ended. `code` is `None` when it died from a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn code(code: i32) -> Self {
        ExitOutcome { code: Some(code) }
    }

    pub fn signaled() -> Self {
        ExitOutcome { code: None }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Trait for running a program to completion.
pub trait CommandRunner {
    /// Run the invocation and block until it exits.
    fn run(&self, invocation: &Invocation) -> Result<ExitOutcome, FixError>;
}

/// Production runner. The child sees exactly `invocation.env`, nothing
/// inherited, and shares our stdio.
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<ExitOutcome, FixError> {
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .env_clear()
            .envs(&invocation.env)
            .status()
            .map_err(|e| FixError::Spawn {
                program: invocation.program.display().to_string(),
                source: e,
            })?;
        Ok(ExitOutcome {
            code: status.code(),
        })
    }
}

/// Side effect a `MockRunner` performs for each invocation, e.g. writing the
/// winetricks log the way a real install would.
type Effect = Box<dyn Fn(&Invocation)>;

/// Test-double runner that records invocations and returns pre-configured
/// outcomes.
pub struct MockRunner {
    responses: RefCell<Vec<ExitOutcome>>,
    invocations: RefCell<Vec<Invocation>>,
    effect: Option<Effect>,
}

impl MockRunner {
    pub fn with_responses(responses: Vec<ExitOutcome>) -> Self {
        let mut reversed = responses;
        reversed.reverse();
        MockRunner {
            responses: RefCell::new(reversed),
            invocations: RefCell::new(Vec::new()),
            effect: None,
        }
    }

    pub fn new() -> Self {
        MockRunner::with_responses(Vec::new())
    }

    /// Run `effect` on every invocation before returning its outcome.
    pub fn with_effect(effect: impl Fn(&Invocation) + 'static) -> Self {
        MockRunner {
            effect: Some(Box::new(effect)),
            ..MockRunner::new()
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.borrow().clone()
    }

    /// Invocations whose program file name is `name`.
    pub fn invocations_of(&self, name: &str) -> Vec<Invocation> {
        self.invocations
            .borrow()
            .iter()
            .filter(|i| i.program.file_name().is_some_and(|f| f == name))
            .cloned()
            .collect()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, invocation: &Invocation) -> Result<ExitOutcome, FixError> {
        self.invocations.borrow_mut().push(invocation.clone());
        if let Some(effect) = &self.effect {
            effect(invocation);
        }
        Ok(self
            .responses
            .borrow_mut()
            .pop()
            .unwrap_or(ExitOutcome::code(0)))
    }
}
