use dialoguer::Select;
use tracing::warn;

use crate::job::ExecutionFailure;
use crate::model::{OpValidation, Operation};

/// What to do after an invalid operation or a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Skip this one and keep going.
    Continue,
    /// Keep going and stop asking for the rest of the run.
    ContinueAlways,
    /// Stop the run. Work already applied stays applied.
    Abort,
}

/// Decides how a run reacts to failures.
pub trait FailurePolicy {
    fn on_invalid_operation(&mut self, op: &Operation, validation: &OpValidation) -> Decision;

    fn on_execution_failure(&mut self, failure: &ExecutionFailure) -> Decision;
}

/// Never asks; every failure is skipped (`--continue-on-error`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinueOnError;

impl FailurePolicy for ContinueOnError {
    fn on_invalid_operation(&mut self, _op: &Operation, _validation: &OpValidation) -> Decision {
        Decision::ContinueAlways
    }

    fn on_execution_failure(&mut self, _failure: &ExecutionFailure) -> Decision {
        Decision::ContinueAlways
    }
}

/// Stops at the first failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbortOnError;

impl FailurePolicy for AbortOnError {
    fn on_invalid_operation(&mut self, _op: &Operation, _validation: &OpValidation) -> Decision {
        Decision::Abort
    }

    fn on_execution_failure(&mut self, _failure: &ExecutionFailure) -> Decision {
        Decision::Abort
    }
}

/// Asks the operator `[yes|always|no]` until they answer "always".
#[derive(Debug, Clone, Default)]
pub struct Interactive {
    always: bool,
}

impl Interactive {
    pub fn new() -> Self {
        Self::default()
    }

    fn ask(&mut self) -> Decision {
        if self.always {
            return Decision::ContinueAlways;
        }
        let choice = Select::new()
            .with_prompt("Do you want to continue?")
            .items(&["yes", "always", "no"])
            .default(0)
            .interact();
        let decision = match choice {
            Ok(0) => Decision::Continue,
            Ok(1) => Decision::ContinueAlways,
            Ok(_) => Decision::Abort,
            Err(err) => {
                warn!("cannot prompt for a decision, aborting: {err}");
                Decision::Abort
            }
        };
        self.always = decision == Decision::ContinueAlways;
        decision
    }
}

impl FailurePolicy for Interactive {
    fn on_invalid_operation(&mut self, op: &Operation, validation: &OpValidation) -> Decision {
        if !self.always {
            eprintln!("{op}\n  cannot be applied: {validation}");
        }
        self.ask()
    }

    fn on_execution_failure(&mut self, failure: &ExecutionFailure) -> Decision {
        if !self.always {
            eprintln!("{failure}");
        }
        self.ask()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answered_always_stops_prompting() {
        let mut policy = Interactive { always: true };
        let op = Operation::new(crate::model::Change::Add("a.txt".into()));
        assert_eq!(
            policy.on_invalid_operation(&op, &OpValidation::Valid),
            Decision::ContinueAlways
        );
    }
}
