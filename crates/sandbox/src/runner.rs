use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use tracing::{error, info, warn};

use crate::context::SandboxContext;
use crate::error::SandboxError;

#[derive(Debug)]
pub enum TestOutcome {
    Passed,
    Failed(String),
    /// The sandbox could not be entered; the body never ran.
    SandboxFailed(SandboxError),
}

#[derive(Debug)]
pub struct TestReport {
    pub name: String,
    pub outcome: TestOutcome,
    /// Error from leaving the sandbox. Never overrides `outcome`.
    pub leave_error: Option<SandboxError>,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, TestOutcome::Passed)
    }

    /// Whether the run should stop: the sandbox could not be provisioned, or
    /// the working directory could not be restored.
    pub fn is_fatal(&self) -> bool {
        matches!(self.outcome, TestOutcome::SandboxFailed(_))
            || matches!(self.leave_error, Some(SandboxError::Leave { .. }))
    }
}

/// Run `body` inside a fresh sandbox.
///
/// The body receives the sandbox path and runs with it as the working
/// directory. The sandbox is left and removed whether the body passes, fails
/// or panics.
pub fn run_isolated<F>(ctx: &mut SandboxContext, name: &str, body: F) -> TestReport
where
    F: FnOnce(&Path) -> Result<(), String>,
{
    let path = match ctx.enter() {
        Ok(path) => path.to_path_buf(),
        Err(e) => {
            error!(test = name, error = %e, "failed to provision sandbox");
            return TestReport {
                name: name.to_string(),
                outcome: TestOutcome::SandboxFailed(e),
                leave_error: None,
            };
        }
    };

    let outcome = match catch_unwind(AssertUnwindSafe(|| body(&path))) {
        Ok(Ok(())) => TestOutcome::Passed,
        Ok(Err(message)) => TestOutcome::Failed(message),
        Err(payload) => TestOutcome::Failed(panic_message(payload.as_ref())),
    };

    let leave_error = ctx.leave().err();
    if let Some(e) = &leave_error {
        warn!(test = name, error = %e, "failed to leave sandbox");
    }

    match &outcome {
        TestOutcome::Passed => info!(test = name, "passed"),
        TestOutcome::Failed(message) => info!(test = name, message = %message, "failed"),
        TestOutcome::SandboxFailed(_) => {}
    }

    TestReport {
        name: name.to_string(),
        outcome,
        leave_error,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "test panicked".to_string()
    }
}
