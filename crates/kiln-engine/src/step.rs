//! The step contract.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::state::StateBag;

/// What the runner should do after a step's `run` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Proceed to the next step.
    Continue,
    /// Stop the run; cleanup of executed steps follows.
    Halt,
}

/// A unit of provisioning work.
///
/// `run` is invoked at most once per run. `cleanup` is invoked exactly once
/// for every step whose `run` was invoked, whether the run completed,
/// halted or was cancelled, and never for a step that did not run.
/// Cleanup must therefore tolerate partial work: it should look in the
/// state for the handles `run` managed to record and release only those.
#[async_trait]
pub trait Step: Send + Sync {
    /// Stable name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Perform the step.
    ///
    /// On failure, record the error with [`StateBag::halt`] and return its
    /// result. `cancel` is the run's cancellation token; long polling loops
    /// may watch it to give up early, but the runner never interrupts `run`.
    async fn run(&self, state: &StateBag, cancel: &CancellationToken) -> StepAction;

    /// Release whatever `run` created. Errors are logged, never escalated.
    async fn cleanup(&self, _state: &StateBag) -> anyhow::Result<()> {
        Ok(())
    }
}
