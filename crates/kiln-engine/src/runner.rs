//! Sequential step runner.
//!
//! Provides [`StepRunner`], which executes a planned list of steps against
//! one [`StateBag`] and guarantees reverse-order cleanup of everything that
//! ran, whatever the outcome.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::StateBag;
use crate::step::{Step, StepAction};

/// Lifecycle of a runner.
///
/// `Idle → Running → {Completed, Halted, Cancelled}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// `run` has not been called yet.
    Idle,
    /// Steps (or their cleanup) are executing.
    Running,
    /// Every step returned `Continue`.
    Completed,
    /// A step returned `Halt`.
    Halted {
        /// Name of the step that halted the run.
        step: String,
    },
    /// Cancellation was observed between two dispatches.
    Cancelled,
}

impl RunStatus {
    /// Whether the run has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Halted { .. } | RunStatus::Cancelled
        )
    }
}

/// Called after every executed step when debugging a build.
///
/// The runner waits for `pause` to return before dispatching the next step,
/// then re-checks cancellation, so an operator can inspect the instance
/// between steps and abort from the pause.
#[async_trait]
pub trait PauseHandler: Send + Sync {
    async fn pause(&self, step: &str, action: StepAction, state: &StateBag);
}

/// Executes steps strictly in order against a shared [`StateBag`].
///
/// - A step returning [`StepAction::Halt`] stops forward progress.
/// - Cancellation is cooperative: the token is consulted before each
///   dispatch and after each step returns, never mid-step.
/// - On every exit path, `cleanup` runs once for each executed step, in
///   reverse start order. Cleanup errors are logged and swallowed.
///
/// A runner is single-use; a second call to [`run`](Self::run) returns the
/// status of the first without executing anything.
pub struct StepRunner {
    steps: Vec<Box<dyn Step>>,
    cancel: CancellationToken,
    status: Mutex<RunStatus>,
    pause: Option<Arc<dyn PauseHandler>>,
}

impl StepRunner {
    /// Create a runner over a planned step list.
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            steps,
            cancel: CancellationToken::new(),
            status: Mutex::new(RunStatus::Idle),
            pause: None,
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Pause after every executed step.
    pub fn with_pause(mut self, handler: Arc<dyn PauseHandler>) -> Self {
        self.pause = Some(handler);
        self
    }

    /// Number of planned steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Names of the planned steps, in order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Request cancellation. Safe to call from any task, any number of times.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            info!("Cancelling the step runner");
        }
        self.cancel.cancel();
    }

    /// Current lifecycle status.
    pub fn status(&self) -> RunStatus {
        self.status.lock().clone()
    }

    /// Execute the plan against `state`.
    pub async fn run(&self, state: &StateBag) -> RunStatus {
        {
            let mut status = self.status.lock();
            if *status != RunStatus::Idle {
                warn!(status = ?*status, "Step runner already used");
                return status.clone();
            }
            *status = RunStatus::Running;
        }

        let mut executed = 0;
        let mut outcome = RunStatus::Completed;

        for step in &self.steps {
            if self.cancel.is_cancelled() {
                info!(next = step.name(), "Run cancelled before step");
                outcome = RunStatus::Cancelled;
                break;
            }

            debug!(step = step.name(), "Running step");
            executed += 1;
            let action = step.run(state, &self.cancel).await;

            if let Some(pause) = &self.pause {
                pause.pause(step.name(), action, state).await;
            }

            if self.cancel.is_cancelled() {
                info!(step = step.name(), "Run cancelled after step");
                outcome = RunStatus::Cancelled;
                break;
            }
            if action == StepAction::Halt {
                info!(step = step.name(), "Step halted the run");
                outcome = RunStatus::Halted {
                    step: step.name().to_string(),
                };
                break;
            }
        }

        cleanup(&self.steps[..executed], state).await;

        *self.status.lock() = outcome.clone();
        outcome
    }
}

impl std::fmt::Debug for StepRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRunner")
            .field("steps", &self.step_names())
            .field("status", &*self.status.lock())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Clean up executed steps, last first.
async fn cleanup(executed: &[Box<dyn Step>], state: &StateBag) {
    for step in executed.iter().rev() {
        debug!(step = step.name(), "Cleaning up step");
        if let Err(e) = step.cleanup(state).await {
            warn!(step = step.name(), error = %e, "Step cleanup failed");
        }
    }
}
