//! Step orchestration engine for Kiln.
//!
//! This crate provides the [`StepRunner`], the [`StateBag`] it threads
//! through every step, and the [`Step`] contract that each unit of work
//! implements.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  StepRunner                                             │
//! │  - Runs steps strictly in order                         │
//! │  - Halt stops forward progress                          │
//! │  - Cleanup of every executed step, in reverse           │
//! │  - Cooperative cancellation between dispatches          │
//! └───────────────┬─────────────────────────────────────────┘
//!                 │ &StateBag + &CancellationToken
//!                 ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │  Step (trait object)                                    │
//! │  run() -> Continue | Halt      cleanup() best-effort    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! A failing step records its error with [`StateBag::halt`] and returns
//! [`StepAction::Halt`]; the runner never looks at the error itself.

pub mod error;
pub mod runner;
pub mod state;
pub mod step;

pub use error::{EngineError, Result, StepError};
pub use runner::{PauseHandler, RunStatus, StepRunner};
pub use state::{StateBag, StateKey};
pub use step::{Step, StepAction};

pub use tokio_util::sync::CancellationToken;
