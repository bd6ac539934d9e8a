//! The build lifecycle steps.
//!
//! Each step reads its collaborators from the [`StateBag`], does one piece
//! of cloud work and records the handles it created so that its `cleanup`
//! (or a later step) can release them. Step bodies return a [`StepResult`];
//! [`conclude`] turns a failure into a recorded error plus `Halt`.

mod check_existing_image;
mod connect;
mod create_image;
mod create_instance;
mod create_ssh_key;
mod create_windows_password;
mod instance_info;
mod provision;
mod teardown_instance;
mod wait_startup_script;

pub use check_existing_image::CheckExistingImage;
pub use connect::Connect;
pub use create_image::CreateImage;
pub use create_instance::CreateInstance;
pub use create_ssh_key::CreateSshKey;
pub use create_windows_password::CreateWindowsPassword;
pub use instance_info::InstanceInfo;
pub use provision::Provision;
pub use teardown_instance::TeardownInstance;
pub use wait_startup_script::WaitStartupScript;

use std::sync::Arc;
use std::time::Duration;

use kiln_config::BuildConfig;
use kiln_engine::{EngineError, StateBag, StepAction};
use kiln_types::SharedUi;

use crate::driver::SharedDriver;
use crate::keys;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a step body.
pub(crate) type StepResult<T = ()> = std::result::Result<T, BoxError>;

/// Collaborators almost every step needs.
pub(crate) struct Context {
    pub config: Arc<BuildConfig>,
    pub driver: SharedDriver,
    pub ui: SharedUi,
}

impl Context {
    pub fn load(state: &StateBag) -> Result<Self, EngineError> {
        Ok(Self {
            config: state.get(keys::CONFIG)?,
            driver: state.get(keys::DRIVER)?,
            ui: state.get(keys::UI)?,
        })
    }

    /// Upper bound for one wait on the cloud.
    pub fn state_timeout(&self) -> Duration {
        Duration::from_secs(self.config.state_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config.poll_interval_secs)
    }
}

/// Report a failed step body on the UI and halt the run.
pub(crate) fn conclude(state: &StateBag, step: &'static str, result: StepResult) -> StepAction {
    match result {
        Ok(()) => StepAction::Continue,
        Err(e) => {
            tracing::warn!(step, error = %e, "Step failed");
            if let Ok(ui) = state.get(keys::UI) {
                ui.error(&format!("Error in {step}: {e}"));
            }
            state.halt(step, e)
        }
    }
}
