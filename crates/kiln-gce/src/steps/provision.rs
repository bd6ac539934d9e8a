use async_trait::async_trait;
use kiln_engine::{CancellationToken, StateBag, Step, StepAction};

use super::{StepResult, conclude};
use crate::keys;

/// Runs the provisioner hook once, with the live session if there is one.
#[derive(Debug, Default)]
pub struct Provision;

impl Provision {
    pub const NAME: &'static str = "provision";

    async fn execute(&self, state: &StateBag) -> StepResult {
        let ui = state.get(keys::UI)?;
        let hook = state.get(keys::HOOK)?;
        let session = state.get_ok(keys::SESSION);

        match &session {
            Some(session) => tracing::info!(host = %session.host(), "Running provisioners"),
            None => tracing::info!("Running provisioners without a session"),
        }
        hook.provision(ui.as_ref(), session.as_deref()).await?;
        Ok(())
    }
}

#[async_trait]
impl Step for Provision {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, state: &StateBag, _cancel: &CancellationToken) -> StepAction {
        conclude(state, Self::NAME, self.execute(state).await)
    }
}
