use async_trait::async_trait;
use kiln_engine::{CancellationToken, StateBag, Step, StepAction};

use super::{Context, StepResult, conclude};
use crate::keys;

/// Resolves the address the communicator will connect to.
#[derive(Debug, Default)]
pub struct InstanceInfo;

impl InstanceInfo {
    pub const NAME: &'static str = "instance_info";

    async fn execute(&self, state: &StateBag) -> StepResult {
        let ctx = Context::load(state)?;
        let instance = state.get(keys::INSTANCE_NAME)?;
        let internal = ctx.config.use_internal_ip;

        ctx.ui.say("Waiting for the instance to become running...");
        let ip = ctx
            .driver
            .instance_ip(&ctx.config.zone, &instance, internal)
            .await?;

        if internal {
            ctx.ui.message(&format!("Internal IP: {ip}"));
        } else {
            ctx.ui.message(&format!("IP: {ip}"));
        }
        state.put(keys::INSTANCE_IP, ip);
        Ok(())
    }
}

#[async_trait]
impl Step for InstanceInfo {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, state: &StateBag, _cancel: &CancellationToken) -> StepAction {
        conclude(state, Self::NAME, self.execute(state).await)
    }
}
