use async_trait::async_trait;
use kiln_config::STARTUP_SCRIPT_STATUS_KEY;
use kiln_engine::{CancellationToken, StateBag, Step, StepAction};

use super::{Context, StepResult, conclude};
use crate::keys;

const STATUS_DONE: &str = "done";
const STATUS_ERROR: &str = "error";

/// Polls the instance until the wrapped startup script reports completion.
#[derive(Debug, Default)]
pub struct WaitStartupScript;

impl WaitStartupScript {
    pub const NAME: &'static str = "wait_startup_script";

    async fn execute(&self, state: &StateBag, cancel: &CancellationToken) -> StepResult {
        let ctx = Context::load(state)?;
        let instance = &state.get(keys::INSTANCE_NAME)?;
        let driver = ctx.driver.as_ref();
        let zone = ctx.config.zone.as_str();

        ctx.ui.say("Waiting for any running startup script to finish...");
        let status = crate::driver::wait_until(
            "the startup script",
            ctx.state_timeout(),
            ctx.poll_interval(),
            cancel,
            move || async move {
                let status = driver
                    .instance_metadata(zone, instance, STARTUP_SCRIPT_STATUS_KEY)
                    .await?;
                Ok(status.filter(|s| s == STATUS_DONE || s == STATUS_ERROR))
            },
        )
        .await?;

        if status == STATUS_ERROR {
            return Err("Startup script exited with an error".into());
        }
        ctx.ui.message("Startup script has finished running");
        Ok(())
    }
}

#[async_trait]
impl Step for WaitStartupScript {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, state: &StateBag, cancel: &CancellationToken) -> StepAction {
        conclude(state, Self::NAME, self.execute(state, cancel).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::CreateInstance;
    use crate::steps::test_support::{Harness, config, harness};
    use kiln_config::STARTUP_SCRIPT_KEY;

    async fn with_script(result: Option<&str>) -> Harness {
        let mut cfg = config();
        cfg.metadata.insert(STARTUP_SCRIPT_KEY.into(), "echo".into());
        let h = harness(cfg);
        h.driver.set_startup_result(result);
        CreateInstance.run(&h.state, &CancellationToken::new()).await;
        h
    }

    #[tokio::test]
    async fn test_done_continues() {
        let h = with_script(Some("done")).await;
        let action = WaitStartupScript.run(&h.state, &CancellationToken::new()).await;
        assert_eq!(action, StepAction::Continue);
        assert!(h.ui.contains("Startup script has finished running"));
    }

    #[tokio::test]
    async fn test_error_halts() {
        let h = with_script(Some("error")).await;
        let action = WaitStartupScript.run(&h.state, &CancellationToken::new()).await;
        assert_eq!(action, StepAction::Halt);
        assert!(h.state.error_message().unwrap().contains("exited with an error"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_finishing_times_out() {
        let h = with_script(None).await;
        let action = WaitStartupScript.run(&h.state, &CancellationToken::new()).await;
        assert_eq!(action, StepAction::Halt);
        assert!(h.state.error_message().unwrap().contains("Timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_waiting() {
        let h = with_script(None).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let action = WaitStartupScript.run(&h.state, &cancel).await;
        assert_eq!(action, StepAction::Halt);
        assert!(h.state.error_message().unwrap().contains("Cancelled"));
    }
}
