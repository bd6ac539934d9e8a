use async_trait::async_trait;
use kiln_engine::{CancellationToken, StateBag, Step, StepAction};
use tracing::debug;

use super::{Context, StepResult, conclude};
use crate::keys;

/// Deletes the build instance while keeping its boot disk for imaging.
///
/// The disk is deleted in cleanup, after the image has been captured.
#[derive(Debug, Default)]
pub struct TeardownInstance;

impl TeardownInstance {
    pub const NAME: &'static str = "teardown_instance";

    async fn execute(&self, state: &StateBag) -> StepResult {
        let ctx = Context::load(state)?;

        if let Some(session) = state.remove(keys::SESSION)
            && let Err(e) = session.disconnect().await
        {
            debug!(error = %e, "Disconnect before teardown failed");
        }

        let Some(name) = state.get_ok(keys::INSTANCE_NAME) else {
            return Ok(());
        };
        ctx.ui.say("Deleting instance...");
        ctx.driver.delete_instance(&ctx.config.zone, &name).await?;
        state.remove(keys::INSTANCE_NAME);
        ctx.ui.message("Instance has been deleted!");
        Ok(())
    }
}

#[async_trait]
impl Step for TeardownInstance {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, state: &StateBag, _cancel: &CancellationToken) -> StepAction {
        conclude(state, Self::NAME, self.execute(state).await)
    }

    async fn cleanup(&self, state: &StateBag) -> anyhow::Result<()> {
        let Some(disk) = state.get_ok(keys::DISK_NAME) else {
            return Ok(());
        };
        if state.contains(keys::INSTANCE_NAME.name()) {
            // Still attached; create_instance cleanup removes both.
            return Ok(());
        }

        let ctx = Context::load(state)?;
        ctx.ui.say("Deleting disk...");
        if let Err(e) = ctx.driver.delete_disk(&ctx.config.zone, &disk).await {
            ctx.ui.error(&format!(
                "Error deleting disk. Please delete it manually.\n\nName: {disk}\nError: {e}"
            ));
            return Err(e.into());
        }
        state.remove(keys::DISK_NAME);
        ctx.ui.message("Disk has been deleted!");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Operation;
    use crate::steps::CreateInstance;
    use crate::steps::test_support::{config, harness};

    #[tokio::test]
    async fn test_deletes_instance_keeps_disk() {
        let h = harness(config());
        let cancel = CancellationToken::new();
        CreateInstance.run(&h.state, &cancel).await;

        let action = TeardownInstance.run(&h.state, &cancel).await;
        assert_eq!(action, StepAction::Continue);
        assert!(h.driver.instance_names().is_empty());
        assert_eq!(h.driver.disk_names(), vec!["kiln-vm"]);
        assert!(h.state.get_ok(keys::INSTANCE_NAME).is_none());

        TeardownInstance.cleanup(&h.state).await.unwrap();
        assert!(h.driver.disk_names().is_empty());
        assert!(h.state.get_ok(keys::DISK_NAME).is_none());

        // Nothing left for create_instance to release.
        CreateInstance.cleanup(&h.state).await.unwrap();
        assert_eq!(
            h.driver
                .calls()
                .iter()
                .filter(|c| c.starts_with("delete_"))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_instance_for_cleanup() {
        let h = harness(config());
        let cancel = CancellationToken::new();
        CreateInstance.run(&h.state, &cancel).await;
        h.driver.fail_on(Operation::DeleteInstance, "busy");

        let action = TeardownInstance.run(&h.state, &cancel).await;
        assert_eq!(action, StepAction::Halt);
        assert_eq!(h.state.get(keys::INSTANCE_NAME).unwrap(), "kiln-vm");

        // Disk is still attached, so teardown cleanup leaves it alone.
        TeardownInstance.cleanup(&h.state).await.unwrap();
        assert_eq!(h.driver.disk_names(), vec!["kiln-vm"]);

        h.driver.clear_fault(Operation::DeleteInstance);
        CreateInstance.cleanup(&h.state).await.unwrap();
        assert!(h.driver.instance_names().is_empty());
        assert!(h.driver.disk_names().is_empty());
    }

    #[tokio::test]
    async fn test_disk_cleanup_failure_is_reported() {
        let h = harness(config());
        let cancel = CancellationToken::new();
        CreateInstance.run(&h.state, &cancel).await;
        TeardownInstance.run(&h.state, &cancel).await;
        h.driver.fail_on(Operation::DeleteDisk, "in use");

        assert!(TeardownInstance.cleanup(&h.state).await.is_err());
        assert_eq!(h.state.get(keys::DISK_NAME).unwrap(), "kiln-vm");
        assert!(h.ui.contains("Please delete it manually"));
    }
}
