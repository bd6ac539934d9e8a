use async_trait::async_trait;
use kiln_engine::{CancellationToken, StateBag, Step, StepAction};

use super::{Context, StepResult, conclude};

/// Fails early when the target image name is already taken.
#[derive(Debug, Default)]
pub struct CheckExistingImage;

impl CheckExistingImage {
    pub const NAME: &'static str = "check_existing_image";

    async fn execute(&self, state: &StateBag) -> StepResult {
        let ctx = Context::load(state)?;
        let name = &ctx.config.image_name;

        ctx.ui.say(&format!("Checking image {name} does not exist..."));
        if !ctx.driver.image_exists(name).await? {
            return Ok(());
        }
        if ctx.config.dry_run {
            ctx.ui
                .message(&format!("Image {name} already exists; ignored for a dry run"));
            return Ok(());
        }
        Err(format!("Image {name} already exists in project {}", ctx.driver.project_id()).into())
    }
}

#[async_trait]
impl Step for CheckExistingImage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, state: &StateBag, _cancel: &CancellationToken) -> StepAction {
        conclude(state, Self::NAME, self.execute(state).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Operation;
    use crate::steps::test_support::{config, harness};

    #[tokio::test]
    async fn test_free_name_continues() {
        let h = harness(config());
        let action = CheckExistingImage.run(&h.state, &CancellationToken::new()).await;
        assert_eq!(action, StepAction::Continue);
        assert!(h.ui.contains("Checking image kiln-test"));
    }

    #[tokio::test]
    async fn test_taken_name_halts() {
        let h = harness(config());
        h.driver.insert_image("kiln-test");
        let action = CheckExistingImage.run(&h.state, &CancellationToken::new()).await;
        assert_eq!(action, StepAction::Halt);
        let err = h.state.take_error().unwrap();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_taken_name_ignored_for_dry_run() {
        let mut cfg = config();
        cfg.dry_run = true;
        let h = harness(cfg);
        h.driver.insert_image("kiln-test");
        let action = CheckExistingImage.run(&h.state, &CancellationToken::new()).await;
        assert_eq!(action, StepAction::Continue);
    }

    #[tokio::test]
    async fn test_driver_error_halts() {
        let h = harness(config());
        h.driver.fail_on(Operation::ImageExists, "api down");
        let action = CheckExistingImage.run(&h.state, &CancellationToken::new()).await;
        assert_eq!(action, StepAction::Halt);
        let err = h.state.take_error().unwrap();
        assert!(err.inner().downcast_ref::<crate::DriverError>().is_some());
    }
}
