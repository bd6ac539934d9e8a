use async_trait::async_trait;
use kiln_engine::{CancellationToken, StateBag, Step, StepAction};

use super::{Context, StepResult, conclude};
use crate::driver::ImageRequest;
use crate::keys;

/// Captures the boot disk as the output image.
///
/// Records [`keys::IMAGE`]; the image belongs to the artifact from then on,
/// so there is nothing to clean up.
#[derive(Debug, Default)]
pub struct CreateImage;

impl CreateImage {
    pub const NAME: &'static str = "create_image";

    async fn execute(&self, state: &StateBag) -> StepResult {
        let ctx = Context::load(state)?;
        let config = &ctx.config;

        let request = ImageRequest {
            name: config.image_name.clone(),
            description: config.image_description.clone(),
            family: config.image_family.clone(),
            labels: config.image_labels.clone(),
            source_disk: state.get(keys::DISK_NAME)?,
            zone: config.zone.clone(),
        };

        ctx.ui.say("Creating image...");
        let image = ctx.driver.create_image(&request).await?;
        ctx.ui
            .message(&format!("Image {} created ({} GB)", image.name, image.size_gb));
        state.put(keys::IMAGE, image);
        Ok(())
    }
}

#[async_trait]
impl Step for CreateImage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, state: &StateBag, _cancel: &CancellationToken) -> StepAction {
        conclude(state, Self::NAME, self.execute(state).await)
    }
}
