//! The build entry point.
//!
//! [`Builder`] validates a template, connects the driver, seeds a fresh
//! [`StateBag`] with the collaborators, runs the planned steps and turns
//! whatever the run left in the state into an [`ImageArtifact`] or a
//! [`BuildError`].

use std::sync::Arc;

use kiln_config::{BuildConfig, Prepared};
use kiln_engine::{CancellationToken, PauseHandler, RunStatus, StateBag, StepRunner};
use kiln_types::{Communicator, SharedHook, SharedUi};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::artifact::ImageArtifact;
use crate::driver::{DriverFactory, SharedDriver};
use crate::error::{BuildError, Result};
use crate::keys;
use crate::planner;

/// External collaborators for one run.
#[derive(Clone)]
pub struct Collaborators {
    pub driver_factory: Arc<dyn DriverFactory>,
    pub communicator: Arc<dyn Communicator>,
    pub hook: SharedHook,
    pub ui: SharedUi,
    /// Consulted between steps when the template enables `debug`.
    pub pause: Option<Arc<dyn PauseHandler>>,
}

/// Builds one machine image from a template.
#[derive(Default)]
pub struct Builder {
    prepared: Option<Prepared>,
    /// Token of the run in progress, if any.
    running: Mutex<Option<CancellationToken>>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `config` and keep it for [`run`](Self::run).
    ///
    /// Returns the non-fatal warnings found while validating.
    pub fn prepare(&mut self, config: BuildConfig) -> Result<Vec<String>> {
        let prepared = config.prepare()?;
        let warnings = prepared.warnings.clone();
        for warning in &warnings {
            debug!(warning = %warning, "Template warning");
        }
        self.prepared = Some(prepared);
        Ok(warnings)
    }

    /// The prepared template, once [`prepare`](Self::prepare) succeeded.
    pub fn config(&self) -> Option<&BuildConfig> {
        self.prepared.as_ref().map(|p| &p.config)
    }

    /// Run the build.
    ///
    /// `Ok(None)` means a dry run completed; no image is produced.
    pub async fn run(&self, collaborators: Collaborators) -> Result<Option<ImageArtifact>> {
        let prepared = self.prepared.as_ref().ok_or(BuildError::NotPrepared)?;
        let config = Arc::new(prepared.config.clone());

        let token = CancellationToken::new();
        let _running = RunningGuard::install(&self.running, token.clone());

        let driver = collaborators
            .driver_factory
            .connect(&config.project_id, prepared.account.as_ref())
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to create compute driver");
                BuildError::Driver(e)
            })?;
        if token.is_cancelled() {
            info!("Build cancelled before the first step");
            return Err(BuildError::Cancelled);
        }

        let state = StateBag::new();
        state.put(keys::CONFIG, config.clone());
        state.put(keys::DRIVER, driver.clone());
        state.put(keys::HOOK, collaborators.hook);
        state.put(keys::UI, collaborators.ui);
        state.put(keys::COMMUNICATOR, collaborators.communicator);

        let mut runner = StepRunner::new(planner::plan(&config)).with_cancellation(token);
        if config.debug
            && let Some(pause) = collaborators.pause
        {
            runner = runner.with_pause(pause);
        }

        info!(
            image = %config.image_name,
            instance = %config.instance_name,
            steps = runner.len(),
            dry_run = config.dry_run,
            "Starting build"
        );
        let status = runner.run(&state).await;
        info!(status = ?status, "Build finished");

        extract(&state, &status, driver, config)
    }

    /// Cancel the run in progress. No effect when no run is in progress.
    pub fn cancel(&self) {
        match self.running.lock().as_ref() {
            Some(token) => {
                info!("Cancelling build");
                token.cancel();
            }
            None => debug!("Cancel requested with no build running"),
        }
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

/// Holds the token of the run in progress; clears it when the run returns
/// or its future is dropped.
struct RunningGuard<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
}

impl<'a> RunningGuard<'a> {
    fn install(slot: &'a Mutex<Option<CancellationToken>>, token: CancellationToken) -> Self {
        *slot.lock() = Some(token);
        Self { slot }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

/// Turn what a finished run left in the state into the build result.
///
/// A recorded error wins over everything else, then a captured image.
fn extract(
    state: &StateBag,
    status: &RunStatus,
    driver: SharedDriver,
    config: Arc<BuildConfig>,
) -> Result<Option<ImageArtifact>> {
    if let Some(err) = state.take_error() {
        return Err(BuildError::Step(err));
    }
    if let Some(image) = state.get_ok(keys::IMAGE) {
        return Ok(Some(ImageArtifact::new(image, driver, config)));
    }
    match status {
        RunStatus::Cancelled => Err(BuildError::Cancelled),
        RunStatus::Completed if config.dry_run => Ok(None),
        _ => {
            error!(status = ?status, "Run left neither an error nor an image in the state");
            Err(BuildError::MissingImage)
        }
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("prepared", &self.prepared.is_some())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCommunicator, MemoryDriver, MemoryDriverFactory};
    use crate::driver::Image;
    use kiln_types::{BufferedUi, NoopHook};
    use std::collections::BTreeMap;

    fn collaborators() -> Collaborators {
        Collaborators {
            driver_factory: Arc::new(MemoryDriverFactory::new(Arc::new(MemoryDriver::new("p")))),
            communicator: Arc::new(MemoryCommunicator::new()),
            hook: Arc::new(NoopHook),
            ui: Arc::new(BufferedUi::new()),
            pause: None,
        }
    }

    #[tokio::test]
    async fn test_run_requires_prepare() {
        let builder = Builder::new();
        let err = builder.run(collaborators()).await.unwrap_err();
        assert!(matches!(err, BuildError::NotPrepared));
    }

    #[test]
    fn test_prepare_rejects_invalid_template() {
        let mut builder = Builder::new();
        let err = builder.prepare(BuildConfig::new()).unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
        assert!(builder.config().is_none());
    }

    #[test]
    fn test_cancel_without_run_is_noop() {
        let builder = Builder::new();
        builder.cancel();
        builder.cancel();
        assert!(!builder.is_running());
    }

    fn image() -> Image {
        Image {
            name: "kiln-web".into(),
            project_id: "p".into(),
            family: None,
            labels: BTreeMap::new(),
            size_gb: 10,
        }
    }

    fn extract_with(
        state: &StateBag,
        status: RunStatus,
        dry_run: bool,
    ) -> Result<Option<ImageArtifact>> {
        let mut config = BuildConfig::new();
        config.dry_run = dry_run;
        extract(
            state,
            &status,
            Arc::new(MemoryDriver::new("p")),
            Arc::new(config),
        )
    }

    #[test]
    fn test_extract_error_wins_over_image_and_cancel() {
        let state = StateBag::new();
        state.put(keys::IMAGE, image());
        state.halt("create_image", "disk vanished");

        let err = extract_with(&state, RunStatus::Cancelled, false).unwrap_err();
        assert_eq!(err.step(), Some("create_image"));
        assert!(!state.has_error());
    }

    #[test]
    fn test_extract_image_becomes_artifact() {
        let state = StateBag::new();
        state.put(keys::IMAGE, image());
        let artifact = extract_with(&state, RunStatus::Completed, false)
            .unwrap()
            .expect("artifact");
        assert!(format!("{artifact:?}").contains("kiln-web"));
    }

    #[test]
    fn test_extract_cancelled_without_error() {
        let err = extract_with(&StateBag::new(), RunStatus::Cancelled, false).unwrap_err();
        assert!(matches!(err, BuildError::Cancelled));
    }

    #[test]
    fn test_extract_completed_dry_run_has_no_image() {
        let result = extract_with(&StateBag::new(), RunStatus::Completed, true).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_extract_completed_without_image_is_missing_image() {
        let err = extract_with(&StateBag::new(), RunStatus::Completed, false).unwrap_err();
        assert!(matches!(err, BuildError::MissingImage));
    }

    #[test]
    fn test_extract_halted_without_error_is_missing_image() {
        for dry_run in [false, true] {
            let status = RunStatus::Halted {
                step: "provision".into(),
            };
            let err = extract_with(&StateBag::new(), status, dry_run).unwrap_err();
            assert!(matches!(err, BuildError::MissingImage));
        }
    }

    #[test]
    fn test_running_guard_clears_slot_on_drop() {
        let builder = Builder::new();
        {
            let _guard = RunningGuard::install(&builder.running, CancellationToken::new());
            assert!(builder.is_running());
        }
        assert!(!builder.is_running());
    }
}
