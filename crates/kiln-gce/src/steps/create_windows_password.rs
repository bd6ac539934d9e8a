use async_trait::async_trait;
use kiln_config::CommType;
use kiln_engine::{CancellationToken, StateBag, Step, StepAction};

use super::{Context, StepResult, conclude};
use crate::keys;

/// Resets the WinRM user's password when the template does not supply one.
///
/// The instance encrypts the new password with a throwaway key pair; in
/// debug mode the private half is saved to `gce_windows_<build_name>.pem`
/// and the password is shown.
#[derive(Debug, Default)]
pub struct CreateWindowsPassword;

impl CreateWindowsPassword {
    pub const NAME: &'static str = "create_windows_password";

    async fn execute(&self, state: &StateBag) -> StepResult {
        let ctx = Context::load(state)?;
        let comm = &ctx.config.communicator;
        if comm.kind != CommType::Winrm || comm.winrm_password.is_some() {
            return Ok(());
        }

        let instance = state.get(keys::INSTANCE_NAME)?;
        let pair = state.get(keys::COMMUNICATOR)?.generate_key_pair()?;

        ctx.ui.say("Creating password for WinRM...");
        let password = ctx
            .driver
            .create_windows_password(
                &ctx.config.zone,
                &instance,
                &comm.winrm_username,
                &pair.public_key,
            )
            .await?;

        if ctx.config.debug {
            let path = ctx.config.debug_windows_key_path();
            ctx.ui
                .message(&format!("Saving key for debug purposes: {}", path.display()));
            tokio::fs::write(&path, &pair.private_key).await?;
            ctx.ui
                .message(&format!("Password (since debug is enabled): {password}"));
        }

        ctx.ui.message("Password created");
        state.put(keys::WINDOWS_PASSWORD, password);
        Ok(())
    }
}

#[async_trait]
impl Step for CreateWindowsPassword {
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
    use crate::steps::CreateInstance;
    use crate::steps::test_support::{config, harness};

    fn winrm() -> kiln_config::BuildConfig {
        let mut cfg = config();
        cfg.communicator.kind = CommType::Winrm;
        cfg.communicator.winrm_username = "kiln_user".into();
        cfg
    }

    #[tokio::test]
    async fn test_skipped_for_ssh() {
        let h = harness(config());
        let action = CreateWindowsPassword
            .run(&h.state, &CancellationToken::new())
            .await;
        assert_eq!(action, StepAction::Continue);
        assert!(h.driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_skipped_when_password_configured() {
        let mut cfg = winrm();
        cfg.communicator.winrm_password = Some("pw".into());
        let h = harness(cfg);
        CreateWindowsPassword
            .run(&h.state, &CancellationToken::new())
            .await;
        assert!(h.state.get_ok(keys::WINDOWS_PASSWORD).is_none());
    }

    #[tokio::test]
    async fn test_password_recorded() {
        let h = harness(winrm());
        let cancel = CancellationToken::new();
        CreateInstance.run(&h.state, &cancel).await;

        let action = CreateWindowsPassword.run(&h.state, &cancel).await;
        assert_eq!(action, StepAction::Continue);
        let password = h.state.get(keys::WINDOWS_PASSWORD).unwrap();
        assert!(password.starts_with("kiln_user-"));
    }

    #[tokio::test]
    async fn test_requires_instance() {
        let h = harness(winrm());
        let action = CreateWindowsPassword
            .run(&h.state, &CancellationToken::new())
            .await;
        assert_eq!(action, StepAction::Halt);
        assert!(h.state.take_error().unwrap().to_string().contains("instance_name"));
    }

    #[tokio::test]
    async fn test_driver_failure_halts() {
        let h = harness(winrm());
        let cancel = CancellationToken::new();
        CreateInstance.run(&h.state, &cancel).await;
        h.driver.fail_on(Operation::WindowsPassword, "guest agent not ready");

        let action = CreateWindowsPassword.run(&h.state, &cancel).await;
        assert_eq!(action, StepAction::Halt);
    }
}
