//! Provisioner hook.
//!
//! The provision step calls its [`ProvisionHook`] exactly once, with the
//! live session when the build has one. What the hook does (shell scripts,
//! file uploads, config management) is opaque to the builder.

use std::sync::Arc;

use async_trait::async_trait;

use crate::communicator::RemoteSession;
use crate::error::{Error, Result};
use crate::ui::Ui;

/// Shared provisioner hook type.
pub type SharedHook = Arc<dyn ProvisionHook>;

/// Runs provisioners against a connected instance.
///
/// This trait is object-safe and is stored in the build state as
/// `Arc<dyn ProvisionHook>`.
#[async_trait]
pub trait ProvisionHook: Send + Sync {
    /// Provision the instance.
    ///
    /// `session` is `None` when the build has no communicator.
    async fn provision(&self, ui: &dyn Ui, session: Option<&dyn RemoteSession>) -> Result<()>;
}

/// A hook that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

#[async_trait]
impl ProvisionHook for NoopHook {
    async fn provision(&self, _ui: &dyn Ui, _session: Option<&dyn RemoteSession>) -> Result<()> {
        Ok(())
    }
}

/// Runs a fixed list of shell commands in order, failing on the first
/// non-zero exit status.
#[derive(Debug, Clone, Default)]
pub struct InlineShellHook {
    commands: Vec<String>,
}

impl InlineShellHook {
    /// Create a hook from a list of commands.
    pub fn new(commands: Vec<String>) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl ProvisionHook for InlineShellHook {
    async fn provision(&self, ui: &dyn Ui, session: Option<&dyn RemoteSession>) -> Result<()> {
        if self.commands.is_empty() {
            return Ok(());
        }
        let Some(session) = session else {
            return Err(Error::Provision(format!(
                "{} inline command(s) configured but no session is available",
                self.commands.len()
            )));
        };

        for command in &self.commands {
            ui.say(&format!("Provisioning with shell command: {command}"));
            tracing::debug!(host = %session.host(), command = %command, "Running inline provisioner");

            let output = session.execute(command).await?;
            if !output.stdout.is_empty() {
                ui.message(output.stdout.trim_end());
            }
            if !output.success() {
                if !output.stderr.is_empty() {
                    ui.error(output.stderr.trim_end());
                }
                return Err(Error::Command {
                    command: command.clone(),
                    exit_code: output.exit_code,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communicator::CommandOutput;
    use crate::ui::BufferedUi;
    use parking_lot::Mutex;

    struct ScriptedSession {
        ran: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl RemoteSession for ScriptedSession {
        fn host(&self) -> &str {
            "10.0.0.2"
        }

        async fn execute(&self, command: &str) -> Result<CommandOutput> {
            self.ran.lock().push(command.to_string());
            if self.fail_on.as_deref() == Some(command) {
                Ok(CommandOutput::new("", "no such file", 127))
            } else {
                Ok(CommandOutput::new(format!("ran {command}"), "", 0))
            }
        }
    }

    #[tokio::test]
    async fn test_noop_hook() {
        let session = ScriptedSession {
            ran: Mutex::new(Vec::new()),
            fail_on: None,
        };
        NoopHook.provision(&BufferedUi::new(), Some(&session)).await.unwrap();
        NoopHook.provision(&BufferedUi::new(), None).await.unwrap();
        assert!(session.ran.lock().is_empty());
    }

    #[tokio::test]
    async fn test_inline_hook_runs_commands_in_order() {
        let session = ScriptedSession {
            ran: Mutex::new(Vec::new()),
            fail_on: None,
        };
        let ui = BufferedUi::new();
        let hook = InlineShellHook::new(vec!["apt-get update".into(), "echo done".into()]);

        hook.provision(&ui, Some(&session)).await.unwrap();

        assert_eq!(*session.ran.lock(), vec!["apt-get update", "echo done"]);
        assert!(ui.contains("ran echo done"));
    }

    #[tokio::test]
    async fn test_inline_hook_stops_on_failure() {
        let session = ScriptedSession {
            ran: Mutex::new(Vec::new()),
            fail_on: Some("missing-binary".into()),
        };
        let ui = BufferedUi::new();
        let hook = InlineShellHook::new(vec![
            "missing-binary".into(),
            "never-runs".into(),
        ]);

        let err = hook.provision(&ui, Some(&session)).await.unwrap_err();
        match err {
            Error::Command { command, exit_code } => {
                assert_eq!(command, "missing-binary");
                assert_eq!(exit_code, 127);
            }
            other => panic!("Expected Command error, got: {other:?}"),
        }
        assert_eq!(session.ran.lock().len(), 1);
        assert!(ui.contains("no such file"));
    }

    #[tokio::test]
    async fn test_inline_hook_without_session() {
        let ui = BufferedUi::new();
        InlineShellHook::default().provision(&ui, None).await.unwrap();

        let hook = InlineShellHook::new(vec!["echo hi".into()]);
        let err = hook.provision(&ui, None).await.unwrap_err();
        assert!(matches!(err, Error::Provision(ref msg) if msg.contains("no session")));
    }
}
