use std::time::Duration;

use async_trait::async_trait;
use kiln_config::CommType;
use kiln_engine::{CancellationToken, StateBag, Step, StepAction};
use kiln_types::{ConnectTarget, Credentials};
use parking_lot::Mutex;
use tracing::debug;

use super::{Context, StepResult, conclude};
use crate::driver::wait_until;
use crate::error::DriverError;
use crate::keys;

/// Logs in to the instance, retrying until the communicator timeout.
///
/// Skipped entirely when the communicator type is `none`.
#[derive(Debug, Default)]
pub struct Connect;

impl Connect {
    pub const NAME: &'static str = "connect";

    async fn execute(&self, state: &StateBag, cancel: &CancellationToken) -> StepResult {
        let ctx = Context::load(state)?;
        let comm = &ctx.config.communicator;

        let credentials = match comm.kind {
            CommType::None => {
                ctx.ui.say("Communicator is 'none'; not connecting");
                return Ok(());
            }
            CommType::Ssh => Credentials::Ssh {
                username: comm.ssh_username.clone(),
                private_key: state.get(keys::SSH_KEY_PAIR)?.private_key,
            },
            CommType::Winrm => Credentials::WinRm {
                username: comm.winrm_username.clone(),
                password: match &comm.winrm_password {
                    Some(password) => password.clone(),
                    None => state.get(keys::WINDOWS_PASSWORD)?,
                },
            },
        };
        let target = &ConnectTarget {
            host: state.get(keys::INSTANCE_IP)?,
            port: comm.port(),
            credentials,
        };

        let communicator = &state.get(keys::COMMUNICATOR)?;
        ctx.ui.say(&format!("Waiting for {}...", comm.kind));

        let last_error = &Mutex::new(None::<String>);
        let what = format!("{} on {}:{}", comm.kind, target.host, target.port);
        let attempt = wait_until(
            &what,
            Duration::from_secs(comm.timeout_secs),
            ctx.poll_interval(),
            cancel,
            move || async move {
                match communicator.connect(target).await {
                    Ok(session) => Ok(Some(session)),
                    Err(e) => {
                        debug!(host = %target.host, error = %e, "Connection attempt failed");
                        *last_error.lock() = Some(e.to_string());
                        Ok(None)
                    }
                }
            },
        )
        .await;

        let session = match attempt {
            Ok(session) => session,
            Err(DriverError::Timeout { what, secs }) => {
                let cause = last_error.lock().take().unwrap_or_default();
                return Err(format!("Timed out after {secs}s waiting for {what}: {cause}").into());
            }
            Err(e) => return Err(e.into()),
        };

        ctx.ui.say(&format!("Connected to {}!", comm.kind));
        state.put(keys::SESSION, session);
        Ok(())
    }
}

#[async_trait]
impl Step for Connect {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, state: &StateBag, cancel: &CancellationToken) -> StepAction {
        conclude(state, Self::NAME, self.execute(state, cancel).await)
    }

    async fn cleanup(&self, state: &StateBag) -> anyhow::Result<()> {
        if let Some(session) = state.remove(keys::SESSION) {
            debug!(host = %session.host(), "Disconnecting");
            session.disconnect().await?;
        }
        Ok(())
    }
}
