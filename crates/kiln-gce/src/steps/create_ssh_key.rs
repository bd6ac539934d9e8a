use async_trait::async_trait;
use kiln_config::CommType;
use kiln_engine::{CancellationToken, StateBag, Step, StepAction};
use kiln_types::KeyPair;

use super::{Context, StepResult, conclude};
use crate::keys;

/// Provides the SSH key pair used to log in.
///
/// Loads `ssh_private_key_file` when configured (its `.pub` sibling, if any,
/// supplies the public half), otherwise asks the communicator for a fresh
/// pair. In debug mode the private key is also written to
/// `gce_<build_name>.pem`.
#[derive(Debug, Default)]
pub struct CreateSshKey;

impl CreateSshKey {
    pub const NAME: &'static str = "create_ssh_key";

    async fn execute(&self, state: &StateBag) -> StepResult {
        let ctx = Context::load(state)?;
        let comm = &ctx.config.communicator;
        if comm.kind != CommType::Ssh {
            return Ok(());
        }

        let pair = match &comm.ssh_private_key_file {
            Some(path) => {
                ctx.ui.say("Using existing SSH private key");
                let private_key = tokio::fs::read_to_string(path).await?;
                let public_key = tokio::fs::read_to_string(path.with_extension("pub"))
                    .await
                    .map(|k| k.trim().to_string())
                    .unwrap_or_default();
                KeyPair {
                    private_key,
                    public_key,
                }
            }
            None => {
                ctx.ui.say("Creating temporary SSH key for instance...");
                state.get(keys::COMMUNICATOR)?.generate_key_pair()?
            }
        };

        if ctx.config.debug {
            let path = ctx.config.debug_key_path();
            ctx.ui
                .message(&format!("Saving key for debug purposes: {}", path.display()));
            tokio::fs::write(&path, &pair.private_key).await?;
        }

        state.put(keys::SSH_KEY_PAIR, pair);
        Ok(())
    }
}

#[async_trait]
impl Step for CreateSshKey {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, state: &StateBag, _cancel: &CancellationToken) -> StepAction {
        conclude(state, Self::NAME, self.execute(state).await)
    }
}
