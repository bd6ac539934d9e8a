use std::collections::BTreeMap;

use async_trait::async_trait;
use kiln_config::{BuildConfig, STARTUP_SCRIPT_KEY};
use kiln_engine::{CancellationToken, StateBag, Step, StepAction};
use tracing::{debug, warn};

use super::{Context, StepResult, conclude};
use crate::driver::{InstanceConfig, InstanceStatus, SourceImage, wait_for_instance};
use crate::keys;

/// Metadata key holding the user's own startup script once it is wrapped.
pub const USER_STARTUP_SCRIPT_KEY: &str = "kiln-user-startup-script";

/// Metadata key carrying authorized SSH keys.
const SSH_KEYS_KEY: &str = "ssh-keys";

/// Runs the user's startup script, then publishes its outcome under
/// `startup-script-status` so the build can wait for it.
const STARTUP_WRAPPER: &str = r#"#!/bin/bash
set -u
md="http://metadata.google.internal/computeMetadata/v1/instance"
curl -sf -H "Metadata-Flavor: Google" "$md/attributes/kiln-user-startup-script" > /tmp/kiln-startup
chmod +x /tmp/kiln-startup
if /tmp/kiln-startup; then status=done; else status=error; fi
gcloud compute instances add-metadata "$(hostname)" \
  --zone "$(curl -sf -H 'Metadata-Flavor: Google' "$md/zone" | cut -d/ -f4)" \
  --metadata startup-script-status="$status"
"#;

/// Launches the build instance and waits for it to reach `RUNNING`.
///
/// Records [`keys::INSTANCE_NAME`] and [`keys::DISK_NAME`] as soon as the
/// launch request succeeds. Cleanup deletes whichever of the two is still
/// recorded.
#[derive(Debug, Default)]
pub struct CreateInstance;

impl CreateInstance {
    pub const NAME: &'static str = "create_instance";

    async fn execute(&self, state: &StateBag, cancel: &CancellationToken) -> StepResult {
        let ctx = Context::load(state)?;
        let config = &ctx.config;

        let mut metadata = config.metadata.clone();
        if let Some(pair) = state.get_ok(keys::SSH_KEY_PAIR)
            && !pair.public_key.is_empty()
        {
            let entry = format!("{}:{}", config.communicator.ssh_username, pair.public_key);
            add_ssh_key(&mut metadata, &entry);
        }
        let user_script = match &config.startup_script_file {
            Some(path) => Some(tokio::fs::read_to_string(path).await?),
            None => metadata.remove(STARTUP_SCRIPT_KEY),
        };
        if let Some(script) = user_script {
            metadata.insert(USER_STARTUP_SCRIPT_KEY.to_string(), script);
            metadata.insert(STARTUP_SCRIPT_KEY.to_string(), STARTUP_WRAPPER.to_string());
        }

        let instance = instance_config(config, metadata);
        ctx.ui.say("Creating instance...");
        debug!(instance = %instance.name, zone = %instance.zone, "Launching instance");
        ctx.driver.run_instance(&instance).await?;

        state.put(keys::INSTANCE_NAME, instance.name.clone());
        state.put(keys::DISK_NAME, instance.disk_name.clone());

        ctx.ui.message("Waiting for creation operation to complete...");
        wait_for_instance(
            ctx.driver.as_ref(),
            &instance.zone,
            &instance.name,
            InstanceStatus::Running,
            ctx.state_timeout(),
            ctx.poll_interval(),
            cancel,
        )
        .await?;

        ctx.ui.message("Instance has been created!");
        Ok(())
    }
}

fn add_ssh_key(metadata: &mut BTreeMap<String, String>, entry: &str) {
    metadata
        .entry(SSH_KEYS_KEY.to_string())
        .and_modify(|keys| {
            keys.push('\n');
            keys.push_str(entry);
        })
        .or_insert_with(|| entry.to_string());
}

fn instance_config(config: &BuildConfig, metadata: BTreeMap<String, String>) -> InstanceConfig {
    let project = config.source_image_project().to_string();
    let source_image = match (&config.source_image, &config.source_image_family) {
        (Some(name), _) => SourceImage::Name {
            project,
            name: name.clone(),
        },
        (None, family) => SourceImage::Family {
            project,
            family: family.clone().unwrap_or_default(),
        },
    };

    InstanceConfig {
        name: config.instance_name.clone(),
        zone: config.zone.clone(),
        machine_type: config.machine_type.clone(),
        source_image,
        disk_name: config.instance_name.clone(),
        disk_size_gb: config.disk_size_gb,
        disk_type: config.disk_type.clone(),
        network: config.network.clone(),
        subnetwork: config.subnetwork.clone(),
        address: config.address.clone(),
        omit_external_ip: config.omit_external_ip,
        preemptible: config.preemptible,
        tags: config.tags.clone(),
        labels: config.labels.clone(),
        metadata,
        scopes: config.scopes.clone(),
    }
}

#[async_trait]
impl Step for CreateInstance {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, state: &StateBag, cancel: &CancellationToken) -> StepAction {
        conclude(state, Self::NAME, self.execute(state, cancel).await)
    }

    async fn cleanup(&self, state: &StateBag) -> anyhow::Result<()> {
        let ctx = Context::load(state)?;
        let zone = &ctx.config.zone;
        let mut failures = Vec::new();

        if let Some(name) = state.remove(keys::INSTANCE_NAME) {
            ctx.ui.say("Deleting instance...");
            match ctx.driver.delete_instance(zone, &name).await {
                Ok(()) => ctx.ui.message("Instance has been deleted!"),
                Err(e) => {
                    ctx.ui.error(&format!(
                        "Error deleting instance. Please delete it manually.\n\nName: {name}\nError: {e}"
                    ));
                    failures.push(format!("instance {name}: {e}"));
                }
            }
        }

        if let Some(disk) = state.get_ok(keys::DISK_NAME) {
            ctx.ui.say("Deleting disk...");
            match ctx.driver.delete_disk(zone, &disk).await {
                Ok(()) => {
                    state.remove(keys::DISK_NAME);
                    ctx.ui.message("Disk has been deleted!");
                }
                Err(e) => {
                    ctx.ui.error(&format!(
                        "Error deleting disk. Please delete it manually.\n\nName: {disk}\nError: {e}"
                    ));
                    failures.push(format!("disk {disk}: {e}"));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            warn!(count = failures.len(), "Instance resources left behind");
            anyhow::bail!("failed to delete {}", failures.join(", "))
        }
    }
}
