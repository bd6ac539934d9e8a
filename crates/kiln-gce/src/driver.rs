//! The compute driver interface.
//!
//! Steps never talk to the Compute API directly; they call a [`Driver`]
//! stored in the build state. A [`DriverFactory`] builds the driver once per
//! run from the project and the service-account key.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kiln_config::AccountFile;
use tokio_util::sync::CancellationToken;

use crate::error::{DriverError, DriverResult};

/// Shared driver handle stored in the build state.
pub type SharedDriver = Arc<dyn Driver>;

// ─────────────────────────────────────────────────────────────────────────────
// Resource Types
// ─────────────────────────────────────────────────────────────────────────────

/// A machine image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub name: String,
    pub project_id: String,
    pub family: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub size_gb: u64,
}

/// Parameters for capturing an image from a disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub name: String,
    pub description: String,
    pub family: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub source_disk: String,
    pub zone: String,
}

/// Image the instance boots from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceImage {
    /// A specific image.
    Name { project: String, name: String },
    /// The newest image of a family.
    Family { project: String, family: String },
}

/// Everything needed to launch the build instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    pub name: String,
    pub zone: String,
    pub machine_type: String,
    pub source_image: SourceImage,
    /// Boot disk name. The disk survives instance deletion.
    pub disk_name: String,
    pub disk_size_gb: u64,
    pub disk_type: String,
    pub network: String,
    pub subnetwork: Option<String>,
    pub address: Option<String>,
    pub omit_external_ip: bool,
    pub preemptible: bool,
    pub tags: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub metadata: BTreeMap<String, String>,
    pub scopes: Vec<String>,
}

/// Lifecycle status of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Provisioning,
    Staging,
    Running,
    Stopping,
    Terminated,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstanceStatus::Provisioning => "PROVISIONING",
            InstanceStatus::Staging => "STAGING",
            InstanceStatus::Running => "RUNNING",
            InstanceStatus::Stopping => "STOPPING",
            InstanceStatus::Terminated => "TERMINATED",
        };
        f.write_str(s)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver Traits
// ─────────────────────────────────────────────────────────────────────────────

/// Compute API operations used by the build steps.
///
/// Calls are single requests; waiting for an operation to settle is done by
/// the steps with [`wait_until`].
#[async_trait]
pub trait Driver: Send + Sync {
    /// Project this driver operates on.
    fn project_id(&self) -> &str;

    async fn image_exists(&self, name: &str) -> DriverResult<bool>;

    async fn create_image(&self, request: &ImageRequest) -> DriverResult<Image>;

    async fn delete_image(&self, name: &str) -> DriverResult<()>;

    async fn run_instance(&self, config: &InstanceConfig) -> DriverResult<()>;

    async fn delete_instance(&self, zone: &str, name: &str) -> DriverResult<()>;

    async fn delete_disk(&self, zone: &str, name: &str) -> DriverResult<()>;

    async fn instance_status(&self, zone: &str, name: &str) -> DriverResult<InstanceStatus>;

    /// External IP, or the internal one when `internal` is set.
    async fn instance_ip(&self, zone: &str, name: &str, internal: bool) -> DriverResult<String>;

    /// Current value of an instance metadata key.
    async fn instance_metadata(
        &self,
        zone: &str,
        name: &str,
        key: &str,
    ) -> DriverResult<Option<String>>;

    /// Reset the password of a Windows user. The instance encrypts the new
    /// password with `public_key`; the driver returns it decrypted.
    async fn create_windows_password(
        &self,
        zone: &str,
        name: &str,
        username: &str,
        public_key: &str,
    ) -> DriverResult<String>;
}

/// Builds a [`Driver`] for a project.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn connect(
        &self,
        project_id: &str,
        account: Option<&AccountFile>,
    ) -> DriverResult<SharedDriver>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Polling
// ─────────────────────────────────────────────────────────────────────────────

/// Poll `check` until it yields a value, the timeout elapses or `cancel`
/// fires.
///
/// `check` runs at least once. Errors from `check` end the wait
/// immediately.
pub async fn wait_until<T, F, Fut>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    cancel: &CancellationToken,
    mut check: F,
) -> DriverResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DriverResult<Option<T>>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if let Some(value) = check().await? {
            return Ok(value);
        }

        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Err(DriverError::Timeout {
                what: what.to_string(),
                secs: timeout.as_secs(),
            });
        }

        tracing::debug!(what, attempt, "Still waiting");
        tokio::select! {
            _ = cancel.cancelled() => return Err(DriverError::Cancelled(what.to_string())),
            _ = tokio::time::sleep(interval.min(deadline - now)) => {}
        }
    }
}

/// Wait for an instance to reach `want`.
pub async fn wait_for_instance(
    driver: &dyn Driver,
    zone: &str,
    name: &str,
    want: InstanceStatus,
    timeout: Duration,
    interval: Duration,
    cancel: &CancellationToken,
) -> DriverResult<()> {
    let what = format!("instance {name} to become {want}");
    wait_until(&what, timeout, interval, cancel, move || async move {
        let status = driver.instance_status(zone, name).await?;
        Ok((status == want).then_some(()))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_returns_first_value() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let cancel = CancellationToken::new();

        let value = wait_until(
            "thing",
            Duration::from_secs(60),
            Duration::from_secs(1),
            &cancel,
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok((n == 3).then_some(n))
            },
        )
        .await
        .unwrap();

        assert_eq!(value, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_times_out() {
        let cancel = CancellationToken::new();
        let err = wait_until::<(), _, _>(
            "never",
            Duration::from_secs(5),
            Duration::from_secs(1),
            &cancel,
            || async { Ok(None) },
        )
        .await
        .unwrap_err();

        match err {
            DriverError::Timeout { what, secs } => {
                assert_eq!(what, "never");
                assert_eq!(secs, 5);
            }
            other => panic!("Expected Timeout, got: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_observes_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = wait_until::<(), _, _>(
            "cancelled",
            Duration::from_secs(60),
            Duration::from_secs(1),
            &cancel,
            || async { Ok(None) },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DriverError::Cancelled(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_propagates_check_error() {
        let cancel = CancellationToken::new();
        let err = wait_until::<(), _, _>(
            "broken",
            Duration::from_secs(60),
            Duration::from_secs(1),
            &cancel,
            || async { Err(DriverError::Api("boom".into())) },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DriverError::Api(_)));
    }

    #[test]
    fn test_instance_status_display() {
        assert_eq!(InstanceStatus::Running.to_string(), "RUNNING");
        assert_eq!(InstanceStatus::Terminated.to_string(), "TERMINATED");
    }
}
