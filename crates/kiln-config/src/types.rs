//! Build template types mapping to the TOML schema.
//!
//! ```toml
//! project_id = "..."          # account
//! zone = "..."                # where the instance runs
//! source_image_family = "..." # what it boots from
//! image_name = "..."          # what gets captured
//! [communicator]              # how to log in
//! [[provisioner]]             # what to run once logged in
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Metadata key GCE runs as the instance startup script.
pub const STARTUP_SCRIPT_KEY: &str = "startup-script";

/// Metadata key the wrapped startup script sets when it finishes.
pub const STARTUP_SCRIPT_STATUS_KEY: &str = "startup-script-status";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root build template.
///
/// Every field has a default so that minimal templates parse; required
/// fields are enforced by [`BuildConfig::prepare`](crate::prepare).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Name of this build, used for debug key file names.
    pub build_name: String,

    /// Pause between steps and keep generated keys on disk.
    pub debug: bool,

    /// Run the whole lifecycle but skip image capture.
    pub dry_run: bool,

    /// GCP project that owns the instance and the image.
    pub project_id: String,

    /// Service-account JSON key. Application default credentials when unset.
    pub account_file: Option<PathBuf>,

    /// Zone the build instance runs in.
    pub zone: String,

    /// Region, derived from `zone` when unset.
    pub region: Option<String>,

    /// Source image name.
    pub source_image: Option<String>,

    /// Source image family (latest image in the family).
    pub source_image_family: Option<String>,

    /// Project hosting the source image, when it is not `project_id`.
    pub source_image_project_id: Option<String>,

    /// Build instance name. Generated when empty.
    pub instance_name: String,

    pub machine_type: String,
    pub disk_size_gb: u64,
    pub disk_type: String,
    pub network: String,
    pub subnetwork: Option<String>,

    /// Static external address to attach.
    pub address: Option<String>,

    pub preemptible: bool,
    pub tags: Vec<String>,
    pub labels: BTreeMap<String, String>,

    /// Instance metadata. A `startup-script` entry declares a startup script.
    pub metadata: BTreeMap<String, String>,

    /// Local file uploaded as the instance startup script.
    pub startup_script_file: Option<PathBuf>,

    /// Connect over the internal IP instead of the external one.
    pub use_internal_ip: bool,

    /// Do not attach an external IP at all.
    pub omit_external_ip: bool,

    /// Service account scopes for the build instance.
    pub scopes: Vec<String>,

    /// Name of the captured image. Generated when empty.
    pub image_name: String,

    pub image_description: String,
    pub image_family: Option<String>,
    pub image_labels: BTreeMap<String, String>,

    /// Upper bound for any single wait on the cloud (instance up, image ready,
    /// startup script done).
    pub state_timeout_secs: u64,

    /// Interval between polls while waiting on the cloud.
    pub poll_interval_secs: u64,

    /// How to log in to the instance.
    pub communicator: CommConfig,

    /// Provisioners run once the instance is reachable.
    #[serde(rename = "provisioner", skip_serializing_if = "Vec::is_empty")]
    pub provisioners: Vec<ProvisionerConfig>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build_name: "googlecompute".to_string(),
            debug: false,
            dry_run: false,
            project_id: String::new(),
            account_file: None,
            zone: String::new(),
            region: None,
            source_image: None,
            source_image_family: None,
            source_image_project_id: None,
            instance_name: String::new(),
            machine_type: "n1-standard-1".to_string(),
            disk_size_gb: 10,
            disk_type: "pd-standard".to_string(),
            network: "default".to_string(),
            subnetwork: None,
            address: None,
            preemptible: false,
            tags: Vec::new(),
            labels: BTreeMap::new(),
            metadata: BTreeMap::new(),
            startup_script_file: None,
            use_internal_ip: false,
            omit_external_ip: false,
            scopes: default_scopes(),
            image_name: String::new(),
            image_description: "Created by Kiln".to_string(),
            image_family: None,
            image_labels: BTreeMap::new(),
            state_timeout_secs: 300,
            poll_interval_secs: 2,
            communicator: CommConfig::default(),
            provisioners: Vec::new(),
        }
    }
}

fn default_scopes() -> Vec<String> {
    [
        "https://www.googleapis.com/auth/userinfo.email",
        "https://www.googleapis.com/auth/compute",
        "https://www.googleapis.com/auth/devstorage.full_control",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl BuildConfig {
    /// Create a template with defaults only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Whether the instance will run a startup script, declared either as
    /// a metadata entry or as a local file.
    pub fn has_startup_script(&self) -> bool {
        self.metadata.contains_key(STARTUP_SCRIPT_KEY) || self.startup_script_file.is_some()
    }

    /// Project that hosts the source image.
    pub fn source_image_project(&self) -> &str {
        self.source_image_project_id
            .as_deref()
            .unwrap_or(&self.project_id)
    }

    /// Region of `zone` (`us-central1-a` → `us-central1`).
    pub fn derived_region(&self) -> Option<String> {
        if let Some(region) = &self.region {
            return Some(region.clone());
        }
        self.zone
            .rsplit_once('-')
            .map(|(region, _)| region.to_string())
            .filter(|r| !r.is_empty())
    }

    /// Path the SSH private key is written to in debug mode.
    pub fn debug_key_path(&self) -> PathBuf {
        PathBuf::from(format!("gce_{}.pem", self.build_name))
    }

    /// Path the Windows password key is written to in debug mode.
    pub fn debug_windows_key_path(&self) -> PathBuf {
        PathBuf::from(format!("gce_windows_{}.pem", self.build_name))
    }

    /// All inline provisioner commands, in template order.
    pub fn inline_commands(&self) -> Vec<String> {
        self.provisioners
            .iter()
            .flat_map(|p| p.inline.iter().cloned())
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Communicator
// ─────────────────────────────────────────────────────────────────────────────

/// Login transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommType {
    #[default]
    Ssh,
    Winrm,
    /// No login; provisioners are skipped.
    None,
}

impl std::fmt::Display for CommType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommType::Ssh => write!(f, "ssh"),
            CommType::Winrm => write!(f, "winrm"),
            CommType::None => write!(f, "none"),
        }
    }
}

/// Communicator settings (`[communicator]`).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommConfig {
    #[serde(rename = "type")]
    pub kind: CommType,

    pub ssh_username: String,
    pub ssh_port: u16,

    /// Existing private key; a temporary key pair is generated when unset.
    pub ssh_private_key_file: Option<PathBuf>,

    pub winrm_username: String,

    /// Fetched from the instance when unset.
    pub winrm_password: Option<String>,
    pub winrm_port: u16,

    /// How long to keep retrying the initial connection.
    pub timeout_secs: u64,
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            kind: CommType::Ssh,
            ssh_username: String::new(),
            ssh_port: 22,
            ssh_private_key_file: None,
            winrm_username: String::new(),
            winrm_password: None,
            winrm_port: 5986,
            timeout_secs: 300,
        }
    }
}

impl CommConfig {
    /// Port for the configured transport.
    pub fn port(&self) -> u16 {
        match self.kind {
            CommType::Winrm => self.winrm_port,
            _ => self.ssh_port,
        }
    }

    /// Login user for the configured transport.
    pub fn username(&self) -> &str {
        match self.kind {
            CommType::Winrm => &self.winrm_username,
            _ => &self.ssh_username,
        }
    }
}

impl std::fmt::Debug for CommConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommConfig")
            .field("kind", &self.kind)
            .field("ssh_username", &self.ssh_username)
            .field("ssh_port", &self.ssh_port)
            .field("ssh_private_key_file", &self.ssh_private_key_file)
            .field("winrm_username", &self.winrm_username)
            .field(
                "winrm_password",
                &self.winrm_password.as_ref().map(|_| "<redacted>"),
            )
            .field("winrm_port", &self.winrm_port)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Provisioners
// ─────────────────────────────────────────────────────────────────────────────

/// A shell provisioner (`[[provisioner]]`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Commands run in order on the instance.
    pub inline: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_template_gets_defaults() {
        let config = BuildConfig::from_toml(
            r#"
project_id = "my-project"
zone = "us-central1-a"
source_image_family = "debian-12"
"#,
        )
        .unwrap();

        assert_eq!(config.project_id, "my-project");
        assert_eq!(config.machine_type, "n1-standard-1");
        assert_eq!(config.disk_size_gb, 10);
        assert_eq!(config.disk_type, "pd-standard");
        assert_eq!(config.network, "default");
        assert_eq!(config.state_timeout_secs, 300);
        assert_eq!(config.communicator.kind, CommType::Ssh);
        assert_eq!(config.communicator.ssh_port, 22);
        assert_eq!(config.scopes.len(), 3);
        assert!(!config.dry_run);
        assert!(config.provisioners.is_empty());
    }

    #[test]
    fn test_full_template() {
        let config = BuildConfig::from_toml(
            r#"
project_id = "p"
zone = "europe-west1-b"
source_image = "debian-12-bookworm-v20240101"
dry_run = true
tags = ["kiln"]

[metadata]
startup-script = "echo hi"

[communicator]
type = "winrm"
winrm_username = "kiln_user"

[[provisioner]]
inline = ["a", "b"]

[[provisioner]]
inline = ["c"]
"#,
        )
        .unwrap();

        assert!(config.dry_run);
        assert_eq!(config.communicator.kind, CommType::Winrm);
        assert_eq!(config.communicator.port(), 5986);
        assert_eq!(config.communicator.username(), "kiln_user");
        assert!(config.has_startup_script());
        assert_eq!(config.inline_commands(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_has_startup_script_from_file() {
        let mut config = BuildConfig::new();
        assert!(!config.has_startup_script());
        config.startup_script_file = Some(PathBuf::from("startup.sh"));
        assert!(config.has_startup_script());
    }

    #[test]
    fn test_derived_region() {
        let mut config = BuildConfig::new();
        config.zone = "us-central1-a".into();
        assert_eq!(config.derived_region().as_deref(), Some("us-central1"));

        config.region = Some("explicit".into());
        assert_eq!(config.derived_region().as_deref(), Some("explicit"));

        let empty = BuildConfig::new();
        assert!(empty.derived_region().is_none());
    }

    #[test]
    fn test_source_image_project_falls_back_to_project() {
        let mut config = BuildConfig::new();
        config.project_id = "mine".into();
        assert_eq!(config.source_image_project(), "mine");
        config.source_image_project_id = Some("debian-cloud".into());
        assert_eq!(config.source_image_project(), "debian-cloud");
    }

    #[test]
    fn test_debug_key_paths() {
        let mut config = BuildConfig::new();
        config.build_name = "web".into();
        assert_eq!(config.debug_key_path(), PathBuf::from("gce_web.pem"));
        assert_eq!(
            config.debug_windows_key_path(),
            PathBuf::from("gce_windows_web.pem")
        );
    }

    #[test]
    fn test_comm_config_debug_redacts_password() {
        let comm = CommConfig {
            winrm_password: Some("hunter2".into()),
            ..Default::default()
        };
        assert!(!format!("{comm:?}").contains("hunter2"));
    }

    #[test]
    fn test_toml_roundtrip_preserves_settings() {
        let mut config = BuildConfig::new();
        config.project_id = "p".into();
        config.metadata.insert("k".into(), "v".into());
        config.provisioners.push(ProvisionerConfig {
            inline: vec!["uname -a".into()],
        });

        let text = config.to_toml().unwrap();
        let parsed = BuildConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_unknown_comm_type_rejected() {
        let err = BuildConfig::from_toml("[communicator]\ntype = \"telnet\"\n").unwrap_err();
        assert!(matches!(err, crate::ConfigError::Parse(_)));
    }
}
