//! Build template configuration for Kiln.
//!
//! Provides TOML-based build templates with:
//! - Defaults for every optional instance/image setting
//! - One-pass validation that reports every problem at once
//! - Service-account key files (`account_file`) parsed as JSON
//!
//! ```toml
//! project_id = "my-project"
//! zone = "us-central1-a"
//! source_image_family = "debian-12"
//!
//! [communicator]
//! type = "ssh"
//! ssh_username = "kiln"
//!
//! [[provisioner]]
//! inline = ["sudo apt-get update"]
//! ```

pub mod account;
pub mod discovery;
pub mod error;
pub mod prepare;
pub mod types;

pub use account::AccountFile;
pub use discovery::{find_template, load_config_file, xdg_config_dir};
pub use error::{ConfigError, Result};
pub use prepare::Prepared;
pub use types::{
    BuildConfig, CommConfig, CommType, ProvisionerConfig, STARTUP_SCRIPT_KEY,
    STARTUP_SCRIPT_STATUS_KEY,
};
