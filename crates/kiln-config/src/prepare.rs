//! Default filling and validation.
//!
//! [`BuildConfig::prepare`] turns a parsed template into one that is safe to
//! build from. Every problem is collected and reported together so a user
//! can fix a template in one pass.

use tracing::debug;

use crate::account::AccountFile;
use crate::error::{ConfigError, Result};
use crate::types::{BuildConfig, CommType, STARTUP_SCRIPT_KEY};

/// A validated template plus everything learned while validating it.
#[derive(Debug, Clone)]
pub struct Prepared {
    /// The template with defaults filled in.
    pub config: BuildConfig,
    /// Parsed `account_file`, when one was configured.
    pub account: Option<AccountFile>,
    /// Non-fatal findings worth showing to the user.
    pub warnings: Vec<String>,
}

impl BuildConfig {
    /// Fill defaults and validate.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Validation`] listing every problem found.
    pub fn prepare(mut self) -> Result<Prepared> {
        let mut problems = Vec::new();
        let mut warnings = Vec::new();

        if self.image_name.is_empty() {
            self.image_name = format!("kiln-{}", chrono::Utc::now().timestamp());
        }
        if self.instance_name.is_empty() {
            self.instance_name = format!("kiln-{}", uuid::Uuid::new_v4());
        }
        if self.region.is_none() {
            self.region = self.derived_region();
        }

        if self.project_id.is_empty() {
            problems.push("project_id is required".to_string());
        }
        if self.zone.is_empty() {
            problems.push("zone is required".to_string());
        }
        if self.source_image.is_none() && self.source_image_family.is_none() {
            problems.push("one of source_image or source_image_family is required".to_string());
        }

        if !is_valid_resource_name(&self.image_name) {
            problems.push(format!(
                "image_name '{}' must be 1-63 lowercase letters, digits or dashes, \
                 start with a letter and not end with a dash",
                self.image_name
            ));
        }
        if let Some(family) = &self.image_family
            && !is_valid_resource_name(family)
        {
            problems.push(format!("image_family '{family}' is not a valid name"));
        }
        if !is_valid_resource_name(&self.instance_name) {
            problems.push(format!(
                "instance_name '{}' is not a valid name",
                self.instance_name
            ));
        }

        if self.omit_external_ip && !self.use_internal_ip {
            problems.push("omit_external_ip requires use_internal_ip".to_string());
        }
        if self.disk_size_gb == 0 {
            problems.push("disk_size_gb must be greater than zero".to_string());
        }
        if self.state_timeout_secs == 0 {
            problems.push("state_timeout_secs must be greater than zero".to_string());
        }
        if self.poll_interval_secs == 0 {
            problems.push("poll_interval_secs must be greater than zero".to_string());
        }

        self.validate_communicator(&mut problems, &mut warnings);

        if let Some(path) = &self.startup_script_file {
            if !path.is_file() {
                problems.push(format!(
                    "startup_script_file '{}' does not exist",
                    path.display()
                ));
            }
            if self.metadata.contains_key(STARTUP_SCRIPT_KEY) {
                warnings.push(format!(
                    "both metadata[\"{STARTUP_SCRIPT_KEY}\"] and startup_script_file are set; \
                     startup_script_file takes precedence"
                ));
            }
        }

        let account = match &self.account_file {
            Some(path) => match AccountFile::load(path) {
                Ok(account) => Some(account),
                Err(e) => {
                    problems.push(e.to_string());
                    None
                }
            },
            None => None,
        };

        if !problems.is_empty() {
            return Err(ConfigError::Validation(problems));
        }

        debug!(
            image = %self.image_name,
            instance = %self.instance_name,
            warnings = warnings.len(),
            "Build template prepared"
        );
        Ok(Prepared {
            config: self,
            account,
            warnings,
        })
    }

    fn validate_communicator(&self, problems: &mut Vec<String>, warnings: &mut Vec<String>) {
        let comm = &self.communicator;
        match comm.kind {
            CommType::Ssh => {
                if comm.ssh_username.is_empty() {
                    problems.push("communicator.ssh_username is required".to_string());
                }
                if let Some(path) = &comm.ssh_private_key_file
                    && !path.is_file()
                {
                    problems.push(format!(
                        "communicator.ssh_private_key_file '{}' does not exist",
                        path.display()
                    ));
                }
            }
            CommType::Winrm => {
                if comm.winrm_username.is_empty() {
                    problems.push("communicator.winrm_username is required".to_string());
                }
                if comm.winrm_password.is_some() {
                    warnings.push(
                        "communicator.winrm_password is stored in plain text in the template"
                            .to_string(),
                    );
                }
            }
            CommType::None => {
                if !self.inline_commands().is_empty() {
                    problems.push(
                        "inline provisioners need a communicator; type is 'none'".to_string(),
                    );
                }
            }
        }
        if comm.kind != CommType::None && comm.timeout_secs == 0 {
            problems.push("communicator.timeout_secs must be greater than zero".to_string());
        }
    }
}

/// GCE resource name rule: `[a-z]([-a-z0-9]{0,61}[a-z0-9])?`.
fn is_valid_resource_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > 63 {
        return false;
    }
    if !bytes[0].is_ascii_lowercase() {
        return false;
    }
    if bytes[bytes.len() - 1] == b'-' {
        return false;
    }
    bytes
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}
