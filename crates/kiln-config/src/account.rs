//! Service-account key files.
//!
//! `account_file` points at the JSON key downloaded from the cloud console.
//! Only the fields needed to authenticate are kept.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// A parsed service-account JSON key.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AccountFile {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub client_id: String,
}

impl AccountFile {
    /// Read and validate a key file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&contents).map_err(|reason| ConfigError::Account {
            path: path.display().to_string(),
            reason,
        })
    }

    /// Parse and validate key JSON. The error is a human-readable reason.
    pub fn from_json(json: &str) -> std::result::Result<Self, String> {
        let account: AccountFile = serde_json::from_str(json).map_err(|e| e.to_string())?;
        if account.client_email.is_empty() {
            return Err("missing client_email".to_string());
        }
        if account.private_key.is_empty() {
            return Err("missing private_key".to_string());
        }
        if !account.kind.is_empty() && account.kind != "service_account" {
            return Err(format!(
                "expected type 'service_account', got '{}'",
                account.kind
            ));
        }
        Ok(account)
    }
}

impl std::fmt::Debug for AccountFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountFile")
            .field("kind", &self.kind)
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}
