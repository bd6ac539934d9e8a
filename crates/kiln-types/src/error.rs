//! Error types for Kiln collaborators.

use thiserror::Error;

/// Result type alias using the Kiln collaborator error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by collaborators (communicator, provisioner hook, artifacts).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Remote command '{command}' exited with status {exit_code}")]
    Command { command: String, exit_code: i32 },

    #[error("Provisioning failed: {0}")]
    Provision(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
