//! Error types for the GCE builder.

use kiln_config::ConfigError;
use kiln_engine::StepError;
use thiserror::Error;

/// Result type alias for builder operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Result type alias for driver calls.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Errors returned by a [`Driver`](crate::Driver).
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Disk not found: {0}")]
    DiskNotFound(String),

    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("Timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },

    #[error("Cancelled while waiting for {0}")]
    Cancelled(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Compute API error: {0}")]
    Api(String),
}

/// Errors surfaced by [`Builder`](crate::Builder).
#[derive(Debug, Error)]
pub enum BuildError {
    /// The template failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The driver could not be constructed; no step ran.
    #[error("Failed to create compute driver: {0}")]
    Driver(#[source] DriverError),

    /// A step halted the run.
    #[error(transparent)]
    Step(#[from] StepError),

    /// The run was cancelled before producing an image.
    #[error("Build was cancelled")]
    Cancelled,

    /// The run finished without recording an error or an image.
    #[error("Build finished without an error or an image; this is a bug")]
    MissingImage,

    /// `run` was called before a successful `prepare`.
    #[error("Builder must be prepared before it can run")]
    NotPrepared,
}

impl BuildError {
    /// Name of the failing step, for step failures.
    pub fn step(&self) -> Option<&str> {
        match self {
            BuildError::Step(e) => Some(e.step()),
            _ => None,
        }
    }
}
