//! Error types for the step engine.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the state container.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A key was read before any step wrote it.
    #[error("State key not present: {0}")]
    MissingState(&'static str),

    /// A key holds a value of a different type than the reader expects.
    #[error("State key '{key}' does not hold a value of type {expected}")]
    TypeMismatch {
        key: &'static str,
        expected: &'static str,
    },
}

/// The error a step records when it halts a run.
///
/// Carries the name of the failing step and the underlying collaborator
/// error, so callers can diagnose a failure without access to the state.
#[derive(Debug, Error)]
#[error("step '{step}' failed: {source}")]
pub struct StepError {
    step: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl StepError {
    /// Create a step error from any error type.
    pub fn new(
        step: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            step: step.into(),
            source: source.into(),
        }
    }

    /// Create a step error from a plain message.
    pub fn msg(step: impl Into<String>, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::new(step, message)
    }

    /// Name of the step that failed.
    pub fn step(&self) -> &str {
        &self.step
    }

    /// The underlying error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_step_error_display_names_step() {
        let err = StepError::msg("create_instance", "quota exceeded");
        assert_eq!(err.step(), "create_instance");
        assert_eq!(
            err.to_string(),
            "step 'create_instance' failed: quota exceeded"
        );
    }

    #[test]
    fn test_step_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "key.pem");
        let err = StepError::new("create_ssh_key", io);
        assert!(err.source().is_some());
        assert!(err.inner().to_string().contains("key.pem"));
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::MissingState("image");
        assert_eq!(err.to_string(), "State key not present: image");
        let err = EngineError::TypeMismatch {
            key: "image",
            expected: "alloc::string::String",
        };
        assert!(err.to_string().contains("'image'"));
    }
}
