//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading and preparing a build template.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a file referenced by the template (or the template itself).
    #[error("failed to read '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse build template: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize the template.
    #[error("failed to serialize build template: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The account file is not a usable service-account key.
    #[error("invalid account file '{path}': {reason}")]
    Account { path: String, reason: String },

    /// One or more validation problems.
    #[error("invalid build template:\n{}", format_problems(.0))]
    Validation(Vec<String>),
}

impl ConfigError {
    /// Validation problems, if this is a validation error.
    pub fn problems(&self) -> &[String] {
        match self {
            ConfigError::Validation(problems) => problems,
            _ => &[],
        }
    }
}

fn format_problems(problems: &[String]) -> String {
    problems
        .iter()
        .map(|p| format!("  * {p}"))
        .collect::<Vec<_>>()
        .join("\n")
}
