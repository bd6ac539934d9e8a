//! Build artifacts.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

/// The durable result of a successful build.
///
/// Once returned to the caller an artifact is never touched by the engine
/// again; `destroy` is the only way it reaches back into the cloud.
#[async_trait]
pub trait Artifact: Send + Sync {
    /// Identifier of the builder that produced this artifact.
    fn builder_id(&self) -> &str;

    /// Local files that are part of the artifact (empty for cloud images).
    fn files(&self) -> Vec<PathBuf>;

    /// Unique identifier of the artifact (e.g. the image name).
    fn id(&self) -> String;

    /// Human-readable description.
    fn description(&self) -> String;

    /// Named piece of builder-specific state, if known.
    fn state(&self, name: &str) -> Option<serde_json::Value>;

    /// Delete the underlying resource.
    async fn destroy(&self) -> Result<()>;
}
