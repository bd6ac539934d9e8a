//! The image artifact returned by a successful build.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use kiln_config::BuildConfig;
use kiln_types::Artifact;
use serde_json::Value;

use crate::driver::{Image, SharedDriver};
use crate::error::DriverError;

/// Identifier of this builder, reported by every artifact it produces.
pub const BUILDER_ID: &str = "kiln.googlecompute";

/// A captured machine image plus the handles needed to manage it.
pub struct ImageArtifact {
    image: Image,
    driver: SharedDriver,
    config: Arc<BuildConfig>,
}

impl ImageArtifact {
    pub fn new(image: Image, driver: SharedDriver, config: Arc<BuildConfig>) -> Self {
        Self {
            image,
            driver,
            config,
        }
    }
}

impl std::fmt::Debug for ImageArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageArtifact")
            .field("image", &self.image)
            .field("project_id", &self.driver.project_id())
            .field("zone", &self.config.zone)
            .finish()
    }
}

#[async_trait]
impl Artifact for ImageArtifact {
    fn builder_id(&self) -> &str {
        BUILDER_ID
    }

    fn files(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn id(&self) -> String {
        self.image.name.clone()
    }

    fn description(&self) -> String {
        format!("A disk image was created: {}", self.image.name)
    }

    fn state(&self, name: &str) -> Option<Value> {
        match name {
            "image_name" => Some(Value::String(self.image.name.clone())),
            "image_family" => self.image.family.clone().map(Value::String),
            "project_id" => Some(Value::String(self.image.project_id.clone())),
            "zone" => Some(Value::String(self.config.zone.clone())),
            "size_gb" => Some(Value::from(self.image.size_gb)),
            _ => None,
        }
    }

    async fn destroy(&self) -> kiln_types::Result<()> {
        tracing::info!(image = %self.image.name, "Destroying image artifact");
        self.driver
            .delete_image(&self.image.name)
            .await
            .map_err(|e| match e {
                DriverError::ImageNotFound(name) => kiln_types::Error::NotFound(name),
                other => kiln_types::Error::Internal(other.to_string()),
            })
    }
}
