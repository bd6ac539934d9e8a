//! Shared types for the Kiln image builder.
//!
//! The build engine treats the cloud driver, the remote-login communicator,
//! the provisioner hook and the UI as external collaborators. The traits
//! for the latter three live here so that `kiln-gce` (which drives them)
//! and the `kiln` binary (which supplies implementations) do not depend on
//! each other.

pub mod artifact;
pub mod communicator;
pub mod error;
pub mod hooks;
pub mod ui;

pub use artifact::Artifact;
pub use communicator::{
    CommandOutput, Communicator, ConnectTarget, Credentials, KeyPair, RemoteSession,
    SharedSession,
};
pub use error::{Error, Result};
pub use hooks::{InlineShellHook, NoopHook, ProvisionHook, SharedHook};
pub use ui::{BufferedUi, SharedUi, Ui, UiLevel, UiLine};
