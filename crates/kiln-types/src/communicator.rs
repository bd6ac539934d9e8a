//! Remote-login communicator interface.
//!
//! A [`Communicator`] turns a host plus credentials into a live
//! [`RemoteSession`] (SSH or WinRM). The transport itself lives outside the
//! builder; the connect step only needs these traits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Shared reference to an established session.
pub type SharedSession = Arc<dyn RemoteSession>;

/// A freshly generated SSH key pair.
#[derive(Clone)]
pub struct KeyPair {
    /// PEM-encoded private key.
    pub private_key: String,
    /// Public key in `authorized_keys` format.
    pub public_key: String,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Credentials used to log in to an instance.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Key-based SSH login.
    Ssh {
        username: String,
        private_key: String,
    },
    /// Password-based WinRM login.
    WinRm { username: String, password: String },
}

impl Credentials {
    /// The login user name.
    pub fn username(&self) -> &str {
        match self {
            Credentials::Ssh { username, .. } | Credentials::WinRm { username, .. } => username,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Ssh { username, .. } => f
                .debug_struct("Ssh")
                .field("username", username)
                .field("private_key", &"<redacted>")
                .finish(),
            Credentials::WinRm { username, .. } => f
                .debug_struct("WinRm")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
}

/// Output from a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code (0 = success).
    pub exit_code: i32,
}

impl CommandOutput {
    /// Create a new command output.
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// An established login session on an instance.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Host this session is connected to.
    fn host(&self) -> &str;

    /// Run a command and wait for it to finish.
    async fn execute(&self, command: &str) -> Result<CommandOutput>;

    /// Close the session. Closing twice is a no-op.
    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

/// Establishes remote sessions.
#[async_trait]
pub trait Communicator: Send + Sync {
    /// Short name of the transport ("ssh", "winrm").
    fn name(&self) -> &str;

    /// Generate a temporary key pair for key-based login.
    fn generate_key_pair(&self) -> Result<KeyPair>;

    /// Connect to `target`.
    async fn connect(&self, target: &ConnectTarget) -> Result<SharedSession>;
}
