//! State keys shared by the build steps.
//!
//! The builder seeds the collaborator keys before the run; every other key
//! is written by the step named next to it.

use std::sync::Arc;

use kiln_config::BuildConfig;
use kiln_engine::StateKey;
use kiln_types::{Communicator, KeyPair, SharedHook, SharedSession, SharedUi};

use crate::driver::{Image, SharedDriver};

// ── Seeded by the builder ────────────────────────────────────────────────────

pub const CONFIG: StateKey<Arc<BuildConfig>> = StateKey::new("config");
pub const DRIVER: StateKey<SharedDriver> = StateKey::new("driver");
pub const HOOK: StateKey<SharedHook> = StateKey::new("hook");
pub const UI: StateKey<SharedUi> = StateKey::new("ui");
pub const COMMUNICATOR: StateKey<Arc<dyn Communicator>> = StateKey::new("communicator");

// ── Written by steps ─────────────────────────────────────────────────────────

/// create_ssh_key
pub const SSH_KEY_PAIR: StateKey<KeyPair> = StateKey::new("ssh_key_pair");

/// create_instance; removed by teardown_instance once the instance is gone.
pub const INSTANCE_NAME: StateKey<String> = StateKey::new("instance_name");

/// create_instance; removed once the disk is deleted.
pub const DISK_NAME: StateKey<String> = StateKey::new("disk_name");

/// create_windows_password
pub const WINDOWS_PASSWORD: StateKey<String> = StateKey::new("windows_password");

/// instance_info
pub const INSTANCE_IP: StateKey<String> = StateKey::new("instance_ip");

/// connect
pub const SESSION: StateKey<SharedSession> = StateKey::new("session");

/// create_image
pub const IMAGE: StateKey<Image> = StateKey::new("image");
