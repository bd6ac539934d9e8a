//! Google Compute Engine image builder for Kiln.
//!
//! Assembles the build lifecycle out of [`kiln_engine`] steps:
//!
//! ```text
//! Builder::prepare(template)          validate, fill defaults
//!     │
//! Builder::run(collaborators)
//!     ├── DriverFactory::connect      fatal before any step on failure
//!     ├── planner::plan(config)       ordered Vec<Box<dyn Step>>
//!     ├── StepRunner::run(state)      halt, reverse cleanup, cancel
//!     └── extraction                  error → image → cancelled → dry run
//! ```
//!
//! The real Compute API lives behind [`Driver`]; [`memory`] provides an
//! in-process implementation used by the tests and by `kiln build`.

pub mod artifact;
pub mod builder;
pub mod driver;
pub mod error;
pub mod keys;
pub mod memory;
pub mod planner;
pub mod steps;

pub use artifact::{BUILDER_ID, ImageArtifact};
pub use builder::{Builder, Collaborators};
pub use driver::{
    Driver, DriverFactory, Image, ImageRequest, InstanceConfig, InstanceStatus, SharedDriver,
    SourceImage, wait_for_instance, wait_until,
};
pub use error::{BuildError, DriverError, DriverResult, Result};
pub use memory::{MemoryCommunicator, MemoryDriver, MemoryDriverFactory, Operation};
pub use planner::{plan, plan_names};
