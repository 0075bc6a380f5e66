//! Core business logic module
//!
//! Configuration model, drive builders, machine composition and the build
//! orchestration tying them together. External processes and filesystem
//! helpers live in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`config`] - `cartesi.toml` parsing and validation
//! - [`bytes`] - Human-readable byte sizes
//! - [`image`] - Container image introspection
//! - [`builder`] - Drive builders (directory, docker, empty, tar, none)
//! - [`machine`] - `cartesi-machine` command line composition and boot
//! - [`orchestrator`] - Concurrent drive builds followed by the boot
//! - [`clean`] - Context directory cleanup
//! - [`doctor`] - Tool availability and version checks
//! - [`version`] - Version parsing for tools and images

pub mod builder;
pub mod bytes;
pub mod clean;
pub mod config;
pub mod doctor;
pub mod image;
pub mod machine;
pub mod orchestrator;
pub mod version;
