//! cartesi-build - Cartesi machine drive builder
//!
//! Turns a declarative `cartesi.toml` (named drives, machine boot parameters
//! and a toolchain image) into one filesystem image per drive, then boots
//! `cartesi-machine` once to store a snapshot.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Configuration model, drive builders, machine composition
//! - [`infra`] - External tools, container fallback and filesystem helpers
//! - [`config`] - Constants and defaults
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
