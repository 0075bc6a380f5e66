//! Infrastructure layer
//!
//! Handles all I/O operations: external processes and the filesystem.
//! Each external tool gets a thin wrapper that owns its argument vector.

pub mod cartesi_machine;
pub mod crane;
pub mod docker;
pub mod exec;
pub mod filesystem;
pub mod genext2fs;
pub mod mksquashfs;
