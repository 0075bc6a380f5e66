//! Error types for cartesi-build
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors raised while parsing `cartesi.toml`
///
/// Values are carried as rendered TOML text so the message names exactly
/// what the user wrote.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Unknown builder
    #[error("Invalid builder: {value}")]
    InvalidBuilder { value: String },

    /// Unknown drive format
    #[error("Invalid drive format: {value}")]
    InvalidDriveFormat { value: String },

    /// Unknown format for an empty drive
    #[error("Invalid empty drive format: {value}")]
    InvalidEmptyDriveFormat { value: String },

    /// Value is not a string
    #[error("Invalid string value: {value}")]
    InvalidString { value: String },

    /// Value is not a boolean
    #[error("Invalid boolean value: {value}")]
    InvalidBoolean { value: String },

    /// Value is not an integer
    #[error("Invalid number value: {value}")]
    InvalidNumber { value: String },

    /// Value is not a byte size
    #[error("Invalid bytes value: {value}")]
    InvalidBytes { value: String },

    /// Value is neither a string nor an array of strings
    #[error("Invalid string array: {value}")]
    InvalidStringArray { value: String },

    /// Required field missing
    #[error("Missing required field: {field}")]
    RequiredField { field: String },

    /// Drive selected on the command line is not configured
    #[error("Unknown drive: {name}")]
    UnknownDrive { name: String },

    /// `[machine]` is not a table
    #[error("Invalid machine configuration: {value}")]
    InvalidMachine { value: String },

    /// Text is not valid TOML
    #[error("Failed to parse configuration: {message}")]
    Syntax { message: String },

    /// Configuration file could not be read
    #[error("Failed to read configuration '{path}': {error}")]
    Read { path: PathBuf, error: String },
}

/// External command execution errors
#[derive(Error, Debug)]
pub enum ExecError {
    /// Binary absent and no toolchain image to fall back to
    #[error("Command '{command}' not found and no toolchain image configured")]
    CommandNotFound { command: String },

    /// Command could not be spawned for a reason other than absence
    #[error("Failed to execute '{command}': {error}")]
    Spawn { command: String, error: String },

    /// Command ran and exited unsuccessfully
    #[error("Command '{command}' failed with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    /// Redirection file could not be opened
    #[error("IO error for '{path}': {error}")]
    Io { path: PathBuf, error: String },
}

/// Drive build errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// Source directory, tarball or image file missing
    #[error("Drive '{drive}': source not found: {path}")]
    SourceNotFound { drive: String, path: PathBuf },

    /// Container image built or pulled for the wrong CPU
    #[error("Invalid image Architecture: {found}. Expected {expected}")]
    ArchitectureMismatch { found: String, expected: String },

    /// `docker image inspect` returned something unusable
    #[error("Failed to inspect image '{image}': {message}")]
    Inspect { image: String, message: String },

    /// Image label carries an invalid value
    #[error("Invalid {label} value: {value}")]
    InvalidLabel { label: String, value: String },

    /// External tool failure
    #[error("Drive '{drive}': {source}")]
    Exec {
        drive: String,
        #[source]
        source: ExecError,
    },

    /// Filesystem failure
    #[error("Drive '{drive}': IO error for '{path}': {error}")]
    Io {
        drive: String,
        path: PathBuf,
        error: String,
    },

    /// Copy, cleanup or write failure
    #[error("Drive '{drive}': {source}")]
    Filesystem {
        drive: String,
        #[source]
        source: FilesystemError,
    },
}

/// Machine composition errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MachineError {
    /// Neither the config nor the image provide an entrypoint
    #[error("Undefined machine entrypoint")]
    UndefinedEntrypoint,

    /// A drive file expected in the context directory is missing
    #[error("drive '{name}' not built, run 'cartesi-build build'")]
    DriveNotBuilt { name: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory or file
    #[error("Failed to remove '{path}': {error}")]
    Remove { path: PathBuf, error: String },

    /// Failed to copy
    #[error("Failed to copy '{from}' to '{to}': {error}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to change permissions
    #[error("Failed to set permissions on '{path}': {error}")]
    Permissions { path: PathBuf, error: String },

    /// Copy stopped because its owner was cancelled
    #[error("Copy into '{path}' cancelled")]
    Cancelled { path: PathBuf },
}

/// Top-level cartesi-build error type
#[derive(Error, Debug)]
pub enum CartesiBuildError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Build error
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Execution error
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    /// Machine error
    #[error("Machine error: {0}")]
    Machine(#[from] MachineError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),

    /// Operator interrupted the run
    #[error("Interrupted")]
    Interrupted,

    /// A drive task panicked or was cancelled
    #[error("Drive task '{drive}' did not complete: {message}")]
    Task { drive: String, message: String },
}
