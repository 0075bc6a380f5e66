//! ext2 encoder (`xgenext2fs`)
//!
//! Block size is fixed at 4k and `--faketime` pins every timestamp, so the
//! same input always produces the same image.

use std::path::Path;

use crate::config::defaults::BLOCK_SIZE;
use crate::core::bytes::blocks;
use crate::core::version::extract_version;
use crate::error::ExecError;
use crate::infra::exec::{self, ExecOptions, ExecOutput};

/// Encoder binary
pub const COMMAND: &str = "xgenext2fs";

/// Supported encoder versions
pub const REQUIRED_VERSION: &str = "^1.5.6";

fn base_args(extra_size: u64) -> Vec<String> {
    vec![
        "--block-size".to_string(),
        BLOCK_SIZE.to_string(),
        "--faketime".to_string(),
        "--readjustment".to_string(),
        format!("+{}", blocks(extra_size, BLOCK_SIZE)),
    ]
}

/// Arguments encoding a directory tree
pub fn directory_args(extra_size: u64, input: &Path, output: &Path) -> Vec<String> {
    let mut args = base_args(extra_size);
    args.push("--root".to_string());
    args.push(input.display().to_string());
    args.push(output.display().to_string());
    args
}

/// Arguments encoding a tarball
pub fn tar_args(extra_size: u64, input: &Path, output: &Path) -> Vec<String> {
    let mut args = base_args(extra_size);
    args.push("--tarball".to_string());
    args.push(input.display().to_string());
    args.push(output.display().to_string());
    args
}

/// Arguments creating an empty filesystem of `size` bytes
pub fn empty_args(size: u64, output: &Path) -> Vec<String> {
    vec![
        "--block-size".to_string(),
        BLOCK_SIZE.to_string(),
        "--faketime".to_string(),
        "--size-in-blocks".to_string(),
        blocks(size, BLOCK_SIZE).to_string(),
        output.display().to_string(),
    ]
}

/// Encode a directory tree
pub async fn from_directory(
    extra_size: u64,
    input: &Path,
    output: &Path,
    options: &ExecOptions,
) -> Result<ExecOutput, ExecError> {
    exec::run(COMMAND, &directory_args(extra_size, input, output), options).await
}

/// Encode a tarball
pub async fn from_tar(
    extra_size: u64,
    input: &Path,
    output: &Path,
    options: &ExecOptions,
) -> Result<ExecOutput, ExecError> {
    exec::run(COMMAND, &tar_args(extra_size, input, output), options).await
}

/// Create an empty filesystem
pub async fn empty(size: u64, output: &Path, options: &ExecOptions) -> Result<ExecOutput, ExecError> {
    exec::run(COMMAND, &empty_args(size, output), options).await
}

/// Installed encoder version
pub async fn version(options: &ExecOptions) -> Option<semver::Version> {
    let output = exec::run(COMMAND, &["--version".to_string()], options)
        .await
        .ok()?;
    extract_version(&format!("{}{}", output.stdout, output.stderr))
}
