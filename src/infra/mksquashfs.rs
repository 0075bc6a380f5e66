//! squashfs encoder (`mksquashfs`)

use std::path::Path;

use crate::config::defaults::SQUASHFS_COMPRESSION;
use crate::core::version::extract_version;
use crate::error::ExecError;
use crate::infra::exec::{self, ExecOptions, ExecOutput};

/// Encoder binary
pub const COMMAND: &str = "mksquashfs";

/// Supported encoder versions
pub const REQUIRED_VERSION: &str = "^4.5.1";

fn base_args() -> Vec<String> {
    [
        "-all-time",
        "0",
        "-all-root",
        "-noappend",
        "-comp",
        SQUASHFS_COMPRESSION,
        "-no-progress",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// Arguments encoding a directory tree
pub fn directory_args(input: &Path, output: &Path) -> Vec<String> {
    let mut args = vec![input.display().to_string(), output.display().to_string()];
    args.extend(base_args());
    args
}

/// Arguments encoding a tarball read from stdin
pub fn tar_args(output: &Path) -> Vec<String> {
    let mut args = vec![
        "-".to_string(),
        output.display().to_string(),
        "-tar".to_string(),
    ];
    args.extend(base_args());
    args
}

/// Encode a directory tree
pub async fn from_directory(
    input: &Path,
    output: &Path,
    options: &ExecOptions,
) -> Result<ExecOutput, ExecError> {
    exec::run(COMMAND, &directory_args(input, output), options).await
}

/// Encode a tarball, streamed through stdin
pub async fn from_tar(
    input: &Path,
    output: &Path,
    options: &ExecOptions,
) -> Result<ExecOutput, ExecError> {
    let options = options.clone().with_stdin(input);
    exec::run(COMMAND, &tar_args(output), &options).await
}

/// Installed encoder version
pub async fn version(options: &ExecOptions) -> Option<semver::Version> {
    let output = exec::run(COMMAND, &["-version".to_string()], options)
        .await
        .ok()?;
    extract_version(&output.stdout)
}
