//! OCI exporter (`crane export`)

use std::path::Path;

use crate::core::version::extract_version;
use crate::error::ExecError;
use crate::infra::exec::{self, ExecOptions, ExecOutput};

/// Exporter binary
pub const COMMAND: &str = "crane";

/// Supported exporter versions
pub const REQUIRED_VERSION: &str = "^0.19.1";

/// Flatten an OCI tarball (`input`) into a root filesystem tarball (`output`)
pub async fn export_image(
    input: &Path,
    output: &Path,
    options: &ExecOptions,
) -> Result<ExecOutput, ExecError> {
    let options = options.clone().with_stdin(input).with_stdout(output);
    let args = ["export", "-", "-"].map(String::from);
    exec::run(COMMAND, &args, &options).await
}

/// Installed exporter version
pub async fn version(options: &ExecOptions) -> Option<semver::Version> {
    let output = exec::run(COMMAND, &["version".to_string()], options)
        .await
        .ok()?;
    extract_version(&output.stdout)
}
