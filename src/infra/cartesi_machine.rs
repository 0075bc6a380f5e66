//! Machine emulator (`cartesi-machine`)

use serde::Deserialize;

use crate::error::ExecError;
use crate::infra::exec::{self, ExecOptions, ExecOutput};

/// Emulator binary
pub const COMMAND: &str = "cartesi-machine";

/// Supported emulator versions
pub const REQUIRED_VERSION: &str = "^0.18.1";

#[derive(Debug, Deserialize)]
struct VersionJson {
    version: String,
}

/// Boot the machine with the composed arguments
pub async fn boot(args: &[String], options: &ExecOptions) -> Result<ExecOutput, ExecError> {
    exec::run(COMMAND, args, options).await
}

/// Installed emulator version, from `--version-json`
pub async fn version(options: &ExecOptions) -> Option<semver::Version> {
    let output = exec::run(COMMAND, &["--version-json".to_string()], options)
        .await
        .ok()?;
    parse_version_json(&output.stdout)
}

fn parse_version_json(stdout: &str) -> Option<semver::Version> {
    let parsed: VersionJson = serde_json::from_str(stdout).ok()?;
    semver::Version::parse(&parsed.version).ok()
}
