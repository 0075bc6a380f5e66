//! Container engine (`docker`)
//!
//! Docker itself never falls back: these calls run on the host only.

use std::path::Path;

use crate::config::defaults::DOCKER_PLATFORM;
use crate::error::ExecError;
use crate::infra::exec::{self, ExecOptions, ExecOutput};

/// Container engine binary
pub const COMMAND: &str = "docker";

/// Options for `docker buildx build`
#[derive(Debug, Clone, Default)]
pub struct BuildOptions<'a> {
    /// Build context directory
    pub context: &'a str,
    /// Dockerfile path
    pub dockerfile: &'a str,
    /// Tags applied to the built image
    pub tags: &'a [String],
    /// Multi-stage target
    pub target: Option<&'a str>,
}

/// Arguments for building a riscv64 image, writing its id to `iidfile`
pub fn build_args(options: &BuildOptions<'_>, iidfile: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "buildx".into(),
        "build".into(),
        "--platform".into(),
        DOCKER_PLATFORM.into(),
        "--file".into(),
        options.dockerfile.into(),
        "--load".into(),
        "--iidfile".into(),
        iidfile.display().to_string(),
        options.context.into(),
    ];
    for tag in options.tags {
        args.push("--tag".into());
        args.push(tag.clone());
    }
    if let Some(target) = options.target {
        args.push("--target".into());
        args.push(target.into());
    }
    args
}

/// Build an image, streaming build output to the terminal
pub async fn build(
    options: &BuildOptions<'_>,
    iidfile: &Path,
    exec_options: &ExecOptions,
) -> Result<ExecOutput, ExecError> {
    let exec_options = exec_options.clone().inherit_stdio();
    exec::run(COMMAND, &build_args(options, iidfile), &exec_options).await
}

/// Pull an image
pub async fn pull(image: &str, options: &ExecOptions) -> Result<ExecOutput, ExecError> {
    let args = ["image", "pull", image].map(String::from);
    exec::run(COMMAND, &args, options).await
}

/// Raw `docker image inspect` JSON
pub async fn inspect(image: &str, options: &ExecOptions) -> Result<String, ExecError> {
    let args = ["image", "inspect", image].map(String::from);
    Ok(exec::run(COMMAND, &args, options).await?.stdout)
}

/// Save an image as an OCI tarball
pub async fn save(image: &str, output: &Path, options: &ExecOptions) -> Result<ExecOutput, ExecError> {
    let args = vec![
        "image".to_string(),
        "save".to_string(),
        image.to_string(),
        "-o".to_string(),
        output.display().to_string(),
    ];
    exec::run(COMMAND, &args, options).await
}

/// Installed engine version
pub async fn version(options: &ExecOptions) -> Option<semver::Version> {
    let args = ["version", "--format", "{{.Client.Version}}"].map(String::from);
    let output = exec::run(COMMAND, &args, options).await.ok()?;
    crate::core::version::extract_version(&output.stdout)
}
