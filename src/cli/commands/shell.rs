//! Shell command implementation
//!
//! Implements `cartesi-build shell`: boots the already built drives with an
//! interactive shell instead of the application entrypoint.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::machine::{boot, check_drives_built, shell_session};
use crate::core::orchestrator::{context_dir, load_config};

/// Execute the shell command
pub async fn execute(project_dir: &Path, command: &str, run_as_root: bool) -> Result<()> {
    let config = load_config(project_dir).context("Failed to load cartesi.toml")?;
    let destination = context_dir(project_dir);

    check_drives_built(&config, &destination)?;

    let (config, info) = shell_session(&config, command, run_as_root);
    boot(&config, Some(&info), &destination).await?;
    Ok(())
}
