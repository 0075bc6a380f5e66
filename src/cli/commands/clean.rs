//! CLI implementation for `cartesi-build clean` command

use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::output::{print_detail, print_success};
use crate::core::clean::{clean_context, has_build_artifacts};
use crate::core::orchestrator::context_dir;

/// Execute the clean command
pub async fn execute(project_dir: &Path) -> Result<()> {
    let context = context_dir(project_dir);

    if !has_build_artifacts(&context) {
        print_success("Nothing to clean");
        return Ok(());
    }

    let result = clean_context(&context).with_context(|| "Failed to clean build artifacts")?;

    print_success("Cleaned build artifacts:");
    for entry in &result.removed {
        print_detail(&format!("Removed {entry}"));
    }

    Ok(())
}
