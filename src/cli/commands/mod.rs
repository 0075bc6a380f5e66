//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod clean;
pub mod doctor;
pub mod shell;

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;

use crate::config::defaults::DEFAULT_SHELL;
use crate::core::orchestrator::BuildOptions;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the drives and store the machine snapshot
    Build {
        /// Stop after building the drives
        #[arg(long)]
        skip_snapshot: bool,

        /// Build only this drive (repeatable, implies --skip-snapshot)
        #[arg(short, long = "drive", value_name = "NAME")]
        drives: Vec<String>,

        /// Run every tool inside the SDK image, even when installed locally
        #[arg(long)]
        force_docker: bool,
    },

    /// Boot the built drives with an interactive shell
    Shell {
        /// Shell command to run
        #[arg(long, default_value = DEFAULT_SHELL)]
        command: String,

        /// Run the shell as the root user
        #[arg(long)]
        run_as_root: bool,
    },

    /// Remove build artifacts
    Clean,

    /// Check system dependencies
    Doctor,
}

impl Commands {
    /// Execute the command against `project_dir`
    pub async fn run(self, project_dir: &Path) -> Result<()> {
        match self {
            Self::Build {
                skip_snapshot,
                drives,
                force_docker,
            } => {
                let options = BuildOptions {
                    skip_snapshot,
                    drives,
                    force_docker,
                };
                build::execute(project_dir, options).await
            }
            Self::Shell {
                command,
                run_as_root,
            } => shell::execute(project_dir, &command, run_as_root).await,
            Self::Clean => clean::execute(project_dir).await,
            Self::Doctor => doctor::execute(Some(project_dir)).await,
        }
    }
}
