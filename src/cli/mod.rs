//! Command-line interface
//!
//! Parses `cartesi-build [global flags] <build|shell|clean|doctor>` and hands
//! the project directory to the matching command in [`commands`]. Drive
//! builds and machine boots happen in [`crate::core`]; [`output`] owns what
//! reaches the terminal.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use commands::Commands;
use output::OutputConfig;

/// cartesi-build - Cartesi machine drive builder
///
/// Build the drives declared in cartesi.toml and boot a machine snapshot.
#[derive(Parser, Debug)]
#[command(name = "cartesi-build")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true, arg_required_else_help = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Project directory holding cartesi.toml (defaults to the current one)
    #[arg(short = 'C', long = "project-dir", value_name = "DIR", global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Output settings selected by the global flags
    pub fn output(&self) -> OutputConfig {
        OutputConfig::new(self.quiet, self.json, self.verbose)
    }

    /// Directory the command operates on
    pub fn project_dir(&self) -> Result<PathBuf> {
        match &self.project_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("Failed to read the current directory"),
        }
    }

    /// Execute the selected command
    pub async fn run(self) -> Result<()> {
        let project_dir = self.project_dir()?;
        self.command.run(&project_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["cartesi-build", "build", "-vv", "--json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        assert_eq!(cli.output().log_level(), "debug");
    }

    #[test]
    fn test_project_dir() {
        let cli = Cli::try_parse_from(["cartesi-build", "-C", "/srv/dapp", "clean"]).unwrap();
        assert_eq!(cli.project_dir().unwrap(), PathBuf::from("/srv/dapp"));

        let cli = Cli::try_parse_from(["cartesi-build", "clean"]).unwrap();
        assert_eq!(
            cli.project_dir().unwrap(),
            std::env::current_dir().unwrap()
        );
    }

    #[test]
    fn test_build_drive_selection() {
        let cli =
            Cli::try_parse_from(["cartesi-build", "build", "-d", "root", "--drive", "data"])
                .unwrap();
        match cli.command {
            Commands::Build { drives, .. } => assert_eq!(drives, vec!["root", "data"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["cartesi-build"]).is_err());
    }
}
