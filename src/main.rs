//! cartesi-build CLI
//!
//! Entry point for the cartesi-build command-line application.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cartesi_build::cli::output::display_error;
use cartesi_build::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output_config = cli.output();
    output_config.apply_global();

    // RUST_LOG wins over -v/-q
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(output_config.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}
