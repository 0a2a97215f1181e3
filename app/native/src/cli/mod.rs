//! CLI module for Casement.
//!
//! Parses arguments, loads the configuration, sets up logging and runs the
//! requested command against an in-process window manager.

mod commands;
mod output;

use clap::Parser;
pub use commands::Cli;
use tracing_subscriber::EnvFilter;

use crate::config;
use crate::error::WmError;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr so JSON on
/// stdout stays parseable.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Runs the CLI.
///
/// Parses command-line arguments and executes the appropriate command.
///
/// # Errors
///
/// Returns an error if the configuration path is missing or the command fails.
pub fn run() -> Result<(), WmError> {
    let cli = Cli::parse();
    cli.apply_config_path()?;

    let config = config::init();
    init_tracing(&config.logging.level);
    if let Some(path) = config::get_config_path() {
        tracing::debug!(path = %path.display(), "using configuration file");
    }

    cli.execute()
}
