//! Lume CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Configuration error
//! - 5: Infrastructure error

use std::process::ExitCode;

use clap::Parser;
use lume_config::ConfigError;
use lume_iac::IacError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CONFIG_ERROR: u8 = 3;
    pub const IAC_ERROR: u8 = 5;
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Synth(args) => commands::synth::execute(args),
        Commands::List(args) => commands::list::execute(args),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// `RUST_LOG` wins when set; otherwise our crates log at the level the
/// flags ask for and everything else at warn.
fn init_logging(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_directive(verbose, quiet)));

    // A subscriber may already be installed; keep it.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init();
}

fn log_directive(verbose: bool, quiet: bool) -> String {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    format!("lume={},warn", level)
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if e.chain().any(|cause| cause.downcast_ref::<ConfigError>().is_some()) {
        return ExitCodes::CONFIG_ERROR;
    }
    if e.chain().any(|cause| cause.downcast_ref::<IacError>().is_some()) {
        return ExitCodes::IAC_ERROR;
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("argument") || msg.contains("option") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use std::path::PathBuf;

    #[test]
    fn test_config_errors_map_to_config_exit_code() {
        let err: anyhow::Result<()> = Err(ConfigError::NotFound(PathBuf::from("config.yaml")))
            .context("Failed to load configuration");
        assert_eq!(categorize_error(&err.unwrap_err()), ExitCodes::CONFIG_ERROR);
    }

    #[test]
    fn test_iac_errors_map_to_iac_exit_code() {
        let err: anyhow::Result<()> =
            Err(IacError::DuplicateStack("SiteStack".into())).context("Failed to add stack");
        assert_eq!(categorize_error(&err.unwrap_err()), ExitCodes::IAC_ERROR);
    }

    #[test]
    fn test_log_directive_follows_flags() {
        assert_eq!(log_directive(false, false), "lume=info,warn");
        assert_eq!(log_directive(true, false), "lume=debug,warn");
        assert_eq!(log_directive(false, true), "lume=error,warn");
        assert_eq!(log_directive(true, true), "lume=debug,warn");
    }

    #[test]
    fn test_logging_can_be_initialized_twice() {
        init_logging(false, false);
        init_logging(true, false);
    }

    #[test]
    fn test_other_errors() {
        assert_eq!(
            categorize_error(&anyhow::anyhow!("invalid argument: --environment")),
            ExitCodes::INVALID_ARGS
        );
        assert_eq!(
            categorize_error(&anyhow::anyhow!("disk full")),
            ExitCodes::GENERAL_ERROR
        );
    }
}
