//! envsync CLI entry point.

use clap::Parser;

use envsync::cli::args::Cli;
use envsync::cli::commands;
use envsync::error::{ConfigError, CryptoError, Error, SessionError};

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_level(true)
            .init();
    }

    if let Err(e) = commands::execute(cli.command) {
        envsync::cli::output::error(&e.to_string());
        if let Some(hint) = e.hint() {
            envsync::cli::output::hint(hint);
        }
        std::process::exit(exit_code(&e));
    }
}

/// Distinct non-zero exit codes for the handful of errors scripts are
/// most likely to branch on; everything else exits `1`.
fn exit_code(e: &Error) -> i32 {
    match e {
        Error::Config(ConfigError::NotInitialized) => 2,
        Error::Crypto(CryptoError::BadPhrase) => 3,
        Error::Session(SessionError::SessionMissing) | Error::Session(SessionError::SessionExpired) => 4,
        Error::Rbac(_) => 5,
        _ => 1,
    }
}
