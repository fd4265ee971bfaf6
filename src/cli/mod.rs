//! CLI module for sessionkit.
//!
//! This module provides the command-line front end:
//! - Argument parsing
//! - Version display
//! - Session and resource commands
//!
//! # Usage
//!
//! ```ignore
//! use sessionkit::cli::{needs_context, parse_args, run_cli_command, run_offline, CliContext};
//!
//! let command = parse_args(std::env::args());
//! if needs_context(&command) {
//!     let ctx = CliContext::new(&config, http, storage, ChangeBus::global());
//!     run_cli_command(command, &ctx).await?;
//! } else {
//!     run_offline(command)?;
//! }
//! ```

pub mod args;
pub mod commands;
pub mod version;

pub use args::{parse_args, CliCommand, USAGE};
pub use commands::CliContext;
pub use version::{version_line, VERSION};

use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;

/// Whether `command` talks to the gateway or storage.
pub fn needs_context(command: &CliCommand) -> bool {
    matches!(
        command,
        CliCommand::Login { .. } | CliCommand::Logout | CliCommand::Whoami | CliCommand::List { .. }
    )
}

/// Run a parsed command, printing to stdout.
pub async fn run_cli_command(command: CliCommand, ctx: &CliContext) -> Result<()> {
    let mut stdout = std::io::stdout();
    match command {
        CliCommand::Login { identifier } => {
            let secret = rpassword::prompt_password(format!("Secret for {}: ", identifier))
                .wrap_err("Failed to read the secret")?;
            commands::login(ctx, &identifier, &secret, &mut stdout).await
        }
        CliCommand::Logout => commands::logout(ctx, &mut stdout).await,
        CliCommand::Whoami => commands::whoami(ctx, &mut stdout).await,
        CliCommand::List { resource } => commands::list(ctx, &resource, &mut stdout).await,
        other => run_offline(other),
    }
}

/// Run a command that needs neither the gateway nor storage.
pub fn run_offline(command: CliCommand) -> Result<()> {
    match command {
        CliCommand::Version => println!("{}", version_line()),
        CliCommand::Help => println!("{}", USAGE),
        CliCommand::Invalid(reason) => bail!("{}\n\n{}", reason, USAGE),
        other => bail!("'{:?}' needs a session context", other),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_commands_need_no_context() {
        assert!(!needs_context(&CliCommand::Version));
        assert!(!needs_context(&CliCommand::Help));
        assert!(!needs_context(&CliCommand::Invalid("x".to_string())));
        assert!(needs_context(&CliCommand::Whoami));
    }

    #[test]
    fn test_run_offline() {
        assert!(run_offline(CliCommand::Version).is_ok());
        let err = run_offline(CliCommand::Invalid("unknown command 'x'".to_string())).unwrap_err();
        assert!(err.to_string().starts_with("unknown command 'x'"));
    }
}
