//! Command-line argument parsing for the sessionkit CLI.
//!
//! This module handles parsing command-line arguments and determining
//! which CLI command to execute.

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Authenticate and persist the credential
    Login { identifier: String },
    /// End the session
    Logout,
    /// Restore and verify the stored session, then print the profile
    Whoami,
    /// Print a resource collection as JSON
    List { resource: String },
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Arguments did not form a command
    Invalid(String),
}

/// Usage text printed by `help` and after a parse error.
pub const USAGE: &str = "\
Usage: sessionkit <command>

Commands:
  login <identifier>   Sign in; the secret is read from the terminal
  logout               Sign out and clear the stored credential
  whoami               Verify the stored credential and print the profile
  list <resource>      Print a resource collection as JSON
  --version, -V        Print the version
  --help, -h           Print this message";

/// Parse command-line arguments and return the appropriate command.
///
/// # Arguments
///
/// * `args` - Iterator of command-line arguments (typically `std::env::args()`)
///
/// # Examples
///
/// ```
/// use sessionkit::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["sessionkit".to_string(), "list".to_string(), "venues".to_string()];
/// assert_eq!(
///     parse_args(args.into_iter()),
///     CliCommand::List { resource: "venues".to_string() }
/// );
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    // Skip the program name
    let mut args = args.skip(1);

    let Some(command) = args.next() else {
        return CliCommand::Help;
    };

    let parsed = match command.as_str() {
        "--version" | "-V" => CliCommand::Version,
        "--help" | "-h" | "help" => CliCommand::Help,
        "logout" => CliCommand::Logout,
        "whoami" => CliCommand::Whoami,
        "login" => match args.next() {
            Some(identifier) => CliCommand::Login { identifier },
            None => return CliCommand::Invalid("login needs an identifier".to_string()),
        },
        "list" => match args.next() {
            Some(resource) => CliCommand::List { resource },
            None => return CliCommand::Invalid("list needs a resource name".to_string()),
        },
        other => return CliCommand::Invalid(format!("unknown command '{}'", other)),
    };

    match args.next() {
        Some(extra) => CliCommand::Invalid(format!("unexpected argument '{}'", extra)),
        None => parsed,
    }
}
