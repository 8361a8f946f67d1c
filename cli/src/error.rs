use {
    crate::{display::*, prelude::*},
    subnet_sdk::localnet::LocalnetError,
    thiserror::Error,
};

/// Custom error definitions for the Subnet CLI. Takes care of displaying
/// a pretty summary in the console.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error(
        "{error}{separator}\n{0}",
        error = "Syntax Error".red().bold(),
        separator = separator()
    )]
    SyntaxError(clap::error::Error),
    #[error(
        "{error}{separator}\n{0}",
        error = "IO Error".red().bold(),
        separator = separator()
    )]
    IoError(std::io::Error),
    #[error(
        "{error}{separator}\n{0}",
        error = "Local Network Error".red().bold(),
        separator = separator()
    )]
    Localnet(#[from] LocalnetError),
    #[error(
        "{error}{separator}\n{0:#}",
        error = "Error".red().bold(),
        separator = separator()
    )]
    Any(anyhow::Error),
}
