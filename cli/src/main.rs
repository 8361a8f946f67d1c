mod conf;
mod display;
mod error;
mod network;
mod prelude;

use crate::prelude::*;

#[derive(Parser)]
#[command(version, about = "Subnet CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Print machine readable JSON instead of progress and tables.
    #[arg(long = "json", global = true)]
    json: bool,
    /// Log orchestrator progress.
    #[arg(long = "verbose", short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    #[command(subcommand, about = "Manage the local network")]
    Network(network::NetworkCommand),
    #[command(about = "Show or update the Subnet CLI configuration")]
    Conf(conf::ConfCommand),
}

#[tokio::main]
async fn main() {
    // Customize parsing error handling.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // These 2 are "not real errors" that are used to stop the execution
            // to display the CLI help or version.
            match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    println!("{}", e);

                    std::process::exit(0);
                }
                _ => (),
            }

            eprintln!(
                "{ballot} {error}",
                ballot = "✘".red().bold(),
                error = CliError::SyntaxError(e)
            );

            std::process::exit(1);
        }
    };

    JSON_MODE.store(cli.json, Ordering::Relaxed);

    let level = if cli.verbose { "info" } else { "warn" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Send each sub-command to the respective handler.
    let result = match cli.command {
        Command::Network(network) => network::handle(network).await,
        Command::Conf(conf) => conf::handle(conf).await,
    };

    // Handle any errors that occurred during command execution.
    if let Err(e) = result {
        eprintln!("{ballot} {e}", ballot = "✘".red().bold());

        std::process::exit(1);
    }
}
