use clap::{Args, Parser, Subcommand};
use provider_verify::error::AppError;

use crate::demo::{run_demo, run_roster_check, DemoArgs, RosterCheckArgs};
use crate::server;

#[derive(Parser, Debug)]
#[command(
    name = "Provider Verification Orchestrator",
    about = "Run and exercise the provider verification batch pipeline from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect roster CSV files without submitting them
    Roster {
        #[command(subcommand)]
        command: RosterCommand,
    },
    /// Submit a sample batch and poll it to completion in the terminal
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum RosterCommand {
    /// Parse a roster CSV and report what would be submitted
    Check(RosterCheckArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Roster {
            command: RosterCommand::Check(args),
        } => run_roster_check(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
