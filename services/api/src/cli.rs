use crate::admin::{
    run_check_domain, run_check_user_agent, run_import, DomainArgs, ImportArgs, UserAgentArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use portal_guard::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Portal Guard",
    about = "Trust and safety gatekeeping for the brokerage portal",
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
    /// Test a value against the local bot and domain lists
    Check {
        #[command(subcommand)]
        command: CheckCommand,
    },
    /// Manage registry entries
    Entries {
        #[command(subcommand)]
        command: EntriesCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CheckCommand {
    /// Check a User-Agent header against the blocked bot tokens and patterns
    UserAgent(UserAgentArgs),
    /// Check a URL against the blocked domain list
    Domain(DomainArgs),
}

#[derive(Subcommand, Debug)]
enum EntriesCommand {
    /// Bulk-create blacklist entries from a CSV export
    Import(ImportArgs),
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
        Command::Check {
            command: CheckCommand::UserAgent(args),
        } => run_check_user_agent(args),
        Command::Check {
            command: CheckCommand::Domain(args),
        } => run_check_domain(args),
        Command::Entries {
            command: EntriesCommand::Import(args),
        } => run_import(args).await,
    }
}
