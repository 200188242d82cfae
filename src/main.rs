use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use ratesync::core::log::init_logging;
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for ratesync::AppCommand {
    fn from(cmd: Commands) -> ratesync::AppCommand {
        match cmd {
            Commands::Serve => ratesync::AppCommand::Serve,
            Commands::Refresh => ratesync::AppCommand::Refresh,
            Commands::Convert { amount, from, to } => {
                ratesync::AppCommand::Convert { amount, from, to }
            }
            Commands::ConvertAll { amount, from } => {
                ratesync::AppCommand::ConvertAll { amount, from }
            }
            Commands::Currencies => ratesync::AppCommand::Currencies,
            Commands::Jobs { limit } => ratesync::AppCommand::Jobs { limit },
            Commands::History { base, target } => ratesync::AppCommand::History { base, target },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Refresh on startup and then every hour until interrupted
    Serve,
    /// Refresh stale exchange rates now
    Refresh,
    /// Convert an amount between two currencies
    Convert {
        amount: Decimal,
        from: String,
        to: String,
    },
    /// Convert an amount into every currency with a known rate
    ConvertAll { amount: Decimal, from: String },
    /// List known currencies
    Currencies,
    /// Show recent refresh runs
    Jobs {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Show every stored rate for a currency pair
    History { base: String, target: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => ratesync::cli::setup::setup_at_path(path),
            None => ratesync::cli::setup::setup(),
        },
        Some(cmd) => ratesync::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
