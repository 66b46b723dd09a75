use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use valutahub::log::init_logging;

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

impl From<Commands> for valutahub::AppCommand {
    fn from(cmd: Commands) -> valutahub::AppCommand {
        match cmd {
            Commands::Register { username, password } => {
                valutahub::AppCommand::Register { username, password }
            }
            Commands::Login { username, password } => {
                valutahub::AppCommand::Login { username, password }
            }
            Commands::Logout => valutahub::AppCommand::Logout,
            Commands::ShowPortfolio { base } => valutahub::AppCommand::ShowPortfolio { base },
            Commands::Buy { currency, amount } => {
                valutahub::AppCommand::Buy { currency, amount }
            }
            Commands::Sell { currency, amount } => {
                valutahub::AppCommand::Sell { currency, amount }
            }
            Commands::GetRate { from, to } => valutahub::AppCommand::GetRate { from, to },
            Commands::UpdateRates => valutahub::AppCommand::UpdateRates,
            Commands::ShowRates { currency, top } => {
                valutahub::AppCommand::ShowRates { currency, top }
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Register a new user (portfolio starts with 1000 USD)
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Log in and start a session
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// End the current session
    Logout,
    /// Show the portfolio valued in a base currency
    ShowPortfolio {
        /// Base currency for valuation (default from config)
        #[arg(long)]
        base: Option<String>,
    },
    /// Buy a currency against the USD wallet
    Buy {
        #[arg(long)]
        currency: String,
        #[arg(long)]
        amount: f64,
    },
    /// Sell a held currency back into USD
    Sell {
        #[arg(long)]
        currency: String,
        #[arg(long)]
        amount: f64,
    },
    /// Quote one currency in another (refreshes stale caches)
    GetRate {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Fetch fresh quotes from all configured sources
    UpdateRates,
    /// Show cached rates
    ShowRates {
        /// Only pairs involving this currency
        #[arg(long)]
        currency: Option<String>,
        /// Show only the N highest rates
        #[arg(long)]
        top: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials (EXCHANGERATE_API_KEY) may come from a .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => valutahub::cli::setup::setup(),
        Some(cmd) => valutahub::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    Ok(())
}
