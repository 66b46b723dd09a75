pub mod cli;
pub mod config;
pub mod currency;
pub mod errors;
pub mod ledger;
pub mod log;
pub mod models;
pub mod providers;
pub mod rates;
pub mod repo;
pub mod store;

use anyhow::Result;
use tracing::debug;

/// Commands the application core handles. The binary maps its clap
/// subcommands onto this enum; tests can drive it directly.
#[derive(Debug, Clone)]
pub enum AppCommand {
    Register { username: String, password: String },
    Login { username: String, password: String },
    Logout,
    ShowPortfolio { base: Option<String> },
    Buy { currency: String, amount: f64 },
    Sell { currency: String, amount: f64 },
    GetRate { from: String, to: String },
    UpdateRates,
    ShowRates { currency: Option<String>, top: Option<usize> },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Register { username, password } => {
            cli::account::register(&config, &username, &password)
        }
        AppCommand::Login { username, password } => {
            cli::account::login(&config, &username, &password)
        }
        AppCommand::Logout => cli::account::logout(&config),
        AppCommand::ShowPortfolio { base } => {
            cli::portfolio::show_portfolio(&config, base.as_deref())
        }
        AppCommand::Buy { currency, amount } => cli::trade::buy(&config, &currency, amount),
        AppCommand::Sell { currency, amount } => cli::trade::sell(&config, &currency, amount),
        AppCommand::GetRate { from, to } => cli::rates::get_rate(&config, &from, &to).await,
        AppCommand::UpdateRates => cli::rates::update_rates(&config).await,
        AppCommand::ShowRates { currency, top } => {
            cli::rates::show_rates(&config, currency.as_deref(), top)
        }
    }
}
