use anyhow::Result;

use super::{open_repo, require_session};
use crate::config::AppConfig;
use crate::currency::CurrencyCode;
use crate::ledger::{Ledger, TradeReceipt};
use crate::rates::RatesStore;

fn print_receipt(action: &str, receipt: &TradeReceipt, usd_label: &str) {
    println!(
        "{action}: {:.4} {} at {:.2} USD/{}",
        receipt.amount, receipt.currency, receipt.rate, receipt.currency
    );
    println!("Portfolio changes:");
    println!(
        "  - {}: now {:.8}",
        receipt.currency, receipt.currency_balance
    );
    println!("  - USD: now {:.2}", receipt.usd_balance);
    println!("{usd_label}: {:.2} USD", receipt.usd_value);
}

pub fn buy(config: &AppConfig, currency: &str, amount: f64) -> Result<()> {
    let repo = open_repo(config)?;
    let session = require_session(&repo)?;
    let code = CurrencyCode::new(currency)?;

    let cache = RatesStore::new(&config.data_dir()?).load_cache()?;
    let mut ledger = Ledger::open(&repo)?;
    let receipt = ledger.buy(session.user_id, &code, amount, &cache)?;

    print_receipt("Buy executed", &receipt, "Estimated cost");
    Ok(())
}

pub fn sell(config: &AppConfig, currency: &str, amount: f64) -> Result<()> {
    let repo = open_repo(config)?;
    let session = require_session(&repo)?;
    let code = CurrencyCode::new(currency)?;

    let cache = RatesStore::new(&config.data_dir()?).load_cache()?;
    let mut ledger = Ledger::open(&repo)?;
    let receipt = ledger.sell(session.user_id, &code, amount, &cache)?;

    print_receipt("Sell executed", &receipt, "Estimated proceeds");
    Ok(())
}
