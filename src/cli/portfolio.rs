use anyhow::Result;
use comfy_table::Cell;

use super::{open_repo, require_session, ui};
use crate::config::AppConfig;
use crate::currency::CurrencyCode;
use crate::ledger::{Ledger, PortfolioView};
use crate::rates::RatesStore;

impl PortfolioView {
    pub fn display_as_table(&self) -> String {
        let base = self.base_currency.as_str();

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Currency"),
            ui::header_cell("Balance"),
            ui::header_cell(&format!("Rate ({base})")),
            ui::header_cell(&format!("Value ({base})")),
        ]);

        for row in &self.rows {
            table.add_row(vec![
                Cell::new(&row.code),
                ui::value_cell(format!("{:.8}", row.balance)),
                ui::format_optional_cell(row.rate, |r| format!("{r:.4}")),
                ui::format_optional_cell(row.converted, |v| format!("{v:.2}")),
            ]);
        }

        let mut output = format!(
            "Portfolio of '{}' (base: {base})\n\n",
            ui::style_text(&self.username, ui::StyleType::Title)
        );
        output.push_str(&table.to_string());
        output.push_str(&format!(
            "\n\nTotal ({}): {}",
            ui::style_text(base, ui::StyleType::TotalLabel),
            ui::style_text(&format!("{:.2}", self.total), ui::StyleType::TotalValue)
        ));
        output
    }
}

pub fn show_portfolio(config: &AppConfig, base: Option<&str>) -> Result<()> {
    let repo = open_repo(config)?;
    let session = require_session(&repo)?;

    let base = CurrencyCode::new(base.unwrap_or(&config.default_base_currency))?;
    let cache = RatesStore::new(&config.data_dir()?).load_cache()?;

    let ledger = Ledger::open(&repo)?;
    let view = ledger.portfolio_view(&session, &base, &cache)?;

    if view.rows.is_empty() {
        println!("No wallets yet. Buy a currency to create one.");
        return Ok(());
    }
    println!("{}", view.display_as_table());
    Ok(())
}
