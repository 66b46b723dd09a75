use anyhow::Result;
use comfy_table::Cell;

use super::ui;
use crate::config::AppConfig;
use crate::currency::{get_currency, CurrencyCode};
use crate::providers::build_sources;
use crate::rates::{quote, RatesStore, RatesUpdater};

fn updater_for(config: &AppConfig) -> Result<RatesUpdater> {
    Ok(RatesUpdater::new(
        build_sources(config),
        RatesStore::new(&config.data_dir()?),
    ))
}

pub async fn get_rate(config: &AppConfig, from: &str, to: &str) -> Result<()> {
    let from = CurrencyCode::new(from)?;
    let to = CurrencyCode::new(to)?;
    let updater = updater_for(config)?;

    let resolved = quote(config, &updater, &from, &to).await?;
    println!(
        "Rate {from}->{to}: {:.8} (updated: {})",
        resolved.rate, resolved.updated_at
    );
    if resolved.rate != 0.0 {
        println!("Inverse rate {to}->{from}: {:.8}", 1.0 / resolved.rate);
    }
    println!(
        "{}",
        ui::style_text(
            &get_currency(&from)?.display_info(from.as_str()),
            ui::StyleType::Subtle
        )
    );
    Ok(())
}

pub async fn update_rates(config: &AppConfig) -> Result<()> {
    let updater = updater_for(config)?;

    let spinner = ui::new_spinner("Fetching quotes from all sources...");
    let summary = updater.run_update().await?;
    spinner.finish_and_clear();

    if !summary.errors.is_empty() {
        println!("Update completed with errors:");
        for error in &summary.errors {
            println!("  - {}", ui::style_text(error, ui::StyleType::Error));
        }
    }
    match summary.last_refresh {
        Some(last_refresh) => println!(
            "Updated {} rate(s). Last refresh: {last_refresh}",
            summary.total
        ),
        None => println!("No rates were fetched."),
    }
    Ok(())
}

/// The `--currency` filter selects pairs quoted FROM that code, not pairs
/// merely involving it: `BTC` matches `BTC_USD` but not `USD_BTC`.
fn base_matches(pair: &str, code: &str) -> bool {
    pair.split_once('_').is_some_and(|(base, _)| base == code)
}

pub fn show_rates(config: &AppConfig, currency: Option<&str>, top: Option<usize>) -> Result<()> {
    let cache = RatesStore::new(&config.data_dir()?).load_cache()?;

    if cache.pairs.is_empty() {
        println!("Rates cache is empty, run 'update-rates' to fetch quotes.");
        return Ok(());
    }

    let filter = currency
        .map(CurrencyCode::new)
        .transpose()?
        .map(|c| c.as_str().to_string());

    let mut pairs: Vec<_> = cache
        .pairs
        .iter()
        .filter(|(pair, _)| filter.as_deref().map_or(true, |code| base_matches(pair, code)))
        .collect();
    pairs.sort_by(|(_, a), (_, b)| b.rate.total_cmp(&a.rate));
    if let Some(top) = top {
        pairs.truncate(top);
    }

    if pairs.is_empty() {
        println!("No cached pairs match the filter.");
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Pair"),
        ui::header_cell("Rate"),
        ui::header_cell("Updated"),
        ui::header_cell("Source"),
    ]);
    for (pair, entry) in pairs {
        table.add_row(vec![
            Cell::new(pair),
            ui::value_cell(format!("{:.8}", entry.rate)),
            Cell::new(entry.updated_at.to_rfc3339()),
            Cell::new(&entry.source),
        ]);
    }
    println!("{table}");

    if let Some(last_refresh) = cache.last_refresh {
        println!(
            "{}",
            ui::style_text(&format!("Last refresh: {last_refresh}"), ui::StyleType::Subtle)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_filter_matches_the_base_side_only() {
        assert!(base_matches("BTC_USD", "BTC"));
        assert!(!base_matches("BTC_USD", "USD"));
        assert!(!base_matches("USD_BTC", "BTC"));
        assert!(!base_matches("BTCX_USD", "BTC"));
    }
}
