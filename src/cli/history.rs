use super::ui;
use crate::core::currency::ExchangeRate;
use crate::core::store::RateStore;
use anyhow::Result;
use comfy_table::{Cell, Color, Table};

pub async fn run(store: &dyn RateStore, base: &str, target: &str) -> Result<()> {
    let (base, target) = (base.to_uppercase(), target.to_uppercase());
    let history = store.find_rate_history(&base, &target).await?;
    if history.is_empty() {
        println!("No rates recorded for {base}/{target}.");
        return Ok(());
    }
    println!(
        "\n{}",
        ui::style_text(&format!("{base}/{target}"), ui::StyleType::Title)
    );
    println!("{}", history_table(&history));
    Ok(())
}

/// Oldest first, as returned by the store.
pub fn history_table(rates: &[ExchangeRate]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Timestamp"),
        ui::header_cell("Rate"),
        ui::header_cell("Status"),
        ui::header_cell("Job"),
    ]);
    for rate in rates {
        let status = Cell::new(rate.status.to_string());
        table.add_row(vec![
            Cell::new(ui::format_timestamp(rate.rate_timestamp)),
            ui::amount_cell(rate.rate),
            if rate.is_latest() {
                status.fg(Color::Green)
            } else {
                status.fg(Color::DarkGrey)
            },
            Cell::new(rate.job_execution_id),
        ]);
    }
    table
}
