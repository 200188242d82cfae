use super::ui;
use crate::core::converter::CurrencyConverter;
use crate::core::currency::Currency;
use anyhow::Result;
use comfy_table::{Cell, Table};

pub fn run(converter: &CurrencyConverter) -> Result<()> {
    let currencies = converter.list_currencies();
    if currencies.is_empty() {
        println!("No currencies configured. Add some under `currencies:` in the config file.");
        return Ok(());
    }
    println!("{}", currency_table(&currencies));
    println!(
        "{} {}",
        ui::style_text("Total currencies:", ui::StyleType::TotalLabel),
        ui::style_text(&currencies.len().to_string(), ui::StyleType::TotalValue)
    );
    Ok(())
}

pub fn currency_table(currencies: &[Currency]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell("Description"),
    ]);
    for currency in currencies {
        table.add_row(vec![
            Cell::new(&currency.code),
            Cell::new(&currency.name),
            Cell::new(&currency.description),
        ]);
    }
    table
}
