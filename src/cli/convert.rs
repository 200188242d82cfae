use super::ui;
use crate::core::converter::{ConversionRequest, ConversionResult, CurrencyConverter};
use anyhow::Result;
use comfy_table::Table;
use rust_decimal::Decimal;

/// Prints `amount` of `from` in `to`, or in every currency with a rate when `to` is `None`.
pub fn run(
    converter: &CurrencyConverter,
    amount: Decimal,
    from: &str,
    to: Option<&str>,
) -> Result<()> {
    let request = ConversionRequest::new(from, amount, to);
    let result = match to {
        Some(_) => converter.convert(&request)?,
        None => converter.convert_to_all(&request)?,
    };

    let source = &result.from_currency;
    println!(
        "\n{} {}",
        ui::style_text(
            &format!("{} {}", result.amount.normalize(), source.code),
            ui::StyleType::Title
        ),
        ui::style_text(&format!("({})", source.name), ui::StyleType::Subtle)
    );
    if result.currency_values.is_empty() {
        println!("No exchange rates available for {}.", source.code);
        return Ok(());
    }
    println!("{}", conversion_table(&result));
    Ok(())
}

pub fn conversion_table(result: &ConversionResult) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Currency"),
        ui::header_cell("Value"),
        ui::header_cell("Last Updated"),
    ]);
    for value in result.currency_values.values() {
        table.add_row(vec![
            comfy_table::Cell::new(&value.code),
            comfy_table::Cell::new(&value.name),
            ui::amount_cell(value.value),
            ui::timestamp_cell(value.last_updated),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::RateCache;
    use crate::core::currency::{Currency, ExchangeRate};
    use crate::core::store::RateStore;
    use crate::store::memory::MemoryRateStore;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn converter() -> CurrencyConverter {
        let store = Arc::new(MemoryRateStore::with_currencies(vec![
            Currency::new("USD", "US Dollar", ""),
            Currency::new("INR", "Indian Rupee", ""),
        ]));
        store
            .save_exchange_rates(&[ExchangeRate::latest("USD", "INR", dec!(83.25), Utc::now(), 1)])
            .await
            .unwrap();
        let cache = Arc::new(RateCache::new(store));
        cache.reload().await.unwrap();
        CurrencyConverter::new(cache)
    }

    #[tokio::test]
    async fn test_conversion_table_lists_targets() {
        let converter = converter().await;
        let result = converter
            .convert_to_all(&ConversionRequest::new("USD", dec!(2), None))
            .unwrap();
        let rendered = conversion_table(&result).to_string();
        assert!(rendered.contains("Indian Rupee"));
        assert!(rendered.contains("166.5"));
        assert!(rendered.contains("US Dollar"));
    }

    #[tokio::test]
    async fn test_unknown_currency_is_an_error() {
        let converter = converter().await;
        let err = run(&converter, dec!(1), "USD", Some("ABC")).unwrap_err();
        assert_eq!(err.to_string(), "Currency not found: ABC");
    }
}
