use crate::core::error::{PipelineError, Result};
use crate::core::price::PriceQuote;
use crate::core::transaction::{MarketplaceAggregate, Transaction};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::info;

pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Groups transactions by (day, project) and sums their USD volume.
///
/// The returned rows are in no particular order.
pub fn aggregate_transactions(
    transactions: &[Transaction],
    quote: &PriceQuote,
) -> Result<Vec<MarketplaceAggregate>> {
    if transactions.is_empty() {
        return Err(PipelineError::EmptyInput(
            "no transactions to aggregate".to_string(),
        ));
    }

    let mut aggregated: HashMap<(NaiveDate, &str), MarketplaceAggregate> = HashMap::new();
    for txn in transactions {
        let unit_price = quote
            .get(&txn.currency_symbol)
            .filter(|price| *price != 0.0)
            .ok_or_else(|| {
                PipelineError::Aggregation(format!("no price found for {}", txn.currency_symbol))
            })?;
        let amount = txn.amount.to_f64().ok_or_else(|| {
            PipelineError::Aggregation(format!("amount {} is not representable", txn.amount))
        })?;

        let day = txn.day();
        let agg = aggregated
            .entry((day, txn.project_id.as_str()))
            .or_insert_with(|| MarketplaceAggregate {
                day: day.format(DAY_FORMAT).to_string(),
                project_id: txn.project_id.clone(),
                transaction_count: 0,
                total_volume_usd: 0.0,
            });
        agg.transaction_count += 1;
        agg.total_volume_usd += amount * unit_price;
    }

    info!(
        transactions = transactions.len(),
        aggregates = aggregated.len(),
        "Aggregated transactions"
    );
    Ok(aggregated.into_values().collect())
}
