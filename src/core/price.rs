//! Pricing abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

/// USD unit price per currency symbol for one batch.
///
/// Symbols are case-insensitive and stored uppercase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceQuote {
    prices: HashMap<String, f64>,
}

impl PriceQuote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: &str, price: f64) {
        self.prices.insert(canonical_symbol(symbol), price);
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.prices.get(&canonical_symbol(symbol)).copied()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.prices.contains_key(&canonical_symbol(symbol))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.prices.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: AsRef<str>> FromIterator<(S, f64)> for PriceQuote {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut quote = PriceQuote::new();
        for (symbol, price) in iter {
            quote.insert(symbol.as_ref(), price);
        }
        quote
    }
}

pub fn canonical_symbol(symbol: &str) -> String {
    symbol.to_uppercase()
}

/// Historical USD price source keyed by the provider's own token id.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_price(&self, token_id: &str, date: NaiveDate) -> Result<f64>;
}
