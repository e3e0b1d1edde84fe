//! Records flowing through the pipeline.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A single marketplace transaction extracted from the input batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub date: NaiveDateTime,
    pub project_id: String,
    pub currency_symbol: String,
    pub amount: Amount,
}

/// Raw token amount as written in the batch.
///
/// Values within `Decimal` range stay exact. Raw on-chain amounts can be far
/// larger (18-decimal token units), those are kept as `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Amount {
    Exact(Decimal),
    Approx(f64),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("'{0}' is not a number")]
pub struct InvalidAmount(String);

impl Amount {
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Amount::Exact(value) => value.to_f64(),
            Amount::Approx(value) => Some(*value),
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Amount::Exact(value) => *value < Decimal::ZERO,
            Amount::Approx(value) => *value < 0.0,
        }
    }
}

impl FromStr for Amount {
    type Err = InvalidAmount;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(value) = Decimal::from_str(s).or_else(|_| Decimal::from_scientific(s)) {
            return Ok(Amount::Exact(value));
        }
        match s.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Amount::Approx(value)),
            _ => Err(InvalidAmount(s.to_string())),
        }
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::Exact(value)
    }
}

impl PartialEq<Decimal> for Amount {
    fn eq(&self, other: &Decimal) -> bool {
        matches!(self, Amount::Exact(value) if value == other)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Exact(value) => write!(f, "{value}"),
            Amount::Approx(value) => write!(f, "{value}"),
        }
    }
}

impl Transaction {
    /// Calendar day the transaction belongs to.
    pub fn day(&self) -> NaiveDate {
        self.date.date()
    }
}

/// Aggregated volume for a single day and project.
///
/// Serializes with the column names of the analytical store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceAggregate {
    #[serde(rename = "date")]
    pub day: String,
    pub project_id: String,
    #[serde(rename = "num_transactions")]
    pub transaction_count: u64,
    pub total_volume_usd: f64,
}
