//! Turns the raw CSV batch into typed transactions.
//!
//! The `props` and `nums` columns hold JSON-ish sub-documents which are not
//! guaranteed to parse, so the fields we need are pulled out with patterns.

use crate::core::error::{PipelineError, Result};
use crate::core::transaction::{Amount, Transaction};
use chrono::NaiveDateTime;
use regex::Regex;
use std::io::Read;
use std::sync::LazyLock;
use tracing::{debug, info};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TS_COLUMN: &str = "ts";
const PROJECT_ID_COLUMN: &str = "project_id";
const PROPS_COLUMN: &str = "props";
const NUMS_COLUMN: &str = "nums";

/// Compiled sub-document field patterns.
#[derive(Debug, Clone)]
pub struct ExtractPatterns {
    currency_symbol: Regex,
    currency_value_decimal: Regex,
}

static PATTERNS: LazyLock<Result<ExtractPatterns, regex::Error>> =
    LazyLock::new(ExtractPatterns::new);

impl ExtractPatterns {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(ExtractPatterns {
            currency_symbol: Regex::new(r#""currencySymbol":"([^"]+)""#)?,
            currency_value_decimal: Regex::new(r#""currencyValueDecimal":"([^"]+)""#)?,
        })
    }

    /// Process-wide patterns, compiled on first use.
    pub fn global() -> Result<&'static ExtractPatterns> {
        PATTERNS
            .as_ref()
            .map_err(|e| PipelineError::Pattern(e.clone()))
    }

    pub fn currency_symbol<'h>(&self, props: &'h str) -> Option<&'h str> {
        self.currency_symbol
            .captures(props)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    pub fn currency_value_decimal<'h>(&self, nums: &'h str) -> Option<&'h str> {
        self.currency_value_decimal
            .captures(nums)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    ts: usize,
    project_id: usize,
    props: usize,
    nums: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let (mut ts, mut project_id, mut props, mut nums) = (None, None, None, None);
        for (i, header) in headers.iter().enumerate() {
            let slot = match header {
                TS_COLUMN => &mut ts,
                PROJECT_ID_COLUMN => &mut project_id,
                PROPS_COLUMN => &mut props,
                NUMS_COLUMN => &mut nums,
                other => return Err(PipelineError::Schema(format!("unknown header: {other}"))),
            };
            if slot.replace(i).is_some() {
                return Err(PipelineError::Schema(format!("duplicate header: {header}")));
            }
        }

        let require = |index: Option<usize>, name: &str| {
            index.ok_or_else(|| PipelineError::Schema(format!("missing header: {name}")))
        };
        Ok(ColumnIndex {
            ts: require(ts, TS_COLUMN)?,
            project_id: require(project_id, PROJECT_ID_COLUMN)?,
            props: require(props, PROPS_COLUMN)?,
            nums: require(nums, NUMS_COLUMN)?,
        })
    }
}

pub struct Extractor<'a> {
    patterns: &'a ExtractPatterns,
}

impl Extractor<'static> {
    /// Extractor backed by the process-wide patterns.
    pub fn global() -> Result<Self> {
        Ok(Extractor::new(ExtractPatterns::global()?))
    }
}

impl<'a> Extractor<'a> {
    pub fn new(patterns: &'a ExtractPatterns) -> Self {
        Self { patterns }
    }

    /// Reads every row of `reader`, failing on the first malformed one.
    pub fn extract<R: Read>(&self, reader: R) -> Result<Vec<Transaction>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| PipelineError::Schema(format!("failed to read CSV header: {e}")))?
            .clone();
        if headers.is_empty() {
            return Err(PipelineError::EmptyInput(
                "no transactions found in CSV".to_string(),
            ));
        }
        let columns = ColumnIndex::from_headers(&headers)?;
        debug!(?columns, "Validated CSV header");

        let mut transactions = Vec::new();
        for (i, record) in csv_reader.records().enumerate() {
            let row = i + 1;
            let record = record.map_err(|e| {
                PipelineError::parse(row, format!("error occurred while reading CSV: {e}"))
            })?;
            transactions.push(self.parse_record(&record, columns, row)?);
        }

        if transactions.is_empty() {
            return Err(PipelineError::EmptyInput(
                "no transactions found in CSV".to_string(),
            ));
        }
        info!(rows = transactions.len(), "Extracted transactions");
        Ok(transactions)
    }

    fn parse_record(
        &self,
        record: &csv::StringRecord,
        columns: ColumnIndex,
        row: usize,
    ) -> Result<Transaction> {
        let field = |index: usize| record.get(index).unwrap_or_default();

        let currency_symbol = self
            .patterns
            .currency_symbol(field(columns.props))
            .ok_or_else(|| PipelineError::parse(row, "currencySymbol not found in props"))?;

        let raw_amount = self
            .patterns
            .currency_value_decimal(field(columns.nums))
            .ok_or_else(|| PipelineError::parse(row, "currencyValueDecimal not found in nums"))?;
        let amount: Amount = raw_amount.parse().map_err(|e| {
            PipelineError::parse(row, format!("failed to parse currency value: {e}"))
        })?;
        if amount.is_negative() {
            return Err(PipelineError::parse(
                row,
                format!("negative currency value '{raw_amount}'"),
            ));
        }

        let raw_ts = field(columns.ts);
        let date = NaiveDateTime::parse_from_str(raw_ts, TIMESTAMP_FORMAT).map_err(|e| {
            PipelineError::parse(row, format!("failed to parse timestamp '{raw_ts}': {e}"))
        })?;

        Ok(Transaction {
            date,
            project_id: field(columns.project_id).to_string(),
            currency_symbol: currency_symbol.to_string(),
            amount,
        })
    }
}
