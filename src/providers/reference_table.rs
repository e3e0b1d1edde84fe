//! CSV backed reference table of provider token ids.

use crate::core::lookup::{SymbolIdLookup, SymbolLookupSource};
use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;
use tracing::debug;

/// Two-column CSV file: token id, then currency symbol.
pub struct CsvSymbolTable {
    path: PathBuf,
    has_headers: bool,
}

impl CsvSymbolTable {
    pub fn new(path: impl Into<PathBuf>, has_headers: bool) -> Self {
        Self {
            path: path.into(),
            has_headers,
        }
    }
}

impl SymbolLookupSource for CsvSymbolTable {
    fn load(&self) -> Result<SymbolIdLookup> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(self.has_headers)
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open reference table: {}", self.path.display()))?;

        let mut pairs = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.with_context(|| {
                format!("Failed to read reference table: {}", self.path.display())
            })?;
            match (record.get(0), record.get(1)) {
                (Some(token_id), Some(symbol)) => {
                    pairs.push((token_id.to_string(), symbol.to_string()))
                }
                _ => {
                    return Err(anyhow!(
                        "Reference table row {} has fewer than two columns",
                        i + 1
                    ));
                }
            }
        }

        let lookup = SymbolIdLookup::from_pairs(pairs);
        debug!(
            path = %self.path.display(),
            entries = lookup.len(),
            "Loaded reference table"
        );
        Ok(lookup)
    }
}
