//! Currency symbol to price-provider token id mapping.

use anyhow::Result;
use std::collections::HashMap;

/// Read-only map from lowercase currency symbol to the provider's token id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolIdLookup {
    ids: HashMap<String, String>,
}

impl SymbolIdLookup {
    /// Builds the lookup from `(token_id, symbol)` pairs. Later pairs win.
    pub fn from_pairs<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: AsRef<str>,
    {
        let ids = pairs
            .into_iter()
            .map(|(id, symbol)| (symbol.as_ref().to_lowercase(), id.into()))
            .collect();
        Self { ids }
    }

    pub fn token_id(&self, symbol: &str) -> Option<&str> {
        self.ids.get(&symbol.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Loads the reference table once per batch.
pub trait SymbolLookupSource: Send + Sync {
    fn load(&self) -> Result<SymbolIdLookup>;
}

impl SymbolLookupSource for SymbolIdLookup {
    fn load(&self) -> Result<SymbolIdLookup> {
        Ok(self.clone())
    }
}
