pub mod coingecko;
pub mod reference_table;
pub mod util;

pub use coingecko::CoinGeckoProvider;
pub use reference_table::CsvSymbolTable;
