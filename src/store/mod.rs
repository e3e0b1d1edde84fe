pub mod clickhouse;
pub mod memory;

pub use clickhouse::ClickHouseSink;
pub use memory::MemorySink;
