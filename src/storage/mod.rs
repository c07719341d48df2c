pub mod traits;
pub mod duckdb;

pub use traits::{EventFilter, RunStatistics, RunStatus, Storage, StorageError, StoredEvent, Table};
pub use self::duckdb::DuckDbStorage;
