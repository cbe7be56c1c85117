pub mod error;
pub mod memory;
pub mod provider;
pub mod sqlite;
pub mod store;

pub use error::MemoryError;
pub use provider::{NoopMemory, SignalMemory};
pub use sqlite::SqliteStore;
pub use store::SqliteSignalStore;
