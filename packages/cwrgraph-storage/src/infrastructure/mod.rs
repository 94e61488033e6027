//! Infrastructure layer - Storage adapters
//!
//! - `memory`: concurrent in-memory map
//! - `sqlite`: single-table SQLite backend

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryObjectStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteObjectStore;
