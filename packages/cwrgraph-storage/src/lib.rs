//! cwrgraph-storage: content-addressed object store
//!
//! > "Store once by content, reference everywhere by identifier."
//!
//! ## Core Principles
//!
//! 1. **Determinism**: identical content always yields an identical `ContentId`
//! 2. **Immutability**: objects are never updated in place
//! 3. **Concurrency**: every backend accepts unordered `put` calls from many tasks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cwrgraph_storage::{MemoryObjectStore, MetaObject, ObjectStore};
//!
//! let store = MemoryObjectStore::new();
//! let object = MetaObject::encode(&record)?;
//! let id = store.put(&object).await?;
//!
//! let loaded = store.get(&id).await?;
//! let tag = loaded.get_string("record_type")?;
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{ContentId, MetaObject, ObjectStore};
pub use infrastructure::MemoryObjectStore;

#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteObjectStore;
