//! Domain layer for the content-addressed object store
//!
//! # Core Principles
//!
//! 1. **Content Identity**: `id = sha256(canonical bytes)`; equal content, equal id
//! 2. **Immutability**: stored objects never change, `put` is idempotent
//! 3. **Merkle Links**: identifiers embedded in parent objects serialize as `{"/": "<hex>"}`
//!
//! # Domain Models
//!
//! - `ContentId`: Digest of an object's canonical encoding
//! - `MetaObject`: Canonical JSON bytes plus their `ContentId`
//!
//! # Port Trait
//!
//! - `ObjectStore`: Primary storage abstraction
//!
//! # Examples
//!
//! ```rust,ignore
//! use cwrgraph_storage::{MemoryObjectStore, MetaObject, ObjectStore};
//!
//! async fn example(store: impl ObjectStore) -> Result<()> {
//!     let object = MetaObject::encode(&serde_json::json!({"record_type": "HDR"}))?;
//!     let id = store.put(&object).await?;
//!
//!     let loaded = store.get(&id).await?;
//!     assert_eq!(loaded.get_string("record_type")?, "HDR");
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::{Result, StorageError};

// ═══════════════════════════════════════════════════════════════════════════
// Domain Models
// ═══════════════════════════════════════════════════════════════════════════

/// Content identifier
///
/// Lowercase hex SHA-256 of the canonical encoding. Serializes as a merkle
/// link so parents can tell references apart from plain strings.
///
/// # Examples
///
/// ```rust
/// use cwrgraph_storage::ContentId;
///
/// let a = ContentId::for_bytes(b"{}");
/// let b = ContentId::for_bytes(b"{}");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId {
    #[serde(rename = "/")]
    digest: String,
}

impl ContentId {
    /// Hash raw bytes into an identifier
    pub fn for_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            digest: format!("{:x}", hasher.finalize()),
        }
    }

    /// Parse a hex digest previously produced by [`ContentId::as_str`]
    pub fn parse(digest: &str) -> Result<Self> {
        let valid = digest.len() == 64
            && digest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(StorageError::serialization(format!(
                "Invalid content id: {}",
                digest
            )));
        }
        Ok(Self {
            digest: digest.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest)
    }
}

/// Encoded, content-addressed value
///
/// Holds the canonical JSON encoding (object keys sorted, no whitespace)
/// together with the parsed value for field lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaObject {
    id: ContentId,
    bytes: Vec<u8>,
    value: serde_json::Value,
}

impl MetaObject {
    /// Encode a serializable value
    ///
    /// Encoding goes through `serde_json::Value`, whose maps are ordered by
    /// key, so the same logical content always produces the same bytes.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let value = serde_json::to_value(value)?;
        let bytes = serde_json::to_vec(&value)?;
        Ok(Self {
            id: ContentId::for_bytes(&bytes),
            bytes,
            value,
        })
    }

    /// Rebuild an object from bytes read back from a backend
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let value = serde_json::from_slice(&bytes)?;
        Ok(Self {
            id: ContentId::for_bytes(&bytes),
            bytes,
            value,
        })
    }

    pub fn id(&self) -> &ContentId {
        &self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    /// Top-level field lookup
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::MissingField` if the object has no such field
    pub fn get_field(&self, name: &str) -> Result<&serde_json::Value> {
        self.value
            .get(name)
            .ok_or_else(|| StorageError::missing_field(name))
    }

    /// Top-level string field lookup
    pub fn get_string(&self, name: &str) -> Result<&str> {
        self.get_field(name)?
            .as_str()
            .ok_or_else(|| StorageError::missing_field(name))
    }

    /// Decode the object back into a typed value
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.value)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Port Trait: ObjectStore
// ═══════════════════════════════════════════════════════════════════════════

/// Content-addressed object storage abstraction
///
/// Implementations must accept concurrent, unordered `put` calls from
/// multiple tasks.
///
/// # Implementations
///
/// - `MemoryObjectStore`: concurrent in-memory map
/// - `SqliteObjectStore`: single-table SQLite backend (feature `sqlite`)
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Persist an object and return its identifier
    ///
    /// Storing an object that is already present is not an error.
    async fn put(&self, object: &MetaObject) -> Result<ContentId>;

    /// Load an object by identifier
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::ObjectNotFound` if the object doesn't exist
    async fn get(&self, id: &ContentId) -> Result<MetaObject>;

    /// Check whether an object is present
    async fn contains(&self, id: &ContentId) -> Result<bool>;

    /// Number of distinct objects stored
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
