//! Document and blob storage
//!
//! Datasets, processed datasets, and training-run metrics are stored as named
//! collections of JSON documents. Model binaries go to a separate blob store
//! keyed by a content hash. Both stores are explicit handles passed to the
//! components that need them.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::data::Document;
use crate::error::{QuickmlError, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Timestamp pattern used in collection names and blob filenames
pub const TIMESTAMP_FORMAT: &str = "%d%m%Y_%H%M%S";

/// Collections of schemaless JSON documents
pub trait DocumentStore: Send + Sync {
    /// Create an empty collection. Returns false if it already exists.
    fn create_collection(&self, collection: &str) -> Result<bool>;

    /// Append documents, creating the collection if needed. Returns the
    /// number of documents written.
    fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<usize>;

    fn insert_one(&self, collection: &str, doc: Document) -> Result<()> {
        self.insert_many(collection, vec![doc]).map(|_| ())
    }

    /// All documents in insertion order; empty for unknown collections.
    fn find_all(&self, collection: &str) -> Result<Vec<Document>>;

    /// The first document of a collection, if any.
    fn find_one(&self, collection: &str) -> Result<Option<Document>>;

    fn list_collections(&self) -> Result<Vec<String>>;

    fn collection_exists(&self, collection: &str) -> Result<bool>;
}

/// A stored binary object
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub id: String,
    pub filename: String,
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Metadata kept next to each blob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BlobMeta {
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub size: usize,
}

/// Content-addressed binary storage
pub trait BlobStore: Send + Sync {
    /// Store bytes under a filename and return the blob id. Storing identical
    /// content again returns the existing id and renames the blob to the
    /// latest filename.
    fn put(&self, filename: &str, data: &[u8]) -> Result<String>;

    fn get(&self, id: &str) -> Result<Option<StoredBlob>>;
}

/// Blob id: first 24 hex characters of the SHA-256 of the content.
pub fn blob_id(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let hex = format!("{:x}", digest);
    hex[..24].to_string()
}

/// Current local time in [`TIMESTAMP_FORMAT`].
pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Collection names are restricted to ASCII letters, digits, `_` and `-`.
pub fn validate_collection_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(QuickmlError::ValidationError(format!(
            "invalid collection name '{}'",
            name
        )))
    }
}

/// Create a fresh collection named `{prefix}_{timestamp}`.
///
/// Two requests within the same second would collide on the timestamp, so a
/// taken name gets a `_2`, `_3`, ... suffix.
pub fn reserve_collection(store: &dyn DocumentStore, prefix: &str, timestamp: &str) -> Result<String> {
    let base = format!("{}_{}", prefix, timestamp);
    if store.create_collection(&base)? {
        return Ok(base);
    }
    for n in 2.. {
        let candidate = format!("{}_{}", base, n);
        if store.create_collection(&candidate)? {
            return Ok(candidate);
        }
    }
    unreachable!("collection suffixes are unbounded")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_id_is_stable() {
        let a = blob_id(b"model bytes");
        let b = blob_id(b"model bytes");
        let c = blob_id(b"other bytes");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 24);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 15);
        assert_eq!(&ts[8..9], "_");
    }

    #[test]
    fn test_validate_collection_name() {
        assert!(validate_collection_name("dataset_01012025_101010").is_ok());
        assert!(validate_collection_name("processed-1").is_ok());
        assert!(validate_collection_name("").is_err());
        assert!(validate_collection_name("../etc").is_err());
        assert!(validate_collection_name("a b").is_err());
    }

    #[test]
    fn test_reserve_collection_suffixes() {
        let store = MemoryStore::new();
        let first = reserve_collection(&store, "dataset", "01012025_101010").unwrap();
        let second = reserve_collection(&store, "dataset", "01012025_101010").unwrap();
        let third = reserve_collection(&store, "dataset", "01012025_101010").unwrap();
        assert_eq!(first, "dataset_01012025_101010");
        assert_eq!(second, "dataset_01012025_101010_2");
        assert_eq!(third, "dataset_01012025_101010_3");
    }
}
