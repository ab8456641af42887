//! In-memory store, used by tests and the `memory` backend

use super::{blob_id, validate_collection_name, BlobStore, DocumentStore, StoredBlob};
use crate::data::Document;
use crate::error::Result;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Documents and blobs held in process memory
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Vec<Document>>>,
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn create_collection(&self, collection: &str) -> Result<bool> {
        validate_collection_name(collection)?;
        let mut collections = self.collections.write();
        if collections.contains_key(collection) {
            return Ok(false);
        }
        collections.insert(collection.to_string(), Vec::new());
        Ok(true)
    }

    fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<usize> {
        validate_collection_name(collection)?;
        let count = docs.len();
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
        Ok(count)
    }

    fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    fn find_one(&self, collection: &str) -> Result<Option<Document>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.first().cloned()))
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.collections.read().keys().cloned().collect())
    }

    fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.read().contains_key(collection))
    }
}

impl BlobStore for MemoryStore {
    fn put(&self, filename: &str, data: &[u8]) -> Result<String> {
        let id = blob_id(data);
        self.blobs
            .write()
            .entry(id.clone())
            .and_modify(|blob| blob.filename = filename.to_string())
            .or_insert_with(|| StoredBlob {
                id: id.clone(),
                filename: filename.to_string(),
                data: data.to_vec(),
                created_at: Utc::now(),
            });
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Option<StoredBlob>> {
        Ok(self.blobs.read().get(id).cloned())
    }
}
