//! File-backed store
//!
//! Layout under the data directory:
//! - `collections/{name}.jsonl`: one JSON document per line
//! - `blobs/{id}.bin` and `blobs/{id}.json`: blob bytes and metadata

use super::{blob_id, validate_collection_name, BlobMeta, BlobStore, DocumentStore, StoredBlob};
use crate::data::Document;
use crate::error::{QuickmlError, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Store persisting collections and blobs as plain files
pub struct FileStore {
    collections_dir: PathBuf,
    blobs_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `base_dir`.
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let collections_dir = base_dir.join("collections");
        let blobs_dir = base_dir.join("blobs");
        fs::create_dir_all(&collections_dir)?;
        fs::create_dir_all(&blobs_dir)?;

        Ok(Self {
            collections_dir,
            blobs_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.collections_dir.join(format!("{}.jsonl", collection))
    }

    fn read_collection(&self, collection: &str, limit: Option<usize>) -> Result<Vec<Document>> {
        if validate_collection_name(collection).is_err() {
            return Ok(Vec::new());
        }
        let file = match File::open(self.collection_path(collection)) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut docs = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            docs.push(serde_json::from_str::<Document>(&line)?);
            if limit.is_some_and(|l| docs.len() >= l) {
                break;
            }
        }
        Ok(docs)
    }
}

impl DocumentStore for FileStore {
    fn create_collection(&self, collection: &str) -> Result<bool> {
        validate_collection_name(collection)?;
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.collection_path(collection))
        {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<usize> {
        validate_collection_name(collection)?;
        let _guard = self.write_lock.lock();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.collection_path(collection))?;
        let mut writer = BufWriter::new(file);
        for doc in &docs {
            serde_json::to_writer(&mut writer, doc)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        debug!(collection = %collection, count = docs.len(), "Inserted documents");
        Ok(docs.len())
    }

    fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        self.read_collection(collection, None)
    }

    fn find_one(&self, collection: &str) -> Result<Option<Document>> {
        Ok(self.read_collection(collection, Some(1))?.into_iter().next())
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(&self.collections_dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                    path.file_stem().and_then(|s| s.to_str()).map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        Ok(names)
    }

    fn collection_exists(&self, collection: &str) -> Result<bool> {
        if validate_collection_name(collection).is_err() {
            return Ok(false);
        }
        Ok(self.collection_path(collection).exists())
    }
}

impl BlobStore for FileStore {
    fn put(&self, filename: &str, data: &[u8]) -> Result<String> {
        let id = blob_id(data);
        let bin_path = self.blobs_dir.join(format!("{}.bin", id));
        let meta_path = self.blobs_dir.join(format!("{}.json", id));

        let _guard = self.write_lock.lock();
        if !bin_path.exists() {
            fs::write(&bin_path, data)?;
        }
        let meta = BlobMeta {
            filename: filename.to_string(),
            created_at: Utc::now(),
            size: data.len(),
        };
        fs::write(&meta_path, serde_json::to_vec_pretty(&meta)?)?;

        debug!(blob_id = %id, filename = %filename, size = data.len(), "Stored blob");
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Option<StoredBlob>> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(None);
        }
        let meta_path = self.blobs_dir.join(format!("{}.json", id));
        let meta_bytes = match fs::read(&meta_path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: BlobMeta = serde_json::from_slice(&meta_bytes)?;
        let data = fs::read(self.blobs_dir.join(format!("{}.bin", id))).map_err(|e| {
            QuickmlError::StoreError(format!("blob {} has metadata but no content: {}", id, e))
        })?;

        Ok(Some(StoredBlob {
            id: id.to_string(),
            filename: meta.filename,
            data,
            created_at: meta.created_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(name: &str, v: f64) -> Document {
        let mut d = Document::new();
        d.insert("name".to_string(), json!(name));
        d.insert("value".to_string(), json!(v));
        d
    }

    #[test]
    fn test_roundtrip_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert!(store.create_collection("dataset_1").unwrap());
        assert!(!store.create_collection("dataset_1").unwrap());
        store.insert_many("dataset_1", vec![doc("a", 1.0), doc("b", 2.5)]).unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        let docs = reopened.find_all("dataset_1").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["value"], json!(2.5));

        let keys: Vec<&String> = docs[0].keys().collect();
        assert_eq!(keys, vec!["name", "value"]);

        assert_eq!(reopened.list_collections().unwrap(), vec!["dataset_1".to_string()]);
        assert!(reopened.find_one("missing").unwrap().is_none());
        assert!(!reopened.collection_exists("../dataset_1").unwrap());
    }

    #[test]
    fn test_blob_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let id = store.put("random_forest_01012025_120000", b"{\"trees\":[]}").unwrap();
        let blob = store.get(&id).unwrap().unwrap();
        assert_eq!(blob.filename, "random_forest_01012025_120000");
        assert_eq!(blob.data, b"{\"trees\":[]}");

        assert!(store.get("not-hex").unwrap().is_none());
        assert!(store.get("abcdef").unwrap().is_none());
    }

    #[test]
    fn test_blob_resave_takes_latest_filename() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let id1 = store.put("linear_regression_01012025_120000", b"{\"w\":[1.0]}").unwrap();
        let id2 = store.put("linear_regression_01012025_120001", b"{\"w\":[1.0]}").unwrap();
        assert_eq!(id1, id2);

        let reopened = FileStore::open(dir.path()).unwrap();
        let blob = reopened.get(&id1).unwrap().unwrap();
        assert_eq!(blob.filename, "linear_regression_01012025_120001");
        assert_eq!(blob.data, b"{\"w\":[1.0]}");
    }
}
