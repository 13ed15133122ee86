use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Field map of a single hash.
pub type Hash = HashMap<Vec<u8>, Vec<u8>>;

/// The in-memory keyspace.
///
/// Plain strings and hashes live in separate namespaces: `SET foo` and
/// `HSET foo ...` never collide. Keys and fields are raw bytes.
#[derive(Debug, Default)]
pub struct DataStore {
    strings: HashMap<Vec<u8>, Vec<u8>>,
    hashes: HashMap<Vec<u8>, Hash>,
}

impl DataStore {
    pub fn new() -> Self {
        DataStore::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<&Vec<u8>> {
        self.strings.get(key)
    }

    /// Set a key-value pair, replacing any previous value.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.strings.insert(key, value);
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> Option<&Vec<u8>> {
        self.hashes.get(key)?.get(field)
    }

    /// Set a hash field, creating the hash on first use.
    /// Returns true if the field is new.
    pub fn hset(&mut self, key: Vec<u8>, field: Vec<u8>, value: Vec<u8>) -> bool {
        self.hashes
            .entry(key)
            .or_default()
            .insert(field, value)
            .is_none()
    }

    /// Number of string keys.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Number of hashes.
    pub fn hash_count(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.hashes.is_empty()
    }
}

pub type SharedStore = Arc<RwLock<DataStore>>;
