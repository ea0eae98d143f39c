//! Consuming store: the cache watched values are written into.
//!
//! Written by the initial loader before watching starts and by the watch loop
//! afterwards; read concurrently by anyone holding the `Arc`.


use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct SecretStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the value of `path`. Returns the previous value, if any.
    pub fn write(
        &self,
        path: &str,
        value: Bytes,
    ) -> Option<Bytes> {
        self.entries.write().insert(path.to_string(), value)
    }

    pub fn get(
        &self,
        path: &str,
    ) -> Option<Bytes> {
        self.entries.read().get(path).cloned()
    }

    /// Value of `path` as UTF-8, lossily converted.
    pub fn get_string(
        &self,
        path: &str,
    ) -> Option<String> {
        self.get(path).map(|value| String::from_utf8_lossy(&value).into_owned())
    }

    pub fn contains(
        &self,
        path: &str,
    ) -> bool {
        self.entries.read().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Point-in-time copy of every entry.
    pub fn snapshot(&self) -> HashMap<String, Bytes> {
        self.entries.read().clone()
    }
}
