//! Persistent field store abstraction
//!
//! A flat string key-value store: platform secure storage, an encrypted
//! preferences file, or the JSON file in [`crate::file_store`]. Backends report
//! faults as [`StoreError`]; the token cache decides what to do with them.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::error::{Result, StoreError};

/// Boxed future returned by [`FieldStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Key-value persistence consumed by the token cache.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn FieldStore>`). Every method must be safe to call repeatedly;
/// removing an absent key is not an error.
pub trait FieldStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    fn put<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()>;

    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryFieldStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryFieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> Result<T> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        Ok(f(&mut entries))
    }
}

impl FieldStore for MemoryFieldStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { self.with_entries(|e| e.get(key).cloned()) })
    }

    fn put<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.with_entries(|e| {
                e.insert(key.to_string(), value.to_string());
            })
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.with_entries(|e| {
                e.remove(key);
            })
        })
    }
}
