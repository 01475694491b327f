use std::collections::HashMap;
use std::sync::Mutex;

use log::debug;

use crate::error_handling::types::StorageError;
use crate::storage::storage_trait::Storage;

/// Keeps every item in process memory. Contents are lost on drop.
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self
            .items
            .lock()
            .map_err(|_| StorageError::ReadFailed("memory storage lock poisoned".into()))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| StorageError::WriteFailed("memory storage lock poisoned".into()))?;
        items.insert(key.to_string(), value.to_string());
        debug!("Stored {} byte(s) under {}", value.len(), key);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| StorageError::WriteFailed("memory storage lock poisoned".into()))?;
        items.remove(key);
        Ok(())
    }
}
