//! Storage Trait
//!
//! This module defines the `Storage` trait, the key-value interface behind
//! the session store.
//!
//! Implementors of this trait are responsible for:
//! - Returning the last value written under a key, or `None`
//! - Replacing a value in a single write, so readers never see a partial blob
//! - Removing keys
//!
//! All methods return a `Result` to handle potential storage errors.

use crate::error_handling::types::StorageError;

/// The `Storage` trait defines the interface for key-value storage backends.
pub trait Storage: Send + Sync {
    /// Returns the value stored under `key`, or `None` if the key was never written.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value as a whole.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Deletes `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}
