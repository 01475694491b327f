//! Storage subsystem
//!
//! This module provides the key-value persistence used by the session store.
//! The contract mirrors a browser's local storage: string keys mapped to
//! string blobs, each write replacing the whole value.
//!
//! Components:
//! - `storage_trait`: the Storage trait defining a uniform API.
//! - `file_storage`: filesystem-backed implementation, one JSON file per key.
//! - `memory_storage`: in-process implementation for tests and ephemeral runs.

pub mod file_storage;
pub mod memory_storage;
pub mod storage_trait;

pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
pub use storage_trait::Storage;
