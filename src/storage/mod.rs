//! Local persistence boundary: durable key-value storage for the offline
//! sync queue and the local cache.

mod kv;

pub use kv::{FileStore, KeyValueStore, MemoryStore, StorageError};
