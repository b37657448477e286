//! # Key Store
//!
//! Where the wrapped key pair bundle lives between sessions.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          KEY STORE SEAM                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  The core hands the store an opaque string (a wrapped blob, already     │
//! │  sealed under the user's password) and asks for it back by slot name.   │
//! │                                                                         │
//! │  Platform stores (browser localStorage, keychain, keystore) implement   │
//! │  KeyStore outside this crate. MemoryKeyStore backs tests and demos.     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing stored here is plaintext key material, so a store never needs
//! to encrypt on its own.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::Result;

/// Persistent storage for wrapped blobs
pub trait KeyStore: Send + Sync {
    /// Store a blob under `slot`, replacing any previous value
    fn store(&self, slot: &str, blob: &str) -> Result<()>;

    /// Retrieve the blob under `slot`
    fn retrieve(&self, slot: &str) -> Result<Option<String>>;

    /// Delete the blob under `slot`, returning whether one existed
    fn delete(&self, slot: &str) -> Result<bool>;

    /// Check whether `slot` holds a blob
    fn exists(&self, slot: &str) -> Result<bool> {
        Ok(self.retrieve(slot)?.is_some())
    }
}

/// In-memory key store
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    memory: RwLock<HashMap<String, String>>,
}

impl MemoryKeyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn store(&self, slot: &str, blob: &str) -> Result<()> {
        let mut storage = self.memory.write();
        storage.insert(slot.to_string(), blob.to_string());
        Ok(())
    }

    fn retrieve(&self, slot: &str) -> Result<Option<String>> {
        let storage = self.memory.read();
        Ok(storage.get(slot).cloned())
    }

    fn delete(&self, slot: &str) -> Result<bool> {
        let mut storage = self.memory.write();
        Ok(storage.remove(slot).is_some())
    }

    fn exists(&self, slot: &str) -> Result<bool> {
        let storage = self.memory.read();
        Ok(storage.contains_key(slot))
    }
}
