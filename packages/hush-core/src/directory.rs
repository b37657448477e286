//! # User Directory
//!
//! Where users publish their public keys and look up everyone else's.
//! The real directory is a remote service, so the seam is async.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::crypto::PublicKeys;
use crate::error::{Error, Result};

/// Public key directory
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    /// Publish (or replace) the public keys for `user_id`
    async fn publish(&self, user_id: &str, keys: PublicKeys) -> Result<()>;

    /// Look up the public keys for `user_id`
    ///
    /// Fails with `RecipientNotFound` when the user has published nothing.
    async fn lookup(&self, user_id: &str) -> Result<PublicKeys>;
}

/// In-memory directory
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: RwLock<HashMap<String, PublicKeys>>,
}

impl MemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of published users
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nobody has published yet
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyDirectory for MemoryDirectory {
    async fn publish(&self, user_id: &str, keys: PublicKeys) -> Result<()> {
        self.entries.write().insert(user_id.to_string(), keys);
        tracing::debug!(user_id, "Published public keys");
        Ok(())
    }

    async fn lookup(&self, user_id: &str) -> Result<PublicKeys> {
        self.entries
            .read()
            .get(user_id)
            .copied()
            .ok_or_else(|| Error::RecipientNotFound(user_id.to_string()))
    }
}
