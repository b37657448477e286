//! # Active Session
//!
//! Holds the logged-in user's unwrapped key pair.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SESSION SLOT                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   locked ──unlock / set_active_key_pair(Some)──► unlocked               │
//! │     ▲                                                │                  │
//! │     └────────lock / set_active_key_pair(None)────────┘                  │
//! │                                                                         │
//! │  slot: RwLock<Option<Arc<KeyPair>>>                                     │
//! │                                                                         │
//! │  Every operation clones the Arc once at its start and works on that     │
//! │  snapshot. A concurrent lock() empties the slot but cannot touch the    │
//! │  snapshot; the key bytes are zeroized when the last snapshot drops.     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::crypto::{self, KeyPair, PublicKeys, Signature, SymmetricKey};
use crate::envelope::{EncryptedEnvelope, RecipientId};
use crate::error::{Error, Result};
use crate::vault::Vault;

/// The single "current key material" slot of a running client
#[derive(Default)]
pub struct Session {
    active: RwLock<Option<Arc<KeyPair>>>,
}

impl Session {
    /// Create a locked session
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active key pair, or clear it with `None`
    pub fn set_active_key_pair(&self, pair: Option<KeyPair>) {
        let next = pair.map(Arc::new);
        let unlocked = next.is_some();

        // The previous pair is dropped outside the lock
        let previous = std::mem::replace(&mut *self.active.write(), next);
        drop(previous);

        if unlocked {
            tracing::info!("Session unlocked");
        } else {
            tracing::info!("Session locked");
        }
    }

    /// Snapshot of the active key pair
    pub fn active_key_pair(&self) -> Result<Arc<KeyPair>> {
        self.active.read().clone().ok_or(Error::KeyUnavailable)
    }

    /// Whether a key pair is loaded
    pub fn is_unlocked(&self) -> bool {
        self.active.read().is_some()
    }

    /// Clear the active key pair
    pub fn lock(&self) {
        self.set_active_key_pair(None);
    }

    /// Restore the key pair from a wrapped bundle and make it active
    ///
    /// On failure the session is left as it was.
    pub fn unlock(&self, blob: &str, password: &str, vault: &Vault) -> Result<PublicKeys> {
        let pair = vault.unwrap_key_pair_bundle(blob, password)?;
        let public = pair.public_keys();
        self.set_active_key_pair(Some(pair));
        Ok(public)
    }

    /// Public keys of the active key pair
    pub fn public_keys(&self) -> Result<PublicKeys> {
        Ok(self.active_key_pair()?.public_keys())
    }

    // ========================================================================
    // OPERATIONS ON THE ACTIVE KEY PAIR
    // ========================================================================

    /// Box a message for one recipient with the active box key
    pub fn encrypt_direct(&self, plaintext: &[u8], recipient_public_key: &[u8]) -> Result<EncryptedEnvelope> {
        let pair = self.active_key_pair()?;
        crypto::encrypt_asymmetric(
            plaintext,
            recipient_public_key,
            &pair.encryption.secret_bytes()[..],
        )
    }

    /// Open a box addressed to the active key pair
    pub fn decrypt_direct(&self, envelope: &EncryptedEnvelope, sender_public_key: &[u8]) -> Result<Vec<u8>> {
        let pair = self.active_key_pair()?;
        crypto::decrypt_asymmetric(envelope, sender_public_key, &pair.encryption.secret_bytes()[..])
    }

    /// Box the same message for several recipients
    pub fn encrypt_for_recipients<I, K, P>(
        &self,
        plaintext: &[u8],
        recipients: I,
    ) -> Result<BTreeMap<RecipientId, EncryptedEnvelope>>
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<RecipientId>,
        P: AsRef<[u8]>,
    {
        let pair = self.active_key_pair()?;
        crypto::encrypt_for_recipients(plaintext, recipients, &pair.encryption.secret_bytes()[..])
    }

    /// Box a group key for one member
    pub fn wrap_symmetric_key_for(
        &self,
        key: &SymmetricKey,
        recipient_public_key: &[u8],
    ) -> Result<EncryptedEnvelope> {
        let pair = self.active_key_pair()?;
        crypto::wrap_symmetric_key_for_recipient(
            key,
            recipient_public_key,
            &pair.encryption.secret_bytes()[..],
        )
    }

    /// Box a group key for every member
    pub fn wrap_symmetric_key_for_members<I, K, P>(
        &self,
        key: &SymmetricKey,
        members: I,
    ) -> Result<BTreeMap<RecipientId, EncryptedEnvelope>>
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<RecipientId>,
        P: AsRef<[u8]>,
    {
        let pair = self.active_key_pair()?;
        crypto::wrap_symmetric_key_for_members(key, members, &pair.encryption.secret_bytes()[..])
    }

    /// Recover a group key boxed for the active key pair
    pub fn unwrap_symmetric_key_from(
        &self,
        envelope: &EncryptedEnvelope,
        sender_public_key: &[u8],
    ) -> Result<SymmetricKey> {
        let pair = self.active_key_pair()?;
        crypto::unwrap_symmetric_key(envelope, sender_public_key, &pair.encryption.secret_bytes()[..])
    }

    /// Detached signature with the active signing key
    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        let pair = self.active_key_pair()?;
        Ok(crypto::sign(&pair.signing, message))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("unlocked", &self.is_unlocked())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
