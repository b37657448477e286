//! # Account Key Lifecycle
//!
//! Ties key generation, the vault, the key store, the directory and the
//! session together into the flows a client runs.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ACCOUNT LIFECYCLE                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  sign_up(user, pw)                                                      │
//! │    generate KeyPair → store[slot] = vault.wrap(bundle, pw)              │
//! │                     → directory.publish(public keys)                    │
//! │                     → session ← KeyPair                                 │
//! │                                                                         │
//! │  unlock(pw)          session ← vault.unwrap(store[slot], pw)            │
//! │  change_password     store[slot] = vault.rewrap(store[slot], old, new)  │
//! │  lock()              session ← ∅ (blob stays)                           │
//! │  log_out()           session ← ∅, store[slot] deleted                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use crate::config::CoreConfig;
use crate::crypto::{KeyPair, PublicKeys};
use crate::directory::KeyDirectory;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::storage::KeyStore;
use crate::vault::Vault;

/// Account key lifecycle for one device
pub struct AccountService {
    directory: Arc<dyn KeyDirectory>,
    store: Arc<dyn KeyStore>,
    vault: Vault,
    session: Arc<Session>,
    slot: String,
}

impl AccountService {
    /// Create an account service
    pub fn new(
        config: &CoreConfig,
        directory: Arc<dyn KeyDirectory>,
        store: Arc<dyn KeyStore>,
        session: Arc<Session>,
    ) -> Self {
        Self {
            directory,
            store,
            vault: Vault::new(config.vault),
            session,
            slot: config.key_slot.clone(),
        }
    }

    /// The session this service unlocks
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Create keys for a new account
    ///
    /// Persists the wrapped bundle, then publishes the public keys and
    /// unlocks the session. Keys are only advertised once their secret
    /// halves are stored, and the stored bundle is removed again if
    /// publishing fails.
    pub async fn sign_up(&self, user_id: &str, password: &str) -> Result<PublicKeys> {
        let pair = KeyPair::generate();
        let public = pair.public_keys();

        let blob = self.vault.wrap_key_pair_bundle(&pair, password)?;
        self.store.store(&self.slot, &blob)?;

        if let Err(e) = self.directory.publish(user_id, public).await {
            tracing::warn!(user_id, code = e.code(), "Publishing keys failed, discarding bundle");
            self.store.delete(&self.slot)?;
            return Err(e);
        }

        self.session.set_active_key_pair(Some(pair));

        tracing::info!(user_id, fingerprint = %public.fingerprint(), "Account keys created");
        Ok(public)
    }

    /// Whether this device holds a wrapped bundle
    pub fn has_stored_keys(&self) -> Result<bool> {
        self.store.exists(&self.slot)
    }

    /// Unlock the session from the stored bundle
    ///
    /// `KeyUnavailable` if the device has no stored bundle, `UnwrapFailed`
    /// for a wrong password.
    pub fn unlock(&self, password: &str) -> Result<PublicKeys> {
        let blob = self.stored_blob()?;

        match self.session.unlock(&blob, password, &self.vault) {
            Ok(public) => Ok(public),
            Err(e) => {
                tracing::warn!(code = e.code(), "Unlock failed");
                Err(e)
            }
        }
    }

    /// Re-wrap the stored bundle under a new password
    ///
    /// The session is untouched.
    pub fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        let blob = self.stored_blob()?;
        let rewrapped = self.vault.rewrap_bundle(&blob, old_password, new_password)?;
        self.store.store(&self.slot, &rewrapped)?;

        tracing::info!("Key bundle re-wrapped under new password");
        Ok(())
    }

    /// Clear the session, keeping the stored bundle for the next unlock
    pub fn lock(&self) {
        self.session.lock();
    }

    /// Clear the session and delete the stored bundle
    pub fn log_out(&self) -> Result<()> {
        self.session.lock();
        self.store.delete(&self.slot)?;

        tracing::info!("Logged out");
        Ok(())
    }

    fn stored_blob(&self) -> Result<String> {
        self.store.retrieve(&self.slot)?.ok_or(Error::KeyUnavailable)
    }
}

// ============================================================================
// TESTS
// ============================================================================
