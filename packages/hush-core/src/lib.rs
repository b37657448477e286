//! # Hush Core
//!
//! The end-to-end encryption core of the Hush messaging client: key
//! generation, direct and group message encryption, group key distribution,
//! password-protected key storage, and the envelope formats the transport
//! carries.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          HUSH CORE MODULES                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌───────────────────────┐      │
//! │  │   Account    │  │    Messaging     │  │       Session         │      │
//! │  │              │  │                  │  │                       │      │
//! │  │ - Sign up    │  │ - Seal direct    │  │ - Active key pair     │      │
//! │  │ - Unlock     │  │ - Seal group     │  │ - Arc snapshots       │      │
//! │  │ - Log out    │  │ - Fan-out / open │  │ - Lock / unlock       │      │
//! │  └──────┬───────┘  └────────┬─────────┘  └───────────┬───────────┘      │
//! │         │                   │                        │                  │
//! │         └───────────────────┴────────────────────────┘                  │
//! │                             │                                           │
//! │  ┌──────────────┐  ┌────────┴─────────┐  ┌───────────────────────┐      │
//! │  │    Vault     │  │     Crypto       │  │      Envelope         │      │
//! │  │              │  │                  │  │                       │      │
//! │  │ - Argon2id   │  │ - NaCl box       │  │ - Two-part text       │      │
//! │  │ - Legacy     │  │ - NaCl secretbox │  │ - Fan-out JSON        │      │
//! │  │   SHA-512    │  │ - Ed25519        │  │ - Versioned frame     │      │
//! │  └──────────────┘  └──────────────────┘  └───────────────────────┘      │
//! │                                                                         │
//! │  Seams: KeyDirectory (async, public keys)   KeyStore (wrapped blobs)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`crypto`] - Cryptographic primitives (keys, ciphers, signing, KDF)
//! - [`envelope`] - Envelope types and their string encodings
//! - [`vault`] - Password wrapping of key material at rest
//! - [`session`] - The active key pair slot
//! - [`directory`] / [`storage`] - External collaborator seams
//! - [`account`] - Sign-up, unlock, password change, log-out
//! - [`messaging`] - Sealing and opening conversation messages
//! - [`config`] - Configuration
//!
//! ## Interoperability
//!
//! Envelopes and legacy key blobs are byte-compatible with tweetnacl, so
//! existing web clients and this core can read each other's data.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod account;
pub mod config;
pub mod crypto;
pub mod directory;
pub mod encoding;
pub mod envelope;
pub mod error;
pub mod messaging;
pub mod session;
pub mod storage;
pub mod vault;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use account::AccountService;
pub use config::{CoreConfig, VaultConfig};
pub use crypto::{KeyPair, PublicKeys, Signature, SymmetricKey};
pub use directory::{KeyDirectory, MemoryDirectory};
pub use envelope::{EncryptedEnvelope, Envelope, RecipientId};
pub use error::{Error, Result};
pub use messaging::{ConversationCipher, IncomingMessage, OpenedMessage};
pub use session::Session;
pub use storage::{KeyStore, MemoryKeyStore};
pub use vault::{Vault, WrappedPrivateKey};

// ============================================================================
// CORE CONTEXT
// ============================================================================

use std::sync::Arc;

/// One client's core: a session plus the collaborators it talks to
///
/// ## Lifecycle
///
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                        HUSH CORE LIFECYCLE                              │
/// ├─────────────────────────────────────────────────────────────────────────┤
/// │                                                                         │
/// │  1. HushCore::new(config, directory, store)     session locked          │
/// │  2. account().sign_up(..) or account().unlock(..)  session unlocked     │
/// │  3. conversations().seal_* / open*                                      │
/// │  4. account().lock() or account().log_out()     session locked          │
/// │                                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
///
/// There is no global instance. Services handed out by one `HushCore`
/// share its session.
pub struct HushCore {
    config: CoreConfig,
    session: Arc<Session>,
    directory: Arc<dyn KeyDirectory>,
    store: Arc<dyn KeyStore>,
}

impl HushCore {
    /// Create a core with a locked session
    pub fn new(
        config: CoreConfig,
        directory: Arc<dyn KeyDirectory>,
        store: Arc<dyn KeyStore>,
    ) -> Self {
        tracing::info!("Initializing Hush Core v{}", version());
        if config.verbose_logging {
            tracing::debug!(?config, "Core configuration");
        }

        Self {
            config,
            session: Arc::new(Session::new()),
            directory,
            store,
        }
    }

    /// Create a core backed by in-memory collaborators
    pub fn in_memory(config: CoreConfig) -> Self {
        Self::new(
            config,
            Arc::new(MemoryDirectory::new()),
            Arc::new(MemoryKeyStore::new()),
        )
    }

    /// The configuration this core was built with
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// The shared session
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The user directory
    pub fn directory(&self) -> &Arc<dyn KeyDirectory> {
        &self.directory
    }

    /// A vault using the configured derivation
    pub fn vault(&self) -> Vault {
        Vault::new(self.config.vault)
    }

    /// Account lifecycle bound to this core's session
    pub fn account(&self) -> AccountService {
        AccountService::new(
            &self.config,
            Arc::clone(&self.directory),
            Arc::clone(&self.store),
            Arc::clone(&self.session),
        )
    }

    /// Conversation cipher bound to this core's session
    pub fn conversations(&self) -> ConversationCipher {
        ConversationCipher::new(Arc::clone(&self.session), Arc::clone(&self.directory))
    }
}

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Hush Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================
