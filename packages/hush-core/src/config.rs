//! # Configuration
//!
//! Settings for a [`HushCore`](crate::HushCore) context. Every field has a
//! default, so an empty JSON object is a valid configuration.
//!
//! ```json
//! {
//!   "vault": { "derivation": { "algorithm": "argon2id", "m_cost": 19456, "t_cost": 2, "p_cost": 1 } },
//!   "key_slot": "hush.keypair",
//!   "verbose_logging": false
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::crypto::Derivation;
use crate::error::Result;

/// Default key store slot holding the wrapped key pair bundle
pub const DEFAULT_KEY_SLOT: &str = "hush.keypair";

/// Configuration for the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Key-at-rest vault settings
    pub vault: VaultConfig,
    /// Key store slot for the wrapped bundle
    pub key_slot: String,
    /// Enable verbose logging
    pub verbose_logging: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            vault: VaultConfig::default(),
            key_slot: DEFAULT_KEY_SLOT.to_string(),
            verbose_logging: false,
        }
    }
}

impl CoreConfig {
    /// Load a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// How the vault derives wrapping keys for new blobs
///
/// Unwrapping always follows the derivation recorded in the blob, so
/// changing this never locks out existing users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Derivation for newly wrapped blobs
    pub derivation: Derivation,
}

impl VaultConfig {
    /// Write blobs that tweetnacl-based clients can still read
    pub fn legacy() -> Self {
        Self {
            derivation: Derivation::LegacySha512,
        }
    }
}
