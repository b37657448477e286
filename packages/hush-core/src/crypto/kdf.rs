//! # Key Derivation Functions
//!
//! Turns a user password into the 32-byte secretbox key that wraps private
//! key material at rest, and computes public key fingerprints.
//!
//! ## Password Derivation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         PASSWORD → WRAPPING KEY                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Argon2id (default for new blobs)                                       │
//! │  ───────────────────────────────                                        │
//! │  Argon2id(password, salt = 16 random bytes, m, t, p) → 32 bytes         │
//! │  Parameters and salt are recorded in the blob.                          │
//! │                                                                         │
//! │  LegacySha512 (tweetnacl clients)                                       │
//! │  ───────────────────────────────                                        │
//! │  SHA-512(utf8(password))[..32]                                          │
//! │  No salt, no work factor. Kept so existing blobs still unlock.          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, Zeroizing};

use super::KEY_SIZE;
use crate::error::{Error, Result};

/// Size of the Argon2id salt in bytes
pub const SALT_SIZE: usize = 16;

/// Largest Argon2id memory cost (KiB) accepted from a stored blob
pub const MAX_M_COST: u32 = 256 * 1024;

/// Largest Argon2id iteration count accepted from a stored blob
pub const MAX_T_COST: u32 = 16;

/// Largest Argon2id parallelism accepted from a stored blob
pub const MAX_P_COST: u32 = 16;

/// How new blobs derive their wrapping key
///
/// This is configuration: it names the algorithm and work factors but
/// carries no salt. [`Derivation::fresh_params`] draws the salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum Derivation {
    /// Memory-hard Argon2id
    Argon2id {
        /// Memory cost in KiB
        m_cost: u32,
        /// Number of iterations
        t_cost: u32,
        /// Degree of parallelism
        p_cost: u32,
    },
    /// Truncated SHA-512 of the password, as tweetnacl clients do
    LegacySha512,
}

impl Default for Derivation {
    fn default() -> Self {
        Derivation::Argon2id {
            m_cost: Params::DEFAULT_M_COST,
            t_cost: Params::DEFAULT_T_COST,
            p_cost: Params::DEFAULT_P_COST,
        }
    }
}

impl Derivation {
    /// Produce parameters for a new blob, with a fresh random salt
    pub fn fresh_params(&self) -> KdfParams {
        match *self {
            Derivation::Argon2id {
                m_cost,
                t_cost,
                p_cost,
            } => {
                let mut salt = [0u8; SALT_SIZE];
                OsRng.fill_bytes(&mut salt);
                KdfParams::Argon2id {
                    salt,
                    m_cost,
                    t_cost,
                    p_cost,
                }
            }
            Derivation::LegacySha512 => KdfParams::LegacySha512,
        }
    }
}

/// The derivation recorded alongside one wrapped blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfParams {
    /// Truncated SHA-512, no salt
    LegacySha512,
    /// Argon2id with the salt and work factors used at wrap time
    Argon2id {
        /// Random per-blob salt
        salt: [u8; SALT_SIZE],
        /// Memory cost in KiB
        m_cost: u32,
        /// Number of iterations
        t_cost: u32,
        /// Degree of parallelism
        p_cost: u32,
    },
}

/// Derive the 32-byte wrapping key for `password`
///
/// The key lives in a `Zeroizing` buffer and is wiped when the caller drops
/// it at the end of the wrap/unwrap call.
pub fn derive_password_key(password: &str, params: &KdfParams) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);

    match params {
        KdfParams::LegacySha512 => {
            let mut digest = Sha512::digest(password.as_bytes());
            key.copy_from_slice(&digest[..KEY_SIZE]);
            digest.as_mut_slice().zeroize();
        }
        KdfParams::Argon2id {
            salt,
            m_cost,
            t_cost,
            p_cost,
        } => {
            let params = Params::new(*m_cost, *t_cost, *p_cost, Some(KEY_SIZE))
                .map_err(|e| Error::KeyDerivationFailed(format!("Invalid Argon2 parameters: {}", e)))?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password_into(password.as_bytes(), salt, &mut key[..])
                .map_err(|e| Error::KeyDerivationFailed(format!("Argon2 hashing failed: {}", e)))?;
        }
    }

    Ok(key)
}

/// Compute a fingerprint of a user's public keys
///
/// Hex-encoded SHA-256 over `encryption_public || signing_public`. Two
/// users comparing fingerprints out of band can detect a directory that
/// served a substituted key.
pub fn compute_key_fingerprint(encryption_public: &[u8; 32], signing_public: &[u8; 32]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(encryption_public);
    hasher.update(signing_public);
    hex::encode(hasher.finalize())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Small work factors so tests stay fast
    fn cheap_argon2() -> Derivation {
        Derivation::Argon2id {
            m_cost: 64,
            t_cost: 1,
            p_cost: 1,
        }
    }

    #[test]
    fn test_legacy_matches_truncated_sha512() {
        let key = derive_password_key("pw", &KdfParams::LegacySha512).unwrap();
        let digest = Sha512::digest(b"pw");
        assert_eq!(&key[..], &digest[..32]);
    }

    #[test]
    fn test_argon2_deterministic_for_same_salt() {
        let params = cheap_argon2().fresh_params();

        let key1 = derive_password_key("correct horse", &params).unwrap();
        let key2 = derive_password_key("correct horse", &params).unwrap();
        assert_eq!(*key1, *key2);
    }

    #[test]
    fn test_argon2_salt_changes_key() {
        let p1 = cheap_argon2().fresh_params();
        let p2 = cheap_argon2().fresh_params();
        assert_ne!(p1, p2);

        let key1 = derive_password_key("pw", &p1).unwrap();
        let key2 = derive_password_key("pw", &p2).unwrap();
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn test_different_passwords_different_keys() {
        let params = cheap_argon2().fresh_params();
        let key1 = derive_password_key("pw", &params).unwrap();
        let key2 = derive_password_key("wrong", &params).unwrap();
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn test_invalid_argon2_params_rejected() {
        let params = KdfParams::Argon2id {
            salt: [0u8; SALT_SIZE],
            m_cost: 1,
            t_cost: 0,
            p_cost: 1,
        };
        let result = derive_password_key("pw", &params);
        assert!(matches!(result, Err(Error::KeyDerivationFailed(_))));
    }

    #[test]
    fn test_default_derivation_is_argon2id() {
        assert!(matches!(Derivation::default(), Derivation::Argon2id { .. }));
    }

    #[test]
    fn test_fingerprint_stable_and_distinct() {
        let a = compute_key_fingerprint(&[1u8; 32], &[2u8; 32]);
        let b = compute_key_fingerprint(&[1u8; 32], &[2u8; 32]);
        let c = compute_key_fingerprint(&[2u8; 32], &[1u8; 32]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
