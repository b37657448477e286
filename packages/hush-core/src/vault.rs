//! # Key-At-Rest Vault
//!
//! Seals private key material under a password so it can be persisted and
//! restored at the next unlock.
//!
//! ## Blob Formats
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           WRAPPED KEY FORMATS                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Argon2id (written by default)                                          │
//! │  ─────────────────────────────                                          │
//! │  argon2id$<m>$<t>$<p>$b64(salt)$b64(nonce).b64(ciphertext)              │
//! │                                                                         │
//! │  Legacy (tweetnacl clients, SHA-512 derived key)                        │
//! │  ───────────────────────────────────────────────                        │
//! │  b64(nonce).b64(ciphertext)          two-part form                      │
//! │  b64(nonce || ciphertext)            concatenated form, read only       │
//! │                                                                         │
//! │  ciphertext = secretbox(derive(password), nonce, plaintext)             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Bundle Plaintext
//!
//! ```json
//! {
//!   "boxKeys":  { "publicKey": "<b64>", "secretKey": "<b64 32 bytes>" },
//!   "signKeys": { "publicKey": "<b64>", "secretKey": "<b64 64 bytes>" }
//! }
//! ```
//!
//! A wrong password and a corrupted ciphertext are indistinguishable and
//! both surface as [`Error::UnwrapFailed`]. A blob that cannot even be
//! parsed is an [`Error::Parse`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::config::VaultConfig;
use crate::crypto::cipher::{open_secretbox, seal_secretbox};
use crate::crypto::{
    derive_password_key, BoxKeyPair, KdfParams, KeyPair, SigningKeyPair, MAX_M_COST, MAX_P_COST,
    MAX_T_COST, NONCE_SIZE, SALT_SIZE, TAG_SIZE,
};
use crate::encoding::{from_base64, to_base64};
use crate::envelope::EncryptedEnvelope;
use crate::error::{Error, Result};

const ARGON2ID_PREFIX: &str = "argon2id";
const FIELD_SEPARATOR: char = '$';

// ============================================================================
// WRAPPED PRIVATE KEY
// ============================================================================

/// Private key bytes sealed under a password-derived key
///
/// Round-trips through its string form with `to_string()` / `parse()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedPrivateKey {
    /// How the wrapping key was derived
    pub kdf: KdfParams,
    /// Nonce and secretbox ciphertext
    pub sealed: EncryptedEnvelope,
}

impl fmt::Display for WrappedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kdf {
            KdfParams::LegacySha512 => f.write_str(&self.sealed.to_compact()),
            KdfParams::Argon2id {
                salt,
                m_cost,
                t_cost,
                p_cost,
            } => write!(
                f,
                "{prefix}{sep}{m_cost}{sep}{t_cost}{sep}{p_cost}{sep}{salt}{sep}{sealed}",
                prefix = ARGON2ID_PREFIX,
                sep = FIELD_SEPARATOR,
                salt = to_base64(salt),
                sealed = self.sealed.to_compact(),
            ),
        }
    }
}

impl FromStr for WrappedPrivateKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let is_argon2id = s
            .strip_prefix(ARGON2ID_PREFIX)
            .map_or(false, |rest| rest.starts_with(FIELD_SEPARATOR));
        if is_argon2id {
            return parse_argon2id(s);
        }

        if s.contains('.') {
            return Ok(Self {
                kdf: KdfParams::LegacySha512,
                sealed: EncryptedEnvelope::from_compact(s)?,
            });
        }

        // base64(nonce || ciphertext), as written by the older private key helper
        let combined = from_base64(s)?;
        if combined.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::Parse(format!(
                "wrapped key too short: {} bytes",
                combined.len()
            )));
        }
        let (nonce, ciphertext) = combined.split_at(NONCE_SIZE);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(nonce);

        Ok(Self {
            kdf: KdfParams::LegacySha512,
            sealed: EncryptedEnvelope::new(nonce_bytes, ciphertext.to_vec()),
        })
    }
}

fn parse_argon2id(s: &str) -> Result<WrappedPrivateKey> {
    let fields: Vec<&str> = s.split(FIELD_SEPARATOR).collect();
    let [prefix, m_cost, t_cost, p_cost, salt, sealed] = fields.as_slice() else {
        return Err(Error::Parse(format!(
            "argon2id blob needs 6 '{}'-separated fields, got {}",
            FIELD_SEPARATOR,
            fields.len()
        )));
    };
    if *prefix != ARGON2ID_PREFIX {
        return Err(Error::Parse(format!("unknown blob prefix '{}'", prefix)));
    }

    let salt_bytes = from_base64(salt)?;
    let salt: [u8; SALT_SIZE] = salt_bytes.as_slice().try_into().map_err(|_| {
        Error::Parse(format!(
            "salt must be {} bytes, got {}",
            SALT_SIZE,
            salt_bytes.len()
        ))
    })?;

    Ok(WrappedPrivateKey {
        kdf: KdfParams::Argon2id {
            salt,
            m_cost: parse_cost(m_cost, "m_cost", MAX_M_COST)?,
            t_cost: parse_cost(t_cost, "t_cost", MAX_T_COST)?,
            p_cost: parse_cost(p_cost, "p_cost", MAX_P_COST)?,
        },
        sealed: EncryptedEnvelope::from_compact(sealed)?,
    })
}

// Costs come from the blob itself, so they are capped before any work is done
fn parse_cost(field: &str, name: &str, max: u32) -> Result<u32> {
    let cost: u32 = field
        .parse()
        .map_err(|_| Error::Parse(format!("invalid {} '{}'", name, field)))?;
    if cost > max {
        return Err(Error::Parse(format!("{} {} exceeds limit {}", name, cost, max)));
    }
    Ok(cost)
}

// ============================================================================
// KEY PAIR BUNDLE
// ============================================================================

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
struct KeyPairBundle {
    box_keys: BundleKeys,
    sign_keys: BundleKeys,
}

#[derive(Serialize, Deserialize, Zeroize)]
#[serde(rename_all = "camelCase")]
struct BundleKeys {
    public_key: String,
    secret_key: String,
}

impl KeyPairBundle {
    fn from_key_pair(pair: &KeyPair) -> Self {
        Self {
            box_keys: BundleKeys {
                public_key: to_base64(&pair.encryption.public_bytes()),
                secret_key: to_base64(&pair.encryption.secret_bytes()[..]),
            },
            sign_keys: BundleKeys {
                public_key: to_base64(&pair.signing.public_bytes()),
                secret_key: to_base64(&pair.signing.secret_bytes()[..]),
            },
        }
    }

    fn into_key_pair(self) -> Result<KeyPair> {
        let box_secret = Zeroizing::new(from_base64(&self.box_keys.secret_key)?);
        let encryption = BoxKeyPair::from_secret_slice(&box_secret)?;
        check_public(&self.box_keys.public_key, &encryption.public_bytes(), "box")?;

        let sign_secret = Zeroizing::new(from_base64(&self.sign_keys.secret_key)?);
        let signing = SigningKeyPair::from_secret_slice(&sign_secret)?;
        check_public(&self.sign_keys.public_key, &signing.public_bytes(), "signing")?;

        Ok(KeyPair::from_parts(encryption, signing))
    }
}

fn check_public(encoded: &str, derived: &[u8; 32], which: &str) -> Result<()> {
    if from_base64(encoded)?.as_slice() != derived.as_slice() {
        return Err(Error::InvalidKey(format!(
            "stored {} public key does not match its secret key",
            which
        )));
    }
    Ok(())
}

// ============================================================================
// VAULT
// ============================================================================

/// Wraps and unwraps key material under user passwords
#[derive(Debug, Clone, Copy, Default)]
pub struct Vault {
    config: VaultConfig,
}

impl Vault {
    /// Create a vault writing blobs with the configured derivation
    pub fn new(config: VaultConfig) -> Self {
        Self { config }
    }

    /// The active configuration
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Seal raw private key bytes under `password`
    pub fn wrap_private_key(&self, private_key: &[u8], password: &str) -> Result<WrappedPrivateKey> {
        let kdf = self.config.derivation.fresh_params();
        let key = derive_password_key(password, &kdf)?;
        let sealed = seal_secretbox(&key, private_key)?;

        Ok(WrappedPrivateKey { kdf, sealed })
    }

    /// Recover private key bytes sealed under `password`
    ///
    /// Uses the derivation recorded in the blob, not the configured one.
    pub fn unwrap_private_key(
        &self,
        wrapped: &WrappedPrivateKey,
        password: &str,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let key = derive_password_key(password, &wrapped.kdf)?;
        let plaintext = open_secretbox(&key, &wrapped.sealed).map_err(|_| {
            tracing::warn!("Key unwrap failed: wrong password or corrupted blob");
            Error::UnwrapFailed
        })?;

        Ok(Zeroizing::new(plaintext))
    }

    /// Seal a whole key pair as one string blob
    pub fn wrap_key_pair_bundle(&self, pair: &KeyPair, password: &str) -> Result<String> {
        let bundle = KeyPairBundle::from_key_pair(pair);
        let json = Zeroizing::new(serde_json::to_vec(&bundle)?);

        let wrapped = self.wrap_private_key(&json, password)?;
        tracing::debug!(kdf = kdf_name(&wrapped.kdf), "Wrapped key pair bundle");

        Ok(wrapped.to_string())
    }

    /// Restore a key pair from a blob produced by
    /// [`wrap_key_pair_bundle`](Self::wrap_key_pair_bundle) or by a
    /// tweetnacl client
    pub fn unwrap_key_pair_bundle(&self, blob: &str, password: &str) -> Result<KeyPair> {
        let wrapped: WrappedPrivateKey = blob.parse()?;
        let json = self.unwrap_private_key(&wrapped, password)?;

        let bundle: KeyPairBundle = serde_json::from_slice(&json)
            .map_err(|e| Error::Parse(format!("malformed key pair bundle: {}", e)))?;
        let pair = bundle.into_key_pair()?;

        tracing::debug!(kdf = kdf_name(&wrapped.kdf), "Unwrapped key pair bundle");
        Ok(pair)
    }

    /// Re-seal a bundle under a new password
    ///
    /// The new blob uses the configured derivation, so this also upgrades
    /// legacy blobs.
    pub fn rewrap_bundle(&self, blob: &str, old_password: &str, new_password: &str) -> Result<String> {
        let pair = self.unwrap_key_pair_bundle(blob, old_password)?;
        self.wrap_key_pair_bundle(&pair, new_password)
    }
}

fn kdf_name(kdf: &KdfParams) -> &'static str {
    match kdf {
        KdfParams::LegacySha512 => "legacy_sha512",
        KdfParams::Argon2id { .. } => "argon2id",
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Derivation, KEY_SIZE};

    fn fast_vault() -> Vault {
        Vault::new(VaultConfig {
            derivation: Derivation::Argon2id {
                m_cost: 64,
                t_cost: 1,
                p_cost: 1,
            },
        })
    }

    #[test]
    fn test_wrap_unwrap_private_key() {
        let vault = fast_vault();
        let secret = [42u8; KEY_SIZE];

        let wrapped = vault.wrap_private_key(&secret, "hunter2").unwrap();
        let restored = vault.unwrap_private_key(&wrapped, "hunter2").unwrap();

        assert_eq!(&restored[..], &secret);
    }

    #[test]
    fn test_wrong_password_is_unwrap_failure() {
        let vault = fast_vault();
        let wrapped = vault.wrap_private_key(&[1u8; 32], "right").unwrap();

        let result = vault.unwrap_private_key(&wrapped, "wrong");
        assert!(matches!(result, Err(Error::UnwrapFailed)));
    }

    #[test]
    fn test_corrupted_blob_is_unwrap_failure() {
        let vault = fast_vault();
        let mut wrapped = vault.wrap_private_key(&[1u8; 32], "pw").unwrap();
        wrapped.sealed.ciphertext[3] ^= 0x10;

        assert!(matches!(
            vault.unwrap_private_key(&wrapped, "pw"),
            Err(Error::UnwrapFailed)
        ));
    }

    #[test]
    fn test_argon2id_blob_string_round_trip() {
        let vault = fast_vault();
        let wrapped = vault.wrap_private_key(b"secret bytes", "pw").unwrap();

        let encoded = wrapped.to_string();
        assert!(encoded.starts_with("argon2id$64$1$1$"));

        let parsed: WrappedPrivateKey = encoded.parse().unwrap();
        assert_eq!(parsed, wrapped);
        assert_eq!(&vault.unwrap_private_key(&parsed, "pw").unwrap()[..], b"secret bytes");
    }

    #[test]
    fn test_legacy_blob_string_is_two_part() {
        let vault = Vault::new(VaultConfig::legacy());
        let wrapped = vault.wrap_private_key(b"k", "pw").unwrap();

        let encoded = wrapped.to_string();
        assert_eq!(encoded.matches('.').count(), 1);
        assert!(!encoded.contains('$'));

        let parsed: WrappedPrivateKey = encoded.parse().unwrap();
        assert_eq!(parsed.kdf, KdfParams::LegacySha512);
    }

    #[test]
    fn test_concatenated_legacy_blob_accepted() {
        let vault = Vault::new(VaultConfig::legacy());
        let wrapped = vault.wrap_private_key(b"old private key", "pw").unwrap();

        let mut combined = wrapped.sealed.nonce.to_vec();
        combined.extend_from_slice(&wrapped.sealed.ciphertext);
        let parsed: WrappedPrivateKey = to_base64(&combined).parse().unwrap();

        assert_eq!(
            &vault.unwrap_private_key(&parsed, "pw").unwrap()[..],
            b"old private key"
        );
    }

    #[test]
    fn test_malformed_blobs_are_parse_errors() {
        let cases = [
            "argon2id$64$1$1$AAAA".to_string(),
            "argon2id$x$1$1$AAAAAAAAAAAAAAAAAAAAAA==$AAAA.AAAA".to_string(),
            format!("argon2id$64$1$1${}$AAAA.AAAA", to_base64(&[0u8; 8])),
            "a.b.c".to_string(),
            to_base64(&[0u8; 10]),
            "not base64 at all".to_string(),
        ];

        for blob in cases {
            let result = blob.parse::<WrappedPrivateKey>();
            assert!(matches!(result, Err(Error::Parse(_))), "accepted {:?}", blob);
        }
    }

    #[test]
    fn test_oversized_costs_rejected_before_derivation() {
        let vault = fast_vault();
        let blob = vault
            .wrap_key_pair_bundle(&KeyPair::generate(), "pw")
            .unwrap();
        let fields: Vec<&str> = blob.split('$').collect();

        let tampered = [
            format!("argon2id$4194304$1$1${}${}", fields[4], fields[5]),
            format!("argon2id$64$200000$1${}${}", fields[4], fields[5]),
            format!("argon2id$64$1${}${}${}", MAX_P_COST + 1, fields[4], fields[5]),
        ];
        for blob in tampered {
            assert!(
                matches!(vault.unwrap_key_pair_bundle(&blob, "pw"), Err(Error::Parse(_))),
                "accepted {:?}",
                blob
            );
        }

        let at_limit = format!("argon2id${}$1$1${}${}", MAX_M_COST, fields[4], fields[5]);
        assert!(at_limit.parse::<WrappedPrivateKey>().is_ok());
    }

    #[test]
    fn test_bundle_round_trip() {
        let vault = fast_vault();
        let pair = KeyPair::generate();

        let blob = vault.wrap_key_pair_bundle(&pair, "pw").unwrap();
        let restored = vault.unwrap_key_pair_bundle(&blob, "pw").unwrap();

        assert_eq!(restored.public_keys(), pair.public_keys());
        assert_eq!(
            *restored.encryption.secret_bytes(),
            *pair.encryption.secret_bytes()
        );
        assert_eq!(*restored.signing.secret_bytes(), *pair.signing.secret_bytes());
    }

    #[test]
    fn test_bundle_wrong_password() {
        let vault = fast_vault();
        let blob = vault.wrap_key_pair_bundle(&KeyPair::generate(), "pw").unwrap();

        assert!(matches!(
            vault.unwrap_key_pair_bundle(&blob, "not pw"),
            Err(Error::UnwrapFailed)
        ));
    }

    #[test]
    fn test_bundle_plaintext_layout() {
        let vault = Vault::new(VaultConfig::legacy());
        let pair = KeyPair::generate();
        let blob = vault.wrap_key_pair_bundle(&pair, "pw").unwrap();

        let wrapped: WrappedPrivateKey = blob.parse().unwrap();
        let json = vault.unwrap_private_key(&wrapped, "pw").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();

        assert_eq!(
            value["boxKeys"]["publicKey"],
            serde_json::Value::String(to_base64(&pair.encryption.public_bytes()))
        );
        let sign_secret = value["signKeys"]["secretKey"].as_str().unwrap();
        assert_eq!(from_base64(sign_secret).unwrap().len(), 64);
    }

    #[test]
    fn test_bundle_with_mismatched_public_key_rejected() {
        let vault = Vault::new(VaultConfig::legacy());
        let pair = KeyPair::generate();
        let other = KeyPair::generate();

        let mut bundle = KeyPairBundle::from_key_pair(&pair);
        bundle.box_keys.public_key = to_base64(&other.encryption.public_bytes());
        let json = serde_json::to_vec(&bundle).unwrap();
        let blob = vault.wrap_private_key(&json, "pw").unwrap().to_string();

        assert!(matches!(
            vault.unwrap_key_pair_bundle(&blob, "pw"),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn test_rewrap_changes_password_and_upgrades() {
        let legacy = Vault::new(VaultConfig::legacy());
        let pair = KeyPair::generate();
        let old_blob = legacy.wrap_key_pair_bundle(&pair, "old").unwrap();

        let vault = fast_vault();
        let new_blob = vault.rewrap_bundle(&old_blob, "old", "new").unwrap();
        assert!(new_blob.starts_with("argon2id$"));

        assert!(vault.unwrap_key_pair_bundle(&new_blob, "old").is_err());
        let restored = vault.unwrap_key_pair_bundle(&new_blob, "new").unwrap();
        assert_eq!(restored.public_keys(), pair.public_keys());
    }

    #[test]
    fn test_argon2_vault_reads_legacy_blobs() {
        let legacy_blob = Vault::new(VaultConfig::legacy())
            .wrap_key_pair_bundle(&KeyPair::generate(), "pw")
            .unwrap();

        assert!(fast_vault().unwrap_key_pair_bundle(&legacy_blob, "pw").is_ok());
    }
}
