//! # Key Management
//!
//! Key generation and the public projection that gets published to the
//! user directory.
//!
//! ## Key Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          KEY TYPES                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  BoxKeyPair (X25519)                                                    │
//! │  • Direct-message encryption (NaCl box)                                 │
//! │  • Wrapping group keys for each member                                  │
//! │  • Secret: 32 bytes, Public: 32 bytes                                   │
//! │                                                                         │
//! │  SigningKeyPair (Ed25519)                                               │
//! │  • Detached signatures                                                  │
//! │  • Secret exported as 64 bytes (seed || public), the NaCl layout        │
//! │                                                                         │
//! │  SymmetricKey                                                           │
//! │  • One per group conversation, 32 random bytes                          │
//! │                                                                         │
//! │  All secret material is zeroized on drop.                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use crypto_box::{PublicKey as BoxPublicKey, SecretKey as BoxSecretKey};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::kdf::compute_key_fingerprint;
use super::KEY_SIZE;
use crate::encoding::{base64_array, from_base64, to_base64};
use crate::error::{Error, Result};

/// Combined keypair containing both box and signing keys
///
/// ## Security
///
/// - Private keys are zeroized when this struct is dropped
/// - Public keys can be safely shared with anyone
#[derive(ZeroizeOnDrop)]
pub struct KeyPair {
    /// X25519 keypair for encryption
    pub encryption: BoxKeyPair,
    /// Ed25519 keypair for signing
    pub signing: SigningKeyPair,
}

impl KeyPair {
    /// Generate a new random keypair
    ///
    /// Uses the operating system's secure random number generator.
    /// Nothing is persisted.
    pub fn generate() -> Self {
        Self {
            encryption: BoxKeyPair::generate(),
            signing: SigningKeyPair::generate(),
        }
    }

    /// Assemble a keypair from already-validated halves
    pub fn from_parts(encryption: BoxKeyPair, signing: SigningKeyPair) -> Self {
        Self {
            encryption,
            signing,
        }
    }

    /// Get the public keys for sharing with others
    pub fn public_keys(&self) -> PublicKeys {
        PublicKeys {
            encryption: self.encryption.public_bytes(),
            signing: self.signing.public_bytes(),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_keys())
            .finish_non_exhaustive()
    }
}

/// Generate a fresh key pair for a user or device
pub fn generate_key_pair() -> KeyPair {
    KeyPair::generate()
}

/// Project a key pair onto its publishable halves
pub fn export_public_keys(pair: &KeyPair) -> PublicKeys {
    pair.public_keys()
}

/// X25519 keypair used by NaCl box
#[derive(ZeroizeOnDrop)]
pub struct BoxKeyPair {
    /// Private box key (secret)
    #[zeroize(skip)] // crypto_box::SecretKey zeroizes itself on drop
    secret: BoxSecretKey,
    /// Public box key (derived from secret)
    #[zeroize(skip)]
    public: BoxPublicKey,
}

impl BoxKeyPair {
    /// Generate a new random box keypair
    pub fn generate() -> Self {
        let mut secret_bytes = Zeroizing::new([0u8; KEY_SIZE]);
        OsRng.fill_bytes(&mut secret_bytes[..]);
        Self::from_secret_bytes(&secret_bytes)
    }

    /// Create from raw secret bytes
    pub fn from_secret_bytes(bytes: &[u8; KEY_SIZE]) -> Self {
        let secret = BoxSecretKey::from(*bytes);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Create from a secret slice, checking the length
    pub fn from_secret_slice(bytes: &[u8]) -> Result<Self> {
        let array: Zeroizing<[u8; KEY_SIZE]> = Zeroizing::new(
            bytes
                .try_into()
                .map_err(|_| Error::InvalidKey(format!(
                    "Box secret key must be {} bytes, got {}",
                    KEY_SIZE,
                    bytes.len()
                )))?,
        );
        Ok(Self::from_secret_bytes(&array))
    }

    /// Get the secret key bytes (for wrapping/storage)
    ///
    /// ## Security Warning
    ///
    /// Only use this for secure storage. Never log or transmit these bytes.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; KEY_SIZE]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    /// Get the public key bytes
    pub fn public_bytes(&self) -> [u8; KEY_SIZE] {
        *self.public.as_bytes()
    }
}

/// Ed25519 signing keypair
#[derive(ZeroizeOnDrop)]
pub struct SigningKeyPair {
    /// Private signing key (secret)
    #[zeroize(skip)] // ed25519_dalek::SigningKey handles its own zeroization
    secret: SigningKey,
}

impl SigningKeyPair {
    /// Generate a new random signing keypair
    pub fn generate() -> Self {
        let secret = SigningKey::generate(&mut OsRng);
        Self { secret }
    }

    /// Create from a 32-byte seed
    pub fn from_bytes(bytes: &[u8; KEY_SIZE]) -> Self {
        Self {
            secret: SigningKey::from_bytes(bytes),
        }
    }

    /// Create from either a 32-byte seed or a 64-byte NaCl secret key
    ///
    /// The 64-byte form embeds the public key; it must match the seed.
    pub fn from_secret_slice(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            32 => {
                let seed: Zeroizing<[u8; 32]> = Zeroizing::new(
                    bytes
                        .try_into()
                        .map_err(|_| Error::InvalidKey("Invalid signing seed".into()))?,
                );
                Ok(Self::from_bytes(&seed))
            }
            64 => {
                let keypair: Zeroizing<[u8; 64]> = Zeroizing::new(
                    bytes
                        .try_into()
                        .map_err(|_| Error::InvalidKey("Invalid signing keypair".into()))?,
                );
                let secret = SigningKey::from_keypair_bytes(&keypair).map_err(|e| {
                    Error::InvalidKey(format!("Signing keypair mismatch: {}", e))
                })?;
                Ok(Self { secret })
            }
            n => Err(Error::InvalidKey(format!(
                "Signing secret key must be 32 or 64 bytes, got {}",
                n
            ))),
        }
    }

    /// Get the secret key in the NaCl 64-byte layout (seed || public)
    ///
    /// ## Security Warning
    ///
    /// Only use this for secure storage. Never log or transmit these bytes.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 64]> {
        Zeroizing::new(self.secret.to_keypair_bytes())
    }

    /// Get the public key bytes
    pub fn public_bytes(&self) -> [u8; KEY_SIZE] {
        self.secret.verifying_key().to_bytes()
    }

    /// Get the verifying key for signature verification
    pub fn verifying_key(&self) -> VerifyingKey {
        self.secret.verifying_key()
    }

    /// Get reference to the signing key
    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.secret
    }
}

/// Public keys that can be safely published to the user directory
///
/// Serialized as `{"publicEncryptionKey": "<base64>", "publicSigningKey":
/// "<base64>"}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PublicKeys {
    /// X25519 public key for encryption (32 bytes)
    #[serde(rename = "publicEncryptionKey", with = "base64_array")]
    pub encryption: [u8; KEY_SIZE],

    /// Ed25519 public key for signature verification (32 bytes)
    #[serde(rename = "publicSigningKey", with = "base64_array")]
    pub signing: [u8; KEY_SIZE],
}

impl PublicKeys {
    /// Create from raw bytes
    pub fn from_bytes(encryption: [u8; KEY_SIZE], signing: [u8; KEY_SIZE]) -> Self {
        Self {
            encryption,
            signing,
        }
    }

    /// Parse published base64 keys
    pub fn from_base64(encryption: &str, signing: &str) -> Result<Self> {
        Ok(Self {
            encryption: Self::decode_encryption_key(encryption)?,
            signing: Self::decode_signing_key(signing)?,
        })
    }

    /// Decode one published base64 encryption key
    pub fn decode_encryption_key(encoded: &str) -> Result<[u8; KEY_SIZE]> {
        decode_public_key(encoded, "encryption")
    }

    /// Decode one published base64 signing key
    pub fn decode_signing_key(encoded: &str) -> Result<[u8; KEY_SIZE]> {
        decode_public_key(encoded, "signing")
    }

    /// Base64 form of the encryption key
    pub fn public_encryption_key(&self) -> String {
        to_base64(&self.encryption)
    }

    /// Base64 form of the signing key
    pub fn public_signing_key(&self) -> String {
        to_base64(&self.signing)
    }

    /// Get the verifying key for signature verification
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(&self.signing)
            .map_err(|e| Error::InvalidKey(format!("Invalid signing public key: {}", e)))
    }

    /// Hex fingerprint for out-of-band comparison
    pub fn fingerprint(&self) -> String {
        compute_key_fingerprint(&self.encryption, &self.signing)
    }
}

fn decode_public_key(encoded: &str, which: &str) -> Result<[u8; KEY_SIZE]> {
    let bytes = from_base64(encoded)
        .map_err(|e| Error::InvalidKey(format!("Invalid {} public key: {}", which, e)))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        Error::InvalidKey(format!(
            "{} public key must be {} bytes, got {}",
            which, KEY_SIZE, len
        ))
    })
}

/// A 32-byte symmetric key for one group conversation
///
/// Never stored unencrypted outside runtime memory; zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Generate a random key from the OS RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice (must be exactly 32 bytes)
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_SIZE] = slice.try_into().map_err(|_| {
            Error::InvalidKey(format!(
                "Symmetric key must be {} bytes, got {}",
                KEY_SIZE,
                slice.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

// ============================================================================
// TESTS
// ============================================================================
