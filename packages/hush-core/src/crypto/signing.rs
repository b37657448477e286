//! # Detached Signatures
//!
//! Ed25519 detached signatures, byte-compatible with `nacl.sign.detached`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       DETACHED SIGNATURES                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  sign(signing_pair, message)          → 64-byte signature               │
//! │  verify(public_key, message, sig)     → Ok(()) | VerificationFailed     │
//! │                                                                         │
//! │  The signature travels next to the message, base64 encoded. The         │
//! │  message itself is not embedded.                                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ed25519 is deterministic: the same key and message always produce the
//! same signature.

use ed25519_dalek::{Signature as Ed25519Signature, Signer, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use super::SigningKeyPair;
use crate::encoding::{base64_array, from_base64, to_base64};
use crate::error::{Error, Result};

/// Size of an Ed25519 signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// An Ed25519 detached signature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(#[serde(with = "base64_array")] pub [u8; SIGNATURE_SIZE]);

impl Signature {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice (must be exactly 64 bytes)
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; SIGNATURE_SIZE] = slice.try_into().map_err(|_| {
            Error::InvalidKey(format!(
                "Signature must be {} bytes, got {}",
                SIGNATURE_SIZE,
                slice.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    /// Encode as base64, the form other clients exchange
    pub fn to_base64(&self) -> String {
        to_base64(&self.0)
    }

    /// Decode from base64
    pub fn from_base64(encoded: &str) -> Result<Self> {
        Self::from_slice(&from_base64(encoded)?)
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Sign a message with the signing half of a key pair
pub fn sign(keypair: &SigningKeyPair, message: &[u8]) -> Signature {
    let sig = keypair.signing_key().sign(message);
    Signature(sig.to_bytes())
}

/// Verify a detached signature
///
/// Returns `Err(VerificationFailed)` for a bad signature and `InvalidKey`
/// when the public key is not a valid Ed25519 point.
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &Signature) -> Result<()> {
    let verifying_key = VerifyingKey::from_bytes(public_key)
        .map_err(|e| Error::InvalidKey(format!("Invalid public key: {}", e)))?;

    let sig = Ed25519Signature::from_bytes(&signature.0);

    verifying_key
        .verify(message, &sig)
        .map_err(|_| Error::VerificationFailed)
}

// ============================================================================
// TESTS
// ============================================================================
