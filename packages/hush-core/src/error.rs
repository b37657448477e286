//! # Error Handling
//!
//! Error types for Hush Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                      │
//! │  │                                                                      │
//! │  ├── Session Errors (100-199)                                           │
//! │  │   └── KeyUnavailable        - No key pair loaded in the session      │
//! │  │                                                                      │
//! │  ├── Crypto Errors (200-299)                                            │
//! │  │   ├── EncryptionFailed      - Primitive rejected key/nonce input     │
//! │  │   ├── DecryptionFailed      - Authentication tag did not verify      │
//! │  │   ├── InvalidKey            - Malformed key material                 │
//! │  │   ├── VerificationFailed    - Signature did not verify               │
//! │  │   └── KeyDerivationFailed   - KDF rejected its parameters            │
//! │  │                                                                      │
//! │  ├── Vault Errors (300-399)                                             │
//! │  │   └── UnwrapFailed          - Wrong password or corrupted blob       │
//! │  │                                                                      │
//! │  ├── Codec Errors (400-499)                                             │
//! │  │   └── Parse                 - Malformed envelope or blob encoding    │
//! │  │                                                                      │
//! │  ├── Collaborator Errors (500-599)                                      │
//! │  │   ├── RecipientNotFound     - Directory has no keys for identity     │
//! │  │   └── Storage               - Key store failure                      │
//! │  │                                                                      │
//! │  └── Internal Errors (900-999)                                          │
//! │      └── Serialization         - JSON (de)serialization failure         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation
//!
//! Every cryptographic failure is returned as a typed `Err`. Nothing is
//! coerced into an empty string or a `None` that could be mistaken for a
//! valid empty message. The caller decides what the user sees (for example
//! rendering `[unable to decrypt]` inline).

use thiserror::Error;

/// Result type alias for Hush Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Hush Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Session Errors (100-199)
    // ========================================================================
    /// An operation needed the active key pair but none is loaded
    #[error("No key pair loaded. Unlock the session first.")]
    KeyUnavailable,

    // ========================================================================
    // Crypto Errors (200-299)
    // ========================================================================
    /// The primitive rejected the inputs (usually a malformed key length)
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Ciphertext failed integrity verification
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Invalid key format or length
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Signature verification failed
    #[error("Signature verification failed")]
    VerificationFailed,

    /// Password key derivation failed
    #[error("Failed to derive key: {0}")]
    KeyDerivationFailed(String),

    // ========================================================================
    // Vault Errors (300-399)
    // ========================================================================
    /// Wrong password or corrupted stored blob
    #[error("Unable to unlock key material: wrong password or corrupted data")]
    UnwrapFailed,

    // ========================================================================
    // Codec Errors (400-499)
    // ========================================================================
    /// Malformed envelope or blob encoding
    #[error("Parse error: {0}")]
    Parse(String),

    // ========================================================================
    // Collaborator Errors (500-599)
    // ========================================================================
    /// The user directory has no published keys for this identity
    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    /// The key store failed to read or write
    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Session
    /// - 200-299: Crypto
    /// - 300-399: Vault
    /// - 400-499: Codec
    /// - 500-599: External collaborators
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            Error::KeyUnavailable => 100,

            Error::EncryptionFailed(_) => 200,
            Error::DecryptionFailed(_) => 201,
            Error::InvalidKey(_) => 202,
            Error::VerificationFailed => 203,
            Error::KeyDerivationFailed(_) => 204,

            Error::UnwrapFailed => 300,

            Error::Parse(_) => 400,

            Error::RecipientNotFound(_) => 500,
            Error::Storage(_) => 501,

            Error::Serialization(_) => 900,
        }
    }

    /// Check if this error is recoverable
    ///
    /// A recoverable error affects a single message or attempt; the rest of
    /// the conversation (or a retry) can proceed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DecryptionFailed(_) | Error::UnwrapFailed | Error::RecipientNotFound(_)
        )
    }

    /// Check if this error requires user action
    ///
    /// `UnwrapFailed` means "prompt for the password again", not "recover
    /// the account".
    pub fn requires_user_action(&self) -> bool {
        matches!(self, Error::KeyUnavailable | Error::UnwrapFailed)
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Parse(format!("invalid base64: {}", err))
    }
}

// ============================================================================
// TESTS
// ============================================================================
