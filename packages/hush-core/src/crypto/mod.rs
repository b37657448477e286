//! # Cryptography Module
//!
//! All cryptographic primitives used by Hush Core.
//!
//! ## Security Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  KeyPair (per user/device)                                              │
//! │  ├── Box keys (X25519)       → direct messages, group key wrapping      │
//! │  └── Signing keys (Ed25519)  → detached signatures                      │
//! │                                                                         │
//! │  Direct mode   : NaCl box       = X25519 + XSalsa20-Poly1305            │
//! │  Group mode    : NaCl secretbox = XSalsa20-Poly1305, 32-byte group key  │
//! │  Key at rest   : NaCl secretbox under a password-derived key            │
//! │                                                                         │
//! │  Every seal uses a fresh random 24-byte nonce. The 16-byte Poly1305     │
//! │  tag travels inside the ciphertext; any bit flip fails closed.          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm Choices
//!
//! | Algorithm | Purpose | Crate |
//! |-----------|---------|-------|
//! | X25519 + XSalsa20-Poly1305 | Direct encryption | `crypto_box` |
//! | XSalsa20-Poly1305 | Group / at-rest encryption | `crypto_secretbox` |
//! | Ed25519 | Signatures | `ed25519-dalek` |
//! | Argon2id | Password hardening | `argon2` |
//! | SHA-512 (truncated) | Legacy password derivation | `sha2` |
//!
//! The NaCl constructions are byte-compatible with tweetnacl, so envelopes
//! and wrapped blobs produced by existing web clients open here and vice
//! versa.

pub(crate) mod cipher;
mod group;
mod kdf;
mod keys;
mod signing;

pub use cipher::{
    decrypt_asymmetric, decrypt_asymmetric_text, decrypt_symmetric, decrypt_symmetric_text,
    encrypt_asymmetric, encrypt_for_recipients, encrypt_symmetric, random_nonce,
};
pub use group::{
    generate_symmetric_key, unwrap_symmetric_key, wrap_symmetric_key_for_members,
    wrap_symmetric_key_for_recipient,
};
pub use kdf::{
    compute_key_fingerprint, derive_password_key, Derivation, KdfParams, MAX_M_COST, MAX_P_COST,
    MAX_T_COST, SALT_SIZE,
};
pub use keys::{
    export_public_keys, generate_key_pair, BoxKeyPair, KeyPair, PublicKeys, SigningKeyPair,
    SymmetricKey,
};
pub use signing::{sign, verify, Signature, SIGNATURE_SIZE};

/// Size of box and symmetric keys in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of public keys in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an XSalsa20 nonce in bytes (192 bits)
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag in bytes
pub const TAG_SIZE: usize = 16;
