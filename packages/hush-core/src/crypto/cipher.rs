//! # Message Cipher
//!
//! Seals and opens single payloads in the two conversation modes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         MESSAGE CIPHER                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Direct (NaCl box)                                                      │
//! │  ─────────────────                                                      │
//! │  shared = X25519(sender_secret, recipient_public)                       │
//! │  ct     = XSalsa20-Poly1305(shared, nonce, plaintext)                   │
//! │  The recipient opens with (sender_public, recipient_secret).            │
//! │                                                                         │
//! │  Group (NaCl secretbox)                                                 │
//! │  ──────────────────────                                                 │
//! │  ct     = XSalsa20-Poly1305(group_key, nonce, plaintext)                │
//! │                                                                         │
//! │  Fan-out                                                                │
//! │  ───────                                                                │
//! │  The same plaintext boxed once per recipient public key, each with      │
//! │  its own nonce.                                                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call draws a fresh 24-byte nonce from the OS RNG. A failed open is
//! always `Err(DecryptionFailed)`; an empty plaintext is `Ok(vec![])`.

use std::collections::BTreeMap;

use crypto_box::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    PublicKey as BoxPublicKey, SalsaBox, SecretKey as BoxSecretKey,
};
use crypto_secretbox::XSalsa20Poly1305;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::{SymmetricKey, KEY_SIZE, NONCE_SIZE};
use crate::envelope::{EncryptedEnvelope, RecipientId};
use crate::error::{Error, Result};

/// Generate a fresh random nonce
pub fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

// ============================================================================
// DIRECT MODE
// ============================================================================

/// Seal `plaintext` for one recipient with NaCl box
///
/// Both keys are raw 32-byte X25519 keys. A wrong length is
/// `EncryptionFailed`.
pub fn encrypt_asymmetric(
    plaintext: &[u8],
    recipient_public_key: &[u8],
    sender_secret_key: &[u8],
) -> Result<EncryptedEnvelope> {
    let salsa_box = salsa_box(recipient_public_key, sender_secret_key)
        .map_err(Error::EncryptionFailed)?;

    let nonce = random_nonce();
    let ciphertext = salsa_box
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|_| Error::EncryptionFailed("box encryption failed".into()))?;

    Ok(EncryptedEnvelope { nonce, ciphertext })
}

/// Open a box sealed by `sender_public_key` for the holder of
/// `recipient_secret_key`
pub fn decrypt_asymmetric(
    envelope: &EncryptedEnvelope,
    sender_public_key: &[u8],
    recipient_secret_key: &[u8],
) -> Result<Vec<u8>> {
    let salsa_box = salsa_box(sender_public_key, recipient_secret_key)
        .map_err(Error::DecryptionFailed)?;

    salsa_box
        .decrypt(
            GenericArray::from_slice(&envelope.nonce),
            envelope.ciphertext.as_slice(),
        )
        .map_err(|_| Error::DecryptionFailed("authentication failed".into()))
}

/// Open a direct message and decode it as UTF-8
pub fn decrypt_asymmetric_text(
    envelope: &EncryptedEnvelope,
    sender_public_key: &[u8],
    recipient_secret_key: &[u8],
) -> Result<String> {
    utf8(decrypt_asymmetric(
        envelope,
        sender_public_key,
        recipient_secret_key,
    )?)
}

/// Seal the same plaintext independently for each recipient
///
/// Returns one envelope per recipient id, each under its own nonce. Fails
/// on the first recipient whose public key is malformed.
pub fn encrypt_for_recipients<I, K, P>(
    plaintext: &[u8],
    recipients: I,
    sender_secret_key: &[u8],
) -> Result<BTreeMap<RecipientId, EncryptedEnvelope>>
where
    I: IntoIterator<Item = (K, P)>,
    K: Into<RecipientId>,
    P: AsRef<[u8]>,
{
    recipients
        .into_iter()
        .map(|(id, public_key)| {
            let envelope = encrypt_asymmetric(plaintext, public_key.as_ref(), sender_secret_key)?;
            Ok((id.into(), envelope))
        })
        .collect()
}

fn salsa_box(public_key: &[u8], secret_key: &[u8]) -> std::result::Result<SalsaBox, String> {
    let public: [u8; KEY_SIZE] = public_key.try_into().map_err(|_| {
        format!(
            "public key must be {} bytes, got {}",
            KEY_SIZE,
            public_key.len()
        )
    })?;
    let secret: Zeroizing<[u8; KEY_SIZE]> =
        Zeroizing::new(secret_key.try_into().map_err(|_| {
            format!(
                "secret key must be {} bytes, got {}",
                KEY_SIZE,
                secret_key.len()
            )
        })?);

    Ok(SalsaBox::new(
        &BoxPublicKey::from(public),
        &BoxSecretKey::from(*secret),
    ))
}

// ============================================================================
// GROUP MODE
// ============================================================================

/// Seal `plaintext` under a group key with NaCl secretbox
pub fn encrypt_symmetric(plaintext: &[u8], key: &SymmetricKey) -> Result<EncryptedEnvelope> {
    seal_secretbox(key.as_bytes(), plaintext)
}

/// Open a secretbox sealed under `key`
pub fn decrypt_symmetric(envelope: &EncryptedEnvelope, key: &SymmetricKey) -> Result<Vec<u8>> {
    open_secretbox(key.as_bytes(), envelope)
}

/// Open a group message and decode it as UTF-8
pub fn decrypt_symmetric_text(envelope: &EncryptedEnvelope, key: &SymmetricKey) -> Result<String> {
    utf8(decrypt_symmetric(envelope, key)?)
}

/// Secretbox seal under raw key bytes
///
/// Shared with the vault, which seals under a password-derived key.
pub(crate) fn seal_secretbox(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<EncryptedEnvelope> {
    let cipher = XSalsa20Poly1305::new(GenericArray::from_slice(key));

    let nonce = random_nonce();
    let ciphertext = cipher
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|_| Error::EncryptionFailed("secretbox encryption failed".into()))?;

    Ok(EncryptedEnvelope { nonce, ciphertext })
}

/// Secretbox open under raw key bytes
pub(crate) fn open_secretbox(key: &[u8; KEY_SIZE], envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
    let cipher = XSalsa20Poly1305::new(GenericArray::from_slice(key));

    cipher
        .decrypt(
            GenericArray::from_slice(&envelope.nonce),
            envelope.ciphertext.as_slice(),
        )
        .map_err(|_| Error::DecryptionFailed("authentication failed".into()))
}

fn utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|_| Error::DecryptionFailed("plaintext is not valid UTF-8".into()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::BoxKeyPair;

    #[test]
    fn test_direct_round_trip() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();

        let envelope = encrypt_asymmetric(
            b"Hello Bob!",
            &bob.public_bytes(),
            &alice.secret_bytes()[..],
        )
        .unwrap();
        let plaintext =
            decrypt_asymmetric(&envelope, &alice.public_bytes(), &bob.secret_bytes()[..]).unwrap();

        assert_eq!(plaintext, b"Hello Bob!");
        assert_eq!(envelope.ciphertext.len(), 10 + crate::crypto::TAG_SIZE);
    }

    #[test]
    fn test_direct_empty_plaintext_is_not_failure() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();

        let envelope =
            encrypt_asymmetric(b"", &bob.public_bytes(), &alice.secret_bytes()[..]).unwrap();
        let opened =
            decrypt_asymmetric(&envelope, &alice.public_bytes(), &bob.secret_bytes()[..]).unwrap();

        assert!(opened.is_empty());
    }

    #[test]
    fn test_direct_wrong_recipient_fails() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();
        let eve = BoxKeyPair::generate();

        let envelope =
            encrypt_asymmetric(b"secret", &bob.public_bytes(), &alice.secret_bytes()[..]).unwrap();
        let result = decrypt_asymmetric(&envelope, &alice.public_bytes(), &eve.secret_bytes()[..]);

        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_direct_bad_key_length() {
        let alice = BoxKeyPair::generate();

        let result = encrypt_asymmetric(b"hi", &[0u8; 31], &alice.secret_bytes()[..]);
        assert!(matches!(result, Err(Error::EncryptionFailed(_))));

        let envelope = EncryptedEnvelope::new([0u8; NONCE_SIZE], vec![0u8; 20]);
        let result = decrypt_asymmetric(&envelope, &alice.public_bytes(), &[0u8; 16]);
        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_direct_tampering_fails_closed() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();
        let envelope =
            encrypt_asymmetric(b"transfer 10", &bob.public_bytes(), &alice.secret_bytes()[..])
                .unwrap();

        for i in 0..envelope.ciphertext.len() {
            let mut tampered = envelope.clone();
            tampered.ciphertext[i] ^= 0x01;
            assert!(decrypt_asymmetric(&tampered, &alice.public_bytes(), &bob.secret_bytes()[..])
                .is_err());
        }

        let mut tampered = envelope;
        tampered.nonce[0] ^= 0x80;
        assert!(
            decrypt_asymmetric(&tampered, &alice.public_bytes(), &bob.secret_bytes()[..]).is_err()
        );
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();
        let key = SymmetricKey::generate();

        let e1 = encrypt_asymmetric(b"same", &bob.public_bytes(), &alice.secret_bytes()[..]).unwrap();
        let e2 = encrypt_asymmetric(b"same", &bob.public_bytes(), &alice.secret_bytes()[..]).unwrap();
        assert_ne!(e1.nonce, e2.nonce);
        assert_ne!(e1.ciphertext, e2.ciphertext);

        let g1 = encrypt_symmetric(b"same", &key).unwrap();
        let g2 = encrypt_symmetric(b"same", &key).unwrap();
        assert_ne!(g1.nonce, g2.nonce);
    }

    #[test]
    fn test_group_round_trip() {
        let key = SymmetricKey::generate();

        let envelope = encrypt_symmetric("héllo group".as_bytes(), &key).unwrap();
        assert_eq!(decrypt_symmetric_text(&envelope, &key).unwrap(), "héllo group");
    }

    #[test]
    fn test_group_wrong_key_fails() {
        let envelope = encrypt_symmetric(b"members only", &SymmetricKey::generate()).unwrap();
        let result = decrypt_symmetric(&envelope, &SymmetricKey::generate());

        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_group_tampering_fails_closed() {
        let key = SymmetricKey::generate();
        let mut envelope = encrypt_symmetric(b"members only", &key).unwrap();
        let last = envelope.ciphertext.len() - 1;
        envelope.ciphertext[last] ^= 0x01;

        assert!(decrypt_symmetric(&envelope, &key).is_err());
    }

    #[test]
    fn test_text_helper_rejects_invalid_utf8() {
        let key = SymmetricKey::generate();
        let envelope = encrypt_symmetric(&[0xff, 0xfe, 0xfd], &key).unwrap();

        assert!(decrypt_symmetric(&envelope, &key).is_ok());
        assert!(matches!(
            decrypt_symmetric_text(&envelope, &key),
            Err(Error::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_encrypt_for_recipients() {
        let sender = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();
        let carol = BoxKeyPair::generate();

        let map = encrypt_for_recipients(
            b"hi all",
            [("bob", bob.public_bytes()), ("carol", carol.public_bytes())],
            &sender.secret_bytes()[..],
        )
        .unwrap();

        assert_eq!(map.len(), 2);
        assert_ne!(map["bob"].nonce, map["carol"].nonce);

        let opened =
            decrypt_asymmetric_text(&map["carol"], &sender.public_bytes(), &carol.secret_bytes()[..])
                .unwrap();
        assert_eq!(opened, "hi all");

        // Bob cannot open Carol's entry
        assert!(
            decrypt_asymmetric(&map["carol"], &sender.public_bytes(), &bob.secret_bytes()[..])
                .is_err()
        );
    }

    #[test]
    fn test_encrypt_for_recipients_bad_key_fails() {
        let sender = BoxKeyPair::generate();
        let result = encrypt_for_recipients(
            b"hi",
            [("bob".to_string(), vec![1u8; 5])],
            &sender.secret_bytes()[..],
        );
        assert!(matches!(result, Err(Error::EncryptionFailed(_))));
    }
}
