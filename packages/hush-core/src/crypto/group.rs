//! # Group Key Distribution
//!
//! Each group conversation has one [`SymmetricKey`]. The creator boxes the
//! raw key bytes once per member so every member can recover it with their
//! own box secret key.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      GROUP KEY FAN-OUT                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  creator: K = generate_symmetric_key()                                  │
//! │                                                                         │
//! │    box(K, bob.pk,   creator.sk)  → envelope["bob"]                      │
//! │    box(K, carol.pk, creator.sk)  → envelope["carol"]                    │
//! │    box(K, dave.pk,  creator.sk)  → envelope["dave"]                     │
//! │                                                                         │
//! │  member: K = open(envelope[me], creator.pk, my.sk)                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Membership changes are not handled here. Whoever changes the member list
//! generates a new key and fans it out again.

use std::collections::BTreeMap;

use zeroize::Zeroizing;

use super::cipher::{decrypt_asymmetric, encrypt_asymmetric, encrypt_for_recipients};
use super::SymmetricKey;
use crate::envelope::{EncryptedEnvelope, RecipientId};
use crate::error::Result;

/// Generate a fresh group key
pub fn generate_symmetric_key() -> SymmetricKey {
    SymmetricKey::generate()
}

/// Box the raw group key bytes for one member
pub fn wrap_symmetric_key_for_recipient(
    key: &SymmetricKey,
    recipient_public_key: &[u8],
    sender_secret_key: &[u8],
) -> Result<EncryptedEnvelope> {
    encrypt_asymmetric(key.as_bytes(), recipient_public_key, sender_secret_key)
}

/// Box the group key for every member, keyed by member id
pub fn wrap_symmetric_key_for_members<I, K, P>(
    key: &SymmetricKey,
    members: I,
    sender_secret_key: &[u8],
) -> Result<BTreeMap<RecipientId, EncryptedEnvelope>>
where
    I: IntoIterator<Item = (K, P)>,
    K: Into<RecipientId>,
    P: AsRef<[u8]>,
{
    encrypt_for_recipients(key.as_bytes(), members, sender_secret_key)
}

/// Recover a group key boxed for us
///
/// Fails with `DecryptionFailed` if the box does not open, or `InvalidKey`
/// if it opens to something other than 32 bytes.
pub fn unwrap_symmetric_key(
    envelope: &EncryptedEnvelope,
    sender_public_key: &[u8],
    recipient_secret_key: &[u8],
) -> Result<SymmetricKey> {
    let raw = Zeroizing::new(decrypt_asymmetric(
        envelope,
        sender_public_key,
        recipient_secret_key,
    )?);
    SymmetricKey::from_slice(&raw)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{encrypt_symmetric, decrypt_symmetric, BoxKeyPair};
    use crate::error::Error;

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let creator = BoxKeyPair::generate();
        let member = BoxKeyPair::generate();
        let key = generate_symmetric_key();

        let wrapped = wrap_symmetric_key_for_recipient(
            &key,
            &member.public_bytes(),
            &creator.secret_bytes()[..],
        )
        .unwrap();
        let recovered =
            unwrap_symmetric_key(&wrapped, &creator.public_bytes(), &member.secret_bytes()[..])
                .unwrap();

        assert_eq!(recovered, key);
    }

    #[test]
    fn test_every_member_recovers_same_key() {
        let creator = BoxKeyPair::generate();
        let members: Vec<(String, BoxKeyPair)> = ["bob", "carol", "dave"]
            .into_iter()
            .map(|name| (name.to_string(), BoxKeyPair::generate()))
            .collect();
        let key = generate_symmetric_key();

        let wrapped = wrap_symmetric_key_for_members(
            &key,
            members.iter().map(|(id, kp)| (id.clone(), kp.public_bytes())),
            &creator.secret_bytes()[..],
        )
        .unwrap();
        assert_eq!(wrapped.len(), 3);

        let message = encrypt_symmetric(b"group hello", &key).unwrap();
        for (id, kp) in &members {
            let recovered =
                unwrap_symmetric_key(&wrapped[id], &creator.public_bytes(), &kp.secret_bytes()[..])
                    .unwrap();
            assert_eq!(decrypt_symmetric(&message, &recovered).unwrap(), b"group hello");
        }
    }

    #[test]
    fn test_outsider_cannot_unwrap() {
        let creator = BoxKeyPair::generate();
        let member = BoxKeyPair::generate();
        let outsider = BoxKeyPair::generate();
        let key = generate_symmetric_key();

        let wrapped = wrap_symmetric_key_for_recipient(
            &key,
            &member.public_bytes(),
            &creator.secret_bytes()[..],
        )
        .unwrap();
        let result =
            unwrap_symmetric_key(&wrapped, &creator.public_bytes(), &outsider.secret_bytes()[..]);

        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_wrong_length_plaintext_is_invalid_key() {
        let creator = BoxKeyPair::generate();
        let member = BoxKeyPair::generate();

        let not_a_key = encrypt_asymmetric(
            b"sixteen bytes!!!",
            &member.public_bytes(),
            &creator.secret_bytes()[..],
        )
        .unwrap();
        let result =
            unwrap_symmetric_key(&not_a_key, &creator.public_bytes(), &member.secret_bytes()[..]);

        assert!(matches!(result, Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_malformed_member_key_rejected() {
        let creator = BoxKeyPair::generate();
        let result = wrap_symmetric_key_for_recipient(
            &generate_symmetric_key(),
            &[0u8; 12],
            &creator.secret_bytes()[..],
        );
        assert!(matches!(result, Err(Error::EncryptionFailed(_))));
    }
}
