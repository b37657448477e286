//! # Conversation Cipher
//!
//! Seals and opens chat messages for a conversation, resolving peers'
//! public keys through the [`KeyDirectory`] and using the active
//! [`Session`] for the local secret keys.
//!
//! ## Receiving
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       OPENING A MESSAGE                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Envelope::Direct  → lookup(sender) → box open with my secret key       │
//! │  Envelope::Group   → secretbox open with the conversation key           │
//! │  Envelope::FanOut  → pick entry[me] → lookup(sender) → box open         │
//! │                                                                         │
//! │  Any failure becomes OpenedMessage::Unreadable for that one message.    │
//! │  The rest of the batch still opens.                                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::crypto::{self, Signature, SymmetricKey};
use crate::directory::KeyDirectory;
use crate::envelope::{EncryptedEnvelope, Envelope, RecipientId};
use crate::error::{Error, Result};
use crate::session::Session;

/// Placeholder shown in place of a message that could not be opened
pub const UNREADABLE_PLACEHOLDER: &str = "[unable to decrypt]";

/// A message as received from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Who sent it
    pub sender_id: String,
    /// The sealed content
    pub envelope: Envelope,
}

/// Result of opening one message
#[derive(Debug)]
pub enum OpenedMessage {
    /// Decrypted text
    Readable(String),
    /// The message could not be opened, and why
    Unreadable(Error),
}

impl OpenedMessage {
    /// Text to render: the plaintext, or the placeholder
    pub fn display_text(&self) -> &str {
        match self {
            OpenedMessage::Readable(text) => text,
            OpenedMessage::Unreadable(_) => UNREADABLE_PLACEHOLDER,
        }
    }

    /// Whether the message opened
    pub fn is_readable(&self) -> bool {
        matches!(self, OpenedMessage::Readable(_))
    }
}

impl From<Result<String>> for OpenedMessage {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(text) => OpenedMessage::Readable(text),
            Err(e) => OpenedMessage::Unreadable(e),
        }
    }
}

/// A fan-out message and the members it could not be sealed for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedForMembers {
    /// The per-recipient envelope
    pub envelope: Envelope,
    /// Members with no published keys, left out of the envelope
    pub unreachable: Vec<RecipientId>,
}

/// Seals and opens messages on behalf of the active session
pub struct ConversationCipher {
    session: Arc<Session>,
    directory: Arc<dyn KeyDirectory>,
}

impl ConversationCipher {
    /// Create a conversation cipher
    pub fn new(session: Arc<Session>, directory: Arc<dyn KeyDirectory>) -> Self {
        Self { session, directory }
    }

    // ========================================================================
    // SENDING
    // ========================================================================

    /// Seal a direct message for one user
    pub async fn seal_direct(&self, recipient_id: &str, text: &str) -> Result<Envelope> {
        let recipient = self.directory.lookup(recipient_id).await?;
        let envelope = self
            .session
            .encrypt_direct(text.as_bytes(), &recipient.encryption)?;

        tracing::debug!(recipient_id, "Sealed direct message");
        Ok(Envelope::Direct { envelope })
    }

    /// Seal a group message under the conversation key
    pub fn seal_group(&self, text: &str, key: &SymmetricKey) -> Result<Envelope> {
        let envelope = crypto::encrypt_symmetric(text.as_bytes(), key)?;
        Ok(Envelope::Group { envelope })
    }

    /// Seal the same text once per member
    ///
    /// Include your own id in `members` to be able to read your own
    /// messages later. Members who have not published keys are skipped and
    /// reported in [`SealedForMembers::unreachable`].
    pub async fn seal_for_members(&self, members: &[String], text: &str) -> Result<SealedForMembers> {
        let mut recipients = Vec::with_capacity(members.len());
        let mut unreachable = Vec::new();

        for member in members {
            match self.directory.lookup(member).await {
                Ok(keys) => recipients.push((member.clone(), keys.encryption)),
                Err(Error::RecipientNotFound(_)) => {
                    tracing::warn!(member = member.as_str(), "Member has no published keys, skipping");
                    unreachable.push(member.clone());
                }
                Err(e) => return Err(e),
            }
        }

        let per_recipient = self
            .session
            .encrypt_for_recipients(text.as_bytes(), recipients)?;

        tracing::debug!(recipients = per_recipient.len(), "Sealed fan-out message");
        Ok(SealedForMembers {
            envelope: Envelope::FanOut { per_recipient },
            unreachable,
        })
    }

    /// Box a conversation key for every member
    ///
    /// Unlike [`seal_for_members`](Self::seal_for_members) a member without
    /// keys is an error: they would never be able to read the group.
    pub async fn distribute_group_key(
        &self,
        key: &SymmetricKey,
        members: &[String],
    ) -> Result<BTreeMap<RecipientId, EncryptedEnvelope>> {
        let mut recipients = Vec::with_capacity(members.len());
        for member in members {
            let keys = self.directory.lookup(member).await?;
            recipients.push((member.clone(), keys.encryption));
        }

        self.session.wrap_symmetric_key_for_members(key, recipients)
    }

    /// Recover a conversation key boxed for us by `creator_id`
    pub async fn accept_group_key(
        &self,
        wrapped: &EncryptedEnvelope,
        creator_id: &str,
    ) -> Result<SymmetricKey> {
        let creator = self.directory.lookup(creator_id).await?;
        self.session
            .unwrap_symmetric_key_from(wrapped, &creator.encryption)
    }

    /// Detached signature over `text` with the active signing key
    pub fn sign_text(&self, text: &str) -> Result<Signature> {
        self.session.sign(text.as_bytes())
    }

    /// Verify a detached signature against the sender's published key
    pub async fn verify_from(&self, sender_id: &str, text: &str, signature: &Signature) -> Result<()> {
        let sender = self.directory.lookup(sender_id).await?;
        crypto::verify(&sender.signing, text.as_bytes(), signature)
    }

    // ========================================================================
    // RECEIVING
    // ========================================================================

    /// Open one message addressed to `my_id`
    ///
    /// `group_key` is only needed for group envelopes.
    pub async fn open(
        &self,
        envelope: &Envelope,
        sender_id: &str,
        my_id: &str,
        group_key: Option<&SymmetricKey>,
    ) -> OpenedMessage {
        let opened: OpenedMessage = self
            .try_open(envelope, sender_id, my_id, group_key)
            .await
            .into();

        if let OpenedMessage::Unreadable(e) = &opened {
            tracing::warn!(sender_id, code = e.code(), "Message could not be opened");
        }
        opened
    }

    /// Open a batch of messages, one outcome per message in order
    pub async fn open_batch(
        &self,
        messages: &[IncomingMessage],
        my_id: &str,
        group_key: Option<&SymmetricKey>,
    ) -> Vec<OpenedMessage> {
        let mut opened = Vec::with_capacity(messages.len());
        for message in messages {
            opened.push(
                self.open(&message.envelope, &message.sender_id, my_id, group_key)
                    .await,
            );
        }
        opened
    }

    async fn try_open(
        &self,
        envelope: &Envelope,
        sender_id: &str,
        my_id: &str,
        group_key: Option<&SymmetricKey>,
    ) -> Result<String> {
        match envelope {
            Envelope::Group { envelope } => {
                let key = group_key.ok_or(Error::KeyUnavailable)?;
                crypto::decrypt_symmetric_text(envelope, key)
            }
            Envelope::Direct { .. } | Envelope::FanOut { .. } => {
                let sealed = envelope
                    .envelope_for(my_id)
                    .ok_or_else(|| Error::RecipientNotFound(my_id.to_string()))?;
                let sender = self.directory.lookup(sender_id).await?;
                let plaintext = self.session.decrypt_direct(sealed, &sender.encryption)?;

                String::from_utf8(plaintext)
                    .map_err(|_| Error::DecryptionFailed("plaintext is not valid UTF-8".into()))
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::directory::MemoryDirectory;

    struct Peer {
        id: String,
        cipher: ConversationCipher,
    }

    async fn peer(id: &str, directory: &Arc<MemoryDirectory>) -> Peer {
        let session = Arc::new(Session::new());
        let pair = KeyPair::generate();
        directory.publish(id, pair.public_keys()).await.unwrap();
        session.set_active_key_pair(Some(pair));

        Peer {
            id: id.to_string(),
            cipher: ConversationCipher::new(session, directory.clone()),
        }
    }

    #[tokio::test]
    async fn test_direct_message() {
        let directory = Arc::new(MemoryDirectory::new());
        let alice = peer("alice", &directory).await;
        let bob = peer("bob", &directory).await;

        let envelope = alice.cipher.seal_direct("bob", "hi bob").await.unwrap();
        let opened = bob.cipher.open(&envelope, "alice", &bob.id, None).await;

        assert_eq!(opened.display_text(), "hi bob");
    }

    #[tokio::test]
    async fn test_direct_to_unknown_user() {
        let directory = Arc::new(MemoryDirectory::new());
        let alice = peer("alice", &directory).await;

        let result = alice.cipher.seal_direct("ghost", "hello?").await;
        assert!(matches!(result, Err(Error::RecipientNotFound(_))));
    }

    #[tokio::test]
    async fn test_fan_out_skips_unpublished_members() {
        let directory = Arc::new(MemoryDirectory::new());
        let alice = peer("alice", &directory).await;
        let bob = peer("bob", &directory).await;
        let carol = peer("carol", &directory).await;

        let members = vec![
            "alice".to_string(),
            "bob".to_string(),
            "carol".to_string(),
            "ghost".to_string(),
        ];
        let sealed = alice.cipher.seal_for_members(&members, "hello all").await.unwrap();
        assert_eq!(sealed.unreachable, vec!["ghost".to_string()]);

        for reader in [&alice, &bob, &carol] {
            let opened = reader
                .cipher
                .open(&sealed.envelope, "alice", &reader.id, None)
                .await;
            assert_eq!(opened.display_text(), "hello all");
        }
    }

    #[tokio::test]
    async fn test_fan_out_without_entry_is_unreadable() {
        let directory = Arc::new(MemoryDirectory::new());
        let alice = peer("alice", &directory).await;
        let eve = peer("eve", &directory).await;

        let sealed = alice
            .cipher
            .seal_for_members(&["alice".to_string()], "private")
            .await
            .unwrap();
        let opened = eve.cipher.open(&sealed.envelope, "alice", &eve.id, None).await;

        assert!(!opened.is_readable());
        assert_eq!(opened.display_text(), UNREADABLE_PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_group_message_needs_key() {
        let directory = Arc::new(MemoryDirectory::new());
        let alice = peer("alice", &directory).await;
        let bob = peer("bob", &directory).await;

        let key = crypto::generate_symmetric_key();
        let wrapped = alice
            .cipher
            .distribute_group_key(&key, &["bob".to_string()])
            .await
            .unwrap();
        let bob_key = bob.cipher.accept_group_key(&wrapped["bob"], "alice").await.unwrap();

        let envelope = alice.cipher.seal_group("group hi", &key).unwrap();

        let opened = bob.cipher.open(&envelope, "alice", &bob.id, Some(&bob_key)).await;
        assert_eq!(opened.display_text(), "group hi");

        let opened = bob.cipher.open(&envelope, "alice", &bob.id, None).await;
        assert!(matches!(opened, OpenedMessage::Unreadable(Error::KeyUnavailable)));
    }

    #[tokio::test]
    async fn test_distribute_to_unknown_member_fails() {
        let directory = Arc::new(MemoryDirectory::new());
        let alice = peer("alice", &directory).await;

        let result = alice
            .cipher
            .distribute_group_key(&crypto::generate_symmetric_key(), &["ghost".to_string()])
            .await;
        assert!(matches!(result, Err(Error::RecipientNotFound(_))));
    }

    #[tokio::test]
    async fn test_batch_continues_past_bad_message() {
        let directory = Arc::new(MemoryDirectory::new());
        let alice = peer("alice", &directory).await;
        let bob = peer("bob", &directory).await;

        let first = alice.cipher.seal_direct("bob", "one").await.unwrap();
        let mut second = alice.cipher.seal_direct("bob", "two").await.unwrap();
        if let Envelope::Direct { envelope } = &mut second {
            envelope.ciphertext[0] ^= 0xff;
        }
        let third = alice.cipher.seal_direct("bob", "three").await.unwrap();

        let batch: Vec<IncomingMessage> = [first, second, third]
            .into_iter()
            .map(|envelope| IncomingMessage {
                sender_id: "alice".to_string(),
                envelope,
            })
            .collect();

        let opened = bob.cipher.open_batch(&batch, &bob.id, None).await;
        let texts: Vec<&str> = opened.iter().map(|m| m.display_text()).collect();

        assert_eq!(texts, vec!["one", UNREADABLE_PLACEHOLDER, "three"]);
        assert!(matches!(opened[1], OpenedMessage::Unreadable(Error::DecryptionFailed(_))));
    }

    #[tokio::test]
    async fn test_locked_session_cannot_open() {
        let directory = Arc::new(MemoryDirectory::new());
        let alice = peer("alice", &directory).await;
        let bob = peer("bob", &directory).await;

        let envelope = alice.cipher.seal_direct("bob", "hi").await.unwrap();
        bob.cipher.session.lock();

        let opened = bob.cipher.open(&envelope, "alice", &bob.id, None).await;
        assert!(matches!(opened, OpenedMessage::Unreadable(Error::KeyUnavailable)));
    }

    #[tokio::test]
    async fn test_signature_against_directory() {
        let directory = Arc::new(MemoryDirectory::new());
        let alice = peer("alice", &directory).await;
        let bob = peer("bob", &directory).await;

        let signature = alice.cipher.sign_text("it's me").unwrap();

        assert!(bob.cipher.verify_from("alice", "it's me", &signature).await.is_ok());
        assert!(matches!(
            bob.cipher.verify_from("alice", "it's not", &signature).await,
            Err(Error::VerificationFailed)
        ));
        assert!(bob.cipher.verify_from("bob", "it's me", &signature).await.is_err());
    }
}
