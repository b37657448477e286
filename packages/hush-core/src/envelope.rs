//! # Envelope Codec
//!
//! The unit exchanged between the core and the message transport, and the
//! string forms it travels in.
//!
//! ## Forms
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ENVELOPE FORMS                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Two-part text form (single envelope)                                   │
//! │  ────────────────────────────────────                                   │
//! │  base64(nonce) "." base64(ciphertext)                                   │
//! │                                                                         │
//! │  Fan-out JSON form (per-recipient map)                                  │
//! │  ─────────────────────────────────────                                  │
//! │  { "<recipientId>": "<two-part>", ... }                                 │
//! │  read also: { "<recipientId>": { "nonce": .., "ciphertext": .. } }      │
//! │                                                                         │
//! │  Versioned binary frame (base64 on the wire)                            │
//! │  ───────────────────────────────────────────                            │
//! │  ┌─────────┬──────┬──────────────────────────────────────────────┐      │
//! │  │ version │ mode │ body                                         │      │
//! │  │  u8 = 1 │  u8  │                                              │      │
//! │  └─────────┴──────┴──────────────────────────────────────────────┘      │
//! │                                                                         │
//! │  mode 1 (direct) / 2 (group):                                           │
//! │    nonce[24] | ct_len u32 BE | ct                                       │
//! │                                                                         │
//! │  mode 3 (fan-out):                                                      │
//! │    count u16 BE | ( id_len u16 BE | id utf-8 | nonce[24] |              │
//! │                     ct_len u32 BE | ct ) * count                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every decoder is the exact inverse of its encoder. Malformed input is an
//! [`Error::Parse`], never a panic and never a partially filled envelope.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::crypto::NONCE_SIZE;
use crate::encoding::{base64_array, base64_vec, from_base64, to_base64};
use crate::error::{Error, Result};

/// Identity of a message recipient in the user directory
pub type RecipientId = String;

/// Current binary frame version
pub const FRAME_VERSION: u8 = 1;

/// Largest accepted decoded frame (16 MiB)
const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const MODE_DIRECT: u8 = 1;
const MODE_GROUP: u8 = 2;
const MODE_FAN_OUT: u8 = 3;

const COMPACT_SEPARATOR: char = '.';

// ============================================================================
// ENCRYPTED ENVELOPE
// ============================================================================

/// One nonce and the ciphertext sealed under it
///
/// The ciphertext carries the 16-byte Poly1305 tag. Envelopes are never
/// mutated after a cipher produces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Fresh random nonce for this encryption
    #[serde(with = "base64_array")]
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext including the authentication tag
    #[serde(with = "base64_vec")]
    pub ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    /// Create from a nonce and ciphertext
    pub fn new(nonce: [u8; NONCE_SIZE], ciphertext: Vec<u8>) -> Self {
        Self { nonce, ciphertext }
    }

    /// Encode as `base64(nonce).base64(ciphertext)`
    pub fn to_compact(&self) -> String {
        format!(
            "{}{}{}",
            to_base64(&self.nonce),
            COMPACT_SEPARATOR,
            to_base64(&self.ciphertext)
        )
    }

    /// Decode the two-part text form
    ///
    /// Exactly one separator is required, the nonce must decode to 24
    /// bytes. An empty ciphertext part is accepted.
    pub fn from_compact(encoded: &str) -> Result<Self> {
        let mut parts = encoded.split(COMPACT_SEPARATOR);
        let (nonce_part, ct_part) = match (parts.next(), parts.next(), parts.next()) {
            (Some(nonce), Some(ct), None) => (nonce, ct),
            _ => {
                return Err(Error::Parse(format!(
                    "expected exactly one '{}' separator",
                    COMPACT_SEPARATOR
                )))
            }
        };

        let nonce = nonce_from_slice(&from_base64(nonce_part)?)?;
        let ciphertext = from_base64(ct_part)?;

        Ok(Self { nonce, ciphertext })
    }
}

fn nonce_from_slice(bytes: &[u8]) -> Result<[u8; NONCE_SIZE]> {
    bytes.try_into().map_err(|_| {
        Error::Parse(format!(
            "nonce must be {} bytes, got {}",
            NONCE_SIZE,
            bytes.len()
        ))
    })
}

/// Encode a per-recipient map as `{"<id>": "<two-part>"}`
pub fn encode_fan_out_json(per_recipient: &BTreeMap<RecipientId, EncryptedEnvelope>) -> Result<String> {
    let compact: BTreeMap<&str, String> = per_recipient
        .iter()
        .map(|(id, envelope)| (id.as_str(), envelope.to_compact()))
        .collect();
    Ok(serde_json::to_string(&compact)?)
}

/// One entry of a fan-out map as stored by either client generation
#[derive(Deserialize)]
#[serde(untagged)]
enum FanOutEntry {
    Compact(String),
    Object(EncryptedEnvelope),
}

/// Decode the fan-out JSON form
///
/// Entries may be two-part strings or `{"nonce", "ciphertext"}` objects
/// with base64 fields; both shapes can mix in one map.
pub fn decode_fan_out_json(json: &str) -> Result<BTreeMap<RecipientId, EncryptedEnvelope>> {
    let entries: BTreeMap<String, FanOutEntry> = serde_json::from_str(json)
        .map_err(|e| Error::Parse(format!("invalid fan-out map: {}", e)))?;

    entries
        .into_iter()
        .map(|(id, entry)| {
            let envelope = match entry {
                FanOutEntry::Compact(encoded) => EncryptedEnvelope::from_compact(&encoded)?,
                FanOutEntry::Object(envelope) => envelope,
            };
            Ok((id, envelope))
        })
        .collect()
}

// ============================================================================
// TAGGED ENVELOPE
// ============================================================================

/// A transport unit, tagged with how it was sealed
///
/// The tag tells the receiver which key to open it with: the sender's box
/// key for `Direct`, the conversation's group key for `Group`, and its own
/// entry of the map for `FanOut`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Envelope {
    /// Sealed with NaCl box for one recipient
    Direct {
        /// The sealed message
        envelope: EncryptedEnvelope,
    },
    /// Sealed with NaCl secretbox under a group key
    Group {
        /// The sealed message
        envelope: EncryptedEnvelope,
    },
    /// The same plaintext sealed once per recipient
    FanOut {
        /// Envelope per recipient id
        per_recipient: BTreeMap<RecipientId, EncryptedEnvelope>,
    },
}

impl Envelope {
    /// Get the envelope intended for `recipient`
    ///
    /// Direct and group envelopes are returned as-is; a fan-out map yields
    /// the recipient's own entry, if any.
    pub fn envelope_for(&self, recipient: &str) -> Option<&EncryptedEnvelope> {
        match self {
            Envelope::Direct { envelope } | Envelope::Group { envelope } => Some(envelope),
            Envelope::FanOut { per_recipient } => per_recipient.get(recipient),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Parse(format!("invalid envelope JSON: {}", e)))
    }

    /// Encode as a base64 versioned binary frame
    pub fn encode(&self) -> Result<String> {
        let mut buf = BytesMut::new();
        buf.put_u8(FRAME_VERSION);

        match self {
            Envelope::Direct { envelope } => {
                buf.put_u8(MODE_DIRECT);
                put_sealed(&mut buf, envelope)?;
            }
            Envelope::Group { envelope } => {
                buf.put_u8(MODE_GROUP);
                put_sealed(&mut buf, envelope)?;
            }
            Envelope::FanOut { per_recipient } => {
                buf.put_u8(MODE_FAN_OUT);
                let count = u16::try_from(per_recipient.len())
                    .map_err(|_| Error::Parse("too many recipients for one frame".into()))?;
                buf.put_u16(count);

                for (id, envelope) in per_recipient {
                    let id_len = u16::try_from(id.len())
                        .map_err(|_| Error::Parse("recipient id too long".into()))?;
                    buf.put_u16(id_len);
                    buf.put_slice(id.as_bytes());
                    put_sealed(&mut buf, envelope)?;
                }
            }
        }

        Ok(to_base64(&buf))
    }

    /// Decode a base64 versioned binary frame
    ///
    /// Rejects unknown versions and modes, truncated fields, trailing
    /// bytes, non UTF-8 recipient ids and duplicate recipient ids.
    pub fn decode(encoded: &str) -> Result<Self> {
        let frame = from_base64(encoded)?;
        if frame.len() > MAX_FRAME_SIZE {
            return Err(Error::Parse(format!(
                "frame too large: {} bytes (max {})",
                frame.len(),
                MAX_FRAME_SIZE
            )));
        }

        let mut buf = frame.as_slice();

        let version = take_u8(&mut buf, "version")?;
        if version != FRAME_VERSION {
            return Err(Error::Parse(format!("unsupported frame version {}", version)));
        }

        let envelope = match take_u8(&mut buf, "mode")? {
            MODE_DIRECT => Envelope::Direct {
                envelope: take_sealed(&mut buf)?,
            },
            MODE_GROUP => Envelope::Group {
                envelope: take_sealed(&mut buf)?,
            },
            MODE_FAN_OUT => {
                let count = take_u16(&mut buf, "recipient count")?;
                let mut per_recipient = BTreeMap::new();

                for _ in 0..count {
                    let id_len = take_u16(&mut buf, "recipient id length")? as usize;
                    let id_bytes = take_bytes(&mut buf, id_len, "recipient id")?;
                    let id = String::from_utf8(id_bytes)
                        .map_err(|_| Error::Parse("recipient id is not valid UTF-8".into()))?;
                    let sealed = take_sealed(&mut buf)?;

                    if per_recipient.insert(id.clone(), sealed).is_some() {
                        return Err(Error::Parse(format!("duplicate recipient id '{}'", id)));
                    }
                }

                Envelope::FanOut { per_recipient }
            }
            mode => return Err(Error::Parse(format!("unknown envelope mode {}", mode))),
        };

        if buf.has_remaining() {
            return Err(Error::Parse(format!(
                "{} trailing bytes after envelope",
                buf.remaining()
            )));
        }

        Ok(envelope)
    }
}

// ============================================================================
// FRAME HELPERS
// ============================================================================

fn put_sealed(buf: &mut BytesMut, envelope: &EncryptedEnvelope) -> Result<()> {
    let ct_len = u32::try_from(envelope.ciphertext.len())
        .map_err(|_| Error::Parse("ciphertext too long for one frame".into()))?;
    buf.put_slice(&envelope.nonce);
    buf.put_u32(ct_len);
    buf.put_slice(&envelope.ciphertext);
    Ok(())
}

fn take_sealed(buf: &mut &[u8]) -> Result<EncryptedEnvelope> {
    let nonce = nonce_from_slice(&take_bytes(buf, NONCE_SIZE, "nonce")?)?;
    let ct_len = take_u32(buf, "ciphertext length")? as usize;
    let ciphertext = take_bytes(buf, ct_len, "ciphertext")?;
    Ok(EncryptedEnvelope { nonce, ciphertext })
}

fn ensure_remaining(buf: &&[u8], needed: usize, field: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(Error::Parse(format!(
            "truncated frame: {} needs {} bytes, {} left",
            field,
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

fn take_u8(buf: &mut &[u8], field: &str) -> Result<u8> {
    ensure_remaining(buf, 1, field)?;
    Ok(buf.get_u8())
}

fn take_u16(buf: &mut &[u8], field: &str) -> Result<u16> {
    ensure_remaining(buf, 2, field)?;
    Ok(buf.get_u16())
}

fn take_u32(buf: &mut &[u8], field: &str) -> Result<u32> {
    ensure_remaining(buf, 4, field)?;
    Ok(buf.get_u32())
}

fn take_bytes(buf: &mut &[u8], len: usize, field: &str) -> Result<Vec<u8>> {
    ensure_remaining(buf, len, field)?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

// ============================================================================
// TESTS
// ============================================================================
