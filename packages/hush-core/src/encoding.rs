//! Base64 helpers shared by the key, envelope and vault layers.
//!
//! Standard alphabet with padding, matching `tweetnacl-util`.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::Result;

/// Encode bytes as padded standard base64
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode padded standard base64
pub fn from_base64(s: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(s)?)
}

/// Serde helper for fixed-size byte arrays as base64 strings
pub(crate) mod base64_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::to_base64(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = super::from_base64(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected {} bytes", N)))
    }
}

/// Serde helper for variable-length byte vectors as base64 strings
pub(crate) mod base64_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::to_base64(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_matches_nacl_util() {
        assert_eq!(to_base64(b"hello"), "aGVsbG8=");
        assert_eq!(from_base64("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_empty_round_trip() {
        assert_eq!(to_base64(&[]), "");
        assert!(from_base64("").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(from_base64("a.b").is_err());
        assert!(from_base64("abc").is_err());
    }
}
