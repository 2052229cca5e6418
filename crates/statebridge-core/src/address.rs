// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed-width legacy identities and destination-chain addresses.

use crate::error::{StateBridgeError, StateBridgeResult};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

pub const LEGACY_ADDRESS_LEN: usize = 20;
pub const PUBLIC_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

/// Leading type byte of the tagged 33-byte public key encoding.
pub const PUBLIC_KEY_TYPE_TAG: u8 = 0xED;

const DEST_ADDRESS_MAX_LEN: usize = 90;
const BECH32_ALPHABET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Legacy address: the first 20 bytes of SHA-256 over the ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LegacyAddress([u8; LEGACY_ADDRESS_LEN]);

impl LegacyAddress {
    pub const fn from_bytes(bytes: [u8; LEGACY_ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_digest(digest: &[u8]) -> StateBridgeResult<Self> {
        let head = digest
            .get(..LEGACY_ADDRESS_LEN)
            .ok_or_else(|| StateBridgeError::InvalidArgument("digest too short".into()))?;
        let mut out = [0u8; LEGACY_ADDRESS_LEN];
        out.copy_from_slice(head);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; LEGACY_ADDRESS_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl FromStr for LegacyAddress {
    type Err = StateBridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| StateBridgeError::InvalidAddress {
            address: s.to_string(),
            reason: reason.to_string(),
        };
        if s.len() != LEGACY_ADDRESS_LEN * 2 {
            return Err(invalid("expected 40 hex characters"));
        }
        let bytes = hex::decode(s).map_err(|_| invalid("not hex"))?;
        let mut out = [0u8; LEGACY_ADDRESS_LEN];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Display for LegacyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for LegacyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LegacyAddress({})", self.to_hex())
    }
}

impl Serialize for LegacyAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for LegacyAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LegacyPublicKey([u8; PUBLIC_KEY_LEN]);

impl LegacyPublicKey {
    pub const fn from_raw(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Accepts the raw 32-byte key or the 33-byte tagged encoding.
    pub fn from_slice(bytes: &[u8]) -> StateBridgeResult<Self> {
        let raw = match bytes.len() {
            PUBLIC_KEY_LEN => bytes,
            33 if bytes[0] == PUBLIC_KEY_TYPE_TAG => &bytes[1..],
            33 => {
                return Err(StateBridgeError::InvalidPublicKey(format!(
                    "unknown key type tag 0x{:02x}",
                    bytes[0]
                )))
            }
            n => {
                return Err(StateBridgeError::InvalidPublicKey(format!(
                    "expected 32 or 33 bytes, got {n}"
                )))
            }
        };
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out.copy_from_slice(raw);
        Ok(Self(out))
    }

    pub fn from_hex(s: &str) -> StateBridgeResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|_| StateBridgeError::InvalidPublicKey(format!("not hex: {s:?}")))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub fn address(&self) -> LegacyAddress {
        let digest = Sha256::digest(self.0);
        let mut out = [0u8; LEGACY_ADDRESS_LEN];
        out.copy_from_slice(&digest[..LEGACY_ADDRESS_LEN]);
        LegacyAddress(out)
    }

    pub fn verifying_key(&self) -> StateBridgeResult<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0)
            .map_err(|_| StateBridgeError::InvalidPublicKey("not a valid ed25519 point".into()))
    }
}

impl From<VerifyingKey> for LegacyPublicKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl fmt::Display for LegacyPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for LegacyPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LegacyPublicKey({})", hex::encode(self.0))
    }
}

impl Serialize for LegacyPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for LegacyPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Destination-chain account address, `<hrp>1<data>`.
///
/// Only the shape is checked here; checksum validation belongs to the host
/// ledger's address codec.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DestAddress(String);

impl DestAddress {
    pub fn parse(raw: &str) -> StateBridgeResult<Self> {
        let invalid = || StateBridgeError::InvalidDestAddress(raw.to_string());
        if raw.is_empty() || raw.len() > DEST_ADDRESS_MAX_LEN {
            return Err(invalid());
        }
        if raw.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(invalid());
        }
        let (hrp, data) = raw.rsplit_once('1').ok_or_else(invalid)?;
        if hrp.is_empty() || data.len() < 6 {
            return Err(invalid());
        }
        if !hrp.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }
        if !data.chars().all(|c| BECH32_ALPHABET.contains(c)) {
            return Err(invalid());
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DestAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for DestAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

// The empty string is the unclaimed sentinel inside stored records.
impl<'de> Deserialize<'de> for DestAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Ok(Self::default());
        }
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for signature byte strings carried as lowercase hex.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        hex::decode(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    #[test]
    fn address_is_truncated_sha256_of_key() {
        let key = LegacyPublicKey::from(SigningKey::from_bytes(&[3u8; 32]).verifying_key());
        let digest = Sha256::digest(key.as_bytes());
        assert_eq!(key.address().as_bytes()[..], digest[..20]);
    }

    #[test]
    fn address_parse_is_case_insensitive_and_displays_upper() {
        let lower = "1a0bb8623f40d2a9beac099a0bafdcae3c5d8288";
        let addr: LegacyAddress = lower.parse().expect("parse");
        assert_eq!(addr.to_string(), lower.to_uppercase());
    }

    #[test]
    fn address_rejects_bad_length_and_non_hex() {
        assert!("FFFF".parse::<LegacyAddress>().is_err());
        assert!("zz0bb8623f40d2a9beac099a0bafdcae3c5d8288"
            .parse::<LegacyAddress>()
            .is_err());
        assert!(format!("{}00", "AB".repeat(20))
            .parse::<LegacyAddress>()
            .is_err());
    }

    #[test]
    fn tagged_public_key_decodes_to_raw() {
        let raw = SigningKey::from_bytes(&[9u8; 32]).verifying_key().to_bytes();
        let mut tagged = vec![PUBLIC_KEY_TYPE_TAG];
        tagged.extend_from_slice(&raw);
        assert_eq!(
            LegacyPublicKey::from_slice(&tagged).expect("tagged"),
            LegacyPublicKey::from_slice(&raw).expect("raw")
        );
        tagged[0] = 0x01;
        assert!(LegacyPublicKey::from_slice(&tagged).is_err());
    }

    #[test]
    fn dest_address_shape() {
        assert!(DestAddress::parse("dest1qpzry9x8gf2tvdw0s3jn54khce6mua7l").is_ok());
        assert!(DestAddress::parse("").is_err());
        assert!(DestAddress::parse("DEST1qpzry9x8gf").is_err());
        assert!(DestAddress::parse("dest1bio").is_err());
        assert!(DestAddress::parse("noseparator").is_err());
    }
}
