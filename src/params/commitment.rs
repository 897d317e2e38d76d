use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

/// Sealed bid: binds a number to a secret so it can be revealed later.
///
/// Matches the auction contract's `createCommitment(uint256, string)`, which
/// hashes the packed ABI encoding of its arguments.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment([u8; 32]);

impl Commitment {
    /// `keccak256(abi.encodePacked(uint256(number), secret))`.
    pub fn derive(number: u32, secret: &str) -> Self {
        let mut word = [0u8; 32];
        word[28..].copy_from_slice(&number.to_be_bytes());

        let mut hasher = Keccak256::new();
        hasher.update(word);
        hasher.update(secret.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    fn from_hex(s: &str) -> Option<Self> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s.strip_prefix("0x")?, &mut out).ok()?;
        Some(Self(out))
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self.to_hex())
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Commitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Commitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| serde::de::Error::custom("invalid commitment hex"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_commitment() {
        assert_eq!(Commitment::derive(42, "hunter2"), Commitment::derive(42, "hunter2"));
    }

    #[test]
    fn packed_encoding_uses_keccak() {
        // keccak256 of 32 zero bytes
        assert_eq!(
            Commitment::derive(0, "").to_hex(),
            "0x290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563"
        );
    }

    #[test]
    fn number_and_secret_both_bind() {
        let base = Commitment::derive(42, "hunter2");
        assert_ne!(base, Commitment::derive(43, "hunter2"));
        assert_ne!(base, Commitment::derive(42, "hunter3"));
    }

    #[test]
    fn hex_form() {
        let hex = Commitment::derive(1, "x").to_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 66);
        assert_eq!(Commitment::from_hex(&hex), Some(Commitment::derive(1, "x")));
        assert_eq!(Commitment::from_hex(&hex[2..]), None);
        assert_eq!(Commitment::from_hex("0x1234"), None);
    }

    #[test]
    fn serde_uses_hex_string() {
        let c = Commitment::derive(9, "pw");
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, format!("\"{}\"", c.to_hex()));
        let back: Commitment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
