//! # Ledger Address
//!
//! 20-byte account/contract address with a strict textual form.
//!
//! ## Textual Form
//!
//! | Form | Example |
//! |------|---------|
//! | Canonical (`Display`) | `0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed` |
//! | Checksummed (EIP-55) | `0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed` |
//!
//! Parsing accepts exactly 42 characters: the `0x` prefix followed by 40
//! hex digits, in any letter case. A missing prefix, padding or
//! surrounding whitespace is rejected. Decoded ledger values that fail
//! this check are treated as corrupted by the sanitizer.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Length of an address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Length of the `0x`-prefixed textual form.
pub const ADDRESS_TEXT_LEN: usize = 42;

// ════════════════════════════════════════════════════════════════════════════════
// ERROR
// ════════════════════════════════════════════════════════════════════════════════

/// Reasons a string is not a well-formed address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Text is not exactly 42 characters.
    #[error("address must be {ADDRESS_TEXT_LEN} characters, got {0}")]
    WrongLength(usize),

    /// Text does not start with `0x`.
    #[error("address must start with 0x")]
    MissingPrefix,

    /// Body contains a non-hex character.
    #[error("address contains non-hex characters")]
    InvalidHex,
}

// ════════════════════════════════════════════════════════════════════════════════
// ADDRESS
// ════════════════════════════════════════════════════════════════════════════════

/// A 20-byte ledger address.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero address. Never a valid actor or registry.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Wraps raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Builds an address whose every byte is `byte`. Handy for fixtures.
    #[must_use]
    pub const fn repeat(byte: u8) -> Self {
        Self([byte; ADDRESS_LEN])
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// `true` for [`Address::ZERO`].
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    /// Strict parse of the 42-character textual form.
    pub fn parse(text: &str) -> Result<Self, AddressError> {
        if text.len() != ADDRESS_TEXT_LEN {
            return Err(AddressError::WrongLength(text.len()));
        }
        let body = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .ok_or(AddressError::MissingPrefix)?;

        let mut bytes = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(body, &mut bytes).map_err(|_| AddressError::InvalidHex)?;
        Ok(Self(bytes))
    }

    /// EIP-55 mixed-case checksum rendering.
    ///
    /// Each hex letter is upper-cased when the matching nibble of
    /// `keccak256(lowercase_hex)` is 8 or greater.
    #[must_use]
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = Keccak256::digest(lower.as_bytes());

        let mut out = String::with_capacity(ADDRESS_TEXT_LEN);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Short `0x1234…abcd` form for tables and log lines.
    #[must_use]
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}…{}", &full[..6], &full[ADDRESS_TEXT_LEN - 4..])
    }
}

/// `true` when `text` has the syntactic shape of an address.
///
/// Says nothing about whether the value is plausible (the zero address
/// passes this check).
#[must_use]
pub fn looks_like_address(text: &str) -> bool {
    Address::parse(text).is_ok()
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Address::parse(&text).map_err(de::Error::custom)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// TESTS
// ════════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LOWER: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
    const SAMPLE_CHECKSUM: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    #[test]
    fn parse_accepts_any_case() {
        let a = Address::parse(SAMPLE_LOWER).unwrap();
        let b = Address::parse(SAMPLE_CHECKSUM).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), SAMPLE_LOWER);
    }

    #[test]
    fn checksum_matches_eip55_vector() {
        let a = Address::parse(SAMPLE_LOWER).unwrap();
        assert_eq!(a.to_checksum(), SAMPLE_CHECKSUM);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert_eq!(
            Address::parse("0x1234"),
            Err(AddressError::WrongLength(6))
        );
        assert!(Address::parse(&format!("{SAMPLE_LOWER}00")).is_err());
    }

    #[test]
    fn parse_rejects_missing_prefix() {
        let no_prefix = format!("zz{}", &SAMPLE_LOWER[2..]);
        assert_eq!(Address::parse(&no_prefix), Err(AddressError::MissingPrefix));
    }

    #[test]
    fn parse_rejects_non_hex_body() {
        let bad = format!("0x{}", "g".repeat(40));
        assert_eq!(Address::parse(&bad), Err(AddressError::InvalidHex));
    }

    #[test]
    fn zero_address_detection() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::repeat(1).is_zero());
        // Syntactically an address, even though it is never a real actor.
        assert!(looks_like_address(&Address::ZERO.to_string()));
    }

    #[test]
    fn serde_uses_text_form() {
        let a = Address::repeat(0xab);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(20)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
        assert!(serde_json::from_str::<Address>("\"0xnope\"").is_err());
    }

    #[test]
    fn short_form() {
        let a = Address::parse(SAMPLE_LOWER).unwrap();
        assert_eq!(a.short(), "0x5aae…eaed");
    }
}
