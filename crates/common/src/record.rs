//! Raw decoded ledger tuples.
//!
//! Read entry points return fixed tuple shapes. Decoding is done field by
//! field so that one broken field does not take the rest of the tuple
//! down with it. A field that fails to decode keeps its raw text for
//! diagnostics.

use serde::{Deserialize, Serialize};

/// One tuple field as decoded from a ledger response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decoded<T> {
    /// Decoded into the expected type.
    Value(T),
    /// Could not be decoded. `raw` is whatever the transport produced.
    Undecodable { raw: String },
}

impl<T> Decoded<T> {
    /// Shorthand for an undecodable field.
    pub fn undecodable(raw: impl Into<String>) -> Self {
        Decoded::Undecodable { raw: raw.into() }
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Decoded::Value(v) => Some(v),
            Decoded::Undecodable { .. } => None,
        }
    }

    #[must_use]
    pub fn is_decoded(&self) -> bool {
        matches!(self, Decoded::Value(_))
    }
}

/// Verdict record as returned by the validator registry.
///
/// `validator` stays textual: the sanitizer decides whether it is a real
/// address. A registry that decodes cleanly still can hand back a value
/// that is syntactically fine but impossible (the zero address).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawVerdictRecord {
    pub validator: Decoded<String>,
    pub is_valid: Decoded<bool>,
    pub description: Decoded<String>,
    pub timestamp: Decoded<u64>,
}

impl RawVerdictRecord {
    /// A record where every field decoded.
    #[must_use]
    pub fn decoded(validator: impl Into<String>, is_valid: bool, description: impl Into<String>, timestamp: u64) -> Self {
        Self {
            validator: Decoded::Value(validator.into()),
            is_valid: Decoded::Value(is_valid),
            description: Decoded::Value(description.into()),
            timestamp: Decoded::Value(timestamp),
        }
    }

    /// Number of fields that decoded.
    #[must_use]
    pub fn decoded_fields(&self) -> usize {
        [
            self.validator.is_decoded(),
            self.is_valid.is_decoded(),
            self.description.is_decoded(),
            self.timestamp.is_decoded(),
        ]
        .iter()
        .filter(|d| **d)
        .count()
    }

    /// `true` when no field decoded at all.
    #[must_use]
    pub fn is_unreadable(&self) -> bool {
        self.decoded_fields() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoded_field_counting() {
        let clean = RawVerdictRecord::decoded("0xabc", true, "ok", 10);
        assert_eq!(clean.decoded_fields(), 4);
        assert!(!clean.is_unreadable());

        let broken = RawVerdictRecord {
            validator: Decoded::undecodable("??"),
            is_valid: Decoded::undecodable("0x02"),
            description: Decoded::undecodable(""),
            timestamp: Decoded::undecodable("NaN"),
        };
        assert!(broken.is_unreadable());
    }

    #[test]
    fn value_accessor() {
        let d: Decoded<u64> = Decoded::Value(5);
        assert_eq!(d.value(), Some(&5));
        let u: Decoded<u64> = Decoded::undecodable("x");
        assert_eq!(u.value(), None);
    }
}
