//! Token amount formatting.
//!
//! Ledger amounts are base-unit integers. For display they are scaled by
//! the token's fixed decimal count (18 for the deployed token). Both
//! directions work on decimal strings so no precision is lost and no
//! power of ten is ever computed.

use thiserror::Error;

/// Decimal count of the deployed token.
pub const DEFAULT_TOKEN_DECIMALS: u32 = 18;

/// Errors from [`parse_units`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("amount contains invalid character {0:?}")]
    InvalidCharacter(char),

    #[error("amount has {found} fractional digits, token supports {max}")]
    TooManyDecimals { found: usize, max: u32 },

    #[error("amount does not fit in 128 bits")]
    Overflow,
}

/// Renders a base-unit amount as a decimal string.
///
/// Trailing fractional zeros are dropped: `1_500_000_000_000_000_000` with
/// 18 decimals renders as `"1.5"`, and whole amounts have no fraction.
#[must_use]
pub fn format_units(amount: u128, decimals: u32) -> String {
    let digits = amount.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };

    let split = padded.len() - decimals;
    let (whole, fraction) = padded.split_at(split);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

/// Parses a decimal string into base units.
///
/// Accepts `"12"`, `"12.5"`, `".5"` and `"12."`. Surrounding whitespace is
/// ignored; signs, exponents and separators are rejected.
pub fn parse_units(text: &str, decimals: u32) -> Result<u128, AmountError> {
    let text = text.trim();
    if text.is_empty() || text == "." {
        return Err(AmountError::Empty);
    }

    let (whole, fraction) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };

    if let Some(bad) = whole
        .chars()
        .chain(fraction.chars())
        .find(|c| !c.is_ascii_digit())
    {
        return Err(AmountError::InvalidCharacter(bad));
    }

    if fraction.len() > decimals as usize {
        return Err(AmountError::TooManyDecimals {
            found: fraction.len(),
            max: decimals,
        });
    }

    let mut combined = String::with_capacity(whole.len() + decimals as usize);
    combined.push_str(whole);
    combined.push_str(fraction);
    combined.push_str(&"0".repeat(decimals as usize - fraction.len()));

    let combined = combined.trim_start_matches('0');
    if combined.is_empty() {
        return Ok(0);
    }
    combined.parse::<u128>().map_err(|_| AmountError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn format_whole_and_fractional() {
        assert_eq!(format_units(0, 18), "0");
        assert_eq!(format_units(ONE, 18), "1");
        assert_eq!(format_units(ONE * 3 / 2, 18), "1.5");
        assert_eq!(format_units(1, 18), "0.000000000000000001");
        assert_eq!(format_units(1234, 0), "1234");
    }

    #[test]
    fn parse_variants() {
        assert_eq!(parse_units("1", 18), Ok(ONE));
        assert_eq!(parse_units("1.5", 18), Ok(ONE * 3 / 2));
        assert_eq!(parse_units(".5", 18), Ok(ONE / 2));
        assert_eq!(parse_units("2.", 18), Ok(ONE * 2));
        assert_eq!(parse_units(" 0 ", 18), Ok(0));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_units("", 18), Err(AmountError::Empty));
        assert_eq!(parse_units("-1", 18), Err(AmountError::InvalidCharacter('-')));
        assert_eq!(parse_units("1e5", 18), Err(AmountError::InvalidCharacter('e')));
        assert_eq!(
            parse_units("0.123", 2),
            Err(AmountError::TooManyDecimals { found: 3, max: 2 })
        );
        assert_eq!(
            parse_units("999999999999999999999999999999999999999999", 0),
            Err(AmountError::Overflow)
        );
    }

    #[test]
    fn format_then_parse_is_stable_for_display_values() {
        let amount = ONE * 250 + ONE / 4;
        let text = format_units(amount, 18);
        assert_eq!(text, "250.25");
        assert_eq!(parse_units(&text, 18), Ok(amount));
    }
}
