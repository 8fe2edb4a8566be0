//! # Response Sanitizer
//!
//! Cleans individual decoded fields that upstream decoding may have
//! corrupted. Each field is judged on its own; the sanitizer never looks
//! at the rest of the record.
//!
//! | Field | Clean | Repaired | Unavailable |
//! |-------|-------|----------|-------------|
//! | address | parses, non-zero | never | undecodable, bad syntax, zero |
//! | text | plain text | marker/hex tail cut, control chars stripped, truncated | undecodable, empty, whole value is hex or a marker |
//! | timestamp | `1..=2100-01-01` in seconds | value was in milliseconds | undecodable, zero, out of range |
//! | boolean | decoded | never | undecodable |
//!
//! An unavailable address is never replaced with the zero address; the
//! reconciler renders it as [`UNAVAILABLE`].

use std::fmt;

use serde::Serialize;
use tracing::warn;

use lapor_common::{Address, Decoded};

/// Sentinel shown in place of a value that could not be recovered.
pub const UNAVAILABLE: &str = "unavailable";

/// 2100-01-01T00:00:00Z. Later second-resolution timestamps are rejected.
pub const MAX_PLAUSIBLE_TIMESTAMP: u64 = 4_102_444_800;

/// Default cap on free-text length, in characters.
pub const DEFAULT_MAX_TEXT_CHARS: usize = 1_024;

/// Shortest `0x…` hex run treated as a leaked raw payload.
const RAW_HEX_RUN: usize = 64;

/// Strings upstream decoders leave behind when they give up.
const DEFAULT_MARKERS: &[&str] = &[
    "\u{fffd}",
    "decoding error",
    "could not decode",
    "invalid utf-8",
    "malformed",
    "[object object]",
];

// ════════════════════════════════════════════════════════════════════════════════
// OUTCOME
// ════════════════════════════════════════════════════════════════════════════════

/// What was wrong with a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldIssue {
    Undecodable,
    ImpossibleAddress,
    ZeroAddress,
    CorruptionMarker,
    RawHex,
    ControlCharacters,
    Truncated,
    Empty,
    TimestampInMillis,
    TimestampOutOfRange,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldIssue::Undecodable => "undecodable",
            FieldIssue::ImpossibleAddress => "impossible address",
            FieldIssue::ZeroAddress => "zero address",
            FieldIssue::CorruptionMarker => "decoder corruption marker",
            FieldIssue::RawHex => "raw hex payload",
            FieldIssue::ControlCharacters => "control characters",
            FieldIssue::Truncated => "truncated",
            FieldIssue::Empty => "empty",
            FieldIssue::TimestampInMillis => "timestamp in milliseconds",
            FieldIssue::TimestampOutOfRange => "timestamp out of range",
        };
        f.write_str(s)
    }
}

/// Result of sanitizing one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sanitized<T> {
    Clean(T),
    /// Usable value recovered from a damaged one.
    Repaired { value: T, issue: FieldIssue },
    Unavailable(FieldIssue),
}

impl<T> Sanitized<T> {
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Sanitized::Clean(v) | Sanitized::Repaired { value: v, .. } => Some(v),
            Sanitized::Unavailable(_) => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Sanitized::Clean(v) | Sanitized::Repaired { value: v, .. } => Some(v),
            Sanitized::Unavailable(_) => None,
        }
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        matches!(self, Sanitized::Clean(_))
    }

    #[must_use]
    pub fn issue(&self) -> Option<&FieldIssue> {
        match self {
            Sanitized::Clean(_) => None,
            Sanitized::Repaired { issue, .. } | Sanitized::Unavailable(issue) => Some(issue),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// SANITIZER
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct ResponseSanitizer {
    max_text_chars: usize,
    markers: Vec<String>,
}

impl Default for ResponseSanitizer {
    fn default() -> Self {
        Self {
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            markers: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl ResponseSanitizer {
    #[must_use]
    pub fn with_max_text_chars(mut self, max: usize) -> Self {
        self.max_text_chars = max.max(1);
        self
    }

    /// Adds a decoder marker string (matched case-insensitively).
    #[must_use]
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into().to_lowercase());
        self
    }

    pub fn address(&self, field: &'static str, raw: &Decoded<String>) -> Sanitized<Address> {
        let outcome = match raw {
            Decoded::Undecodable { .. } => Sanitized::Unavailable(FieldIssue::Undecodable),
            Decoded::Value(text) => match Address::parse(text.trim()) {
                Err(_) => Sanitized::Unavailable(FieldIssue::ImpossibleAddress),
                Ok(a) if a.is_zero() => Sanitized::Unavailable(FieldIssue::ZeroAddress),
                Ok(a) => Sanitized::Clean(a),
            },
        };
        log_issue(field, &outcome);
        outcome
    }

    pub fn text(&self, field: &'static str, raw: &Decoded<String>) -> Sanitized<String> {
        let outcome = match raw {
            Decoded::Undecodable { .. } => Sanitized::Unavailable(FieldIssue::Undecodable),
            Decoded::Value(text) => self.clean_text(text),
        };
        log_issue(field, &outcome);
        outcome
    }

    pub fn timestamp(&self, field: &'static str, raw: &Decoded<u64>) -> Sanitized<u64> {
        let outcome = match raw {
            Decoded::Undecodable { .. } => Sanitized::Unavailable(FieldIssue::Undecodable),
            Decoded::Value(0) => Sanitized::Unavailable(FieldIssue::TimestampOutOfRange),
            Decoded::Value(ts) if *ts <= MAX_PLAUSIBLE_TIMESTAMP => Sanitized::Clean(*ts),
            Decoded::Value(ts) => {
                let secs = ts / 1_000;
                if (1..=MAX_PLAUSIBLE_TIMESTAMP).contains(&secs) {
                    Sanitized::Repaired {
                        value: secs,
                        issue: FieldIssue::TimestampInMillis,
                    }
                } else {
                    Sanitized::Unavailable(FieldIssue::TimestampOutOfRange)
                }
            }
        };
        log_issue(field, &outcome);
        outcome
    }

    pub fn boolean(&self, field: &'static str, raw: &Decoded<bool>) -> Sanitized<bool> {
        let outcome = match raw {
            Decoded::Undecodable { .. } => Sanitized::Unavailable(FieldIssue::Undecodable),
            Decoded::Value(b) => Sanitized::Clean(*b),
        };
        log_issue(field, &outcome);
        outcome
    }

    fn clean_text(&self, text: &str) -> Sanitized<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Sanitized::Unavailable(FieldIssue::Empty);
        }
        if is_hex_blob(trimmed) {
            return Sanitized::Unavailable(FieldIssue::RawHex);
        }

        let mut issue = None;
        let mut value = trimmed.to_string();

        if let Some(cut) = self.first_marker(&value).filter(|&c| value.is_char_boundary(c)) {
            value.truncate(cut);
            issue = Some(FieldIssue::CorruptionMarker);
        }
        if let Some(cut) = find_hex_run(&value) {
            value.truncate(cut);
            issue.get_or_insert(FieldIssue::RawHex);
        }
        if value.chars().any(is_stray_control) {
            value.retain(|c| !is_stray_control(c));
            issue.get_or_insert(FieldIssue::ControlCharacters);
        }

        let value = value.trim().to_string();
        if value.is_empty() {
            return Sanitized::Unavailable(issue.unwrap_or(FieldIssue::Empty));
        }

        let (value, truncated) = truncate_chars(value, self.max_text_chars);
        if truncated {
            issue.get_or_insert(FieldIssue::Truncated);
        }

        match issue {
            None => Sanitized::Clean(value),
            Some(issue) => Sanitized::Repaired { value, issue },
        }
    }

    /// Byte offset of the earliest marker occurrence, always on a char
    /// boundary of `text`.
    fn first_marker(&self, text: &str) -> Option<usize> {
        if text.is_ascii() {
            let lower = text.to_ascii_lowercase();
            return self.markers.iter().filter_map(|m| lower.find(m.as_str())).min();
        }
        // Lowercasing can change byte lengths outside ASCII, so offsets into
        // a lowered copy do not map back. Compare per start position instead;
        // a marker of n chars never needs more than n source chars.
        text.char_indices().map(|(i, _)| i).find(|&i| {
            self.markers.iter().any(|m| {
                let window: String = text[i..].chars().take(m.chars().count()).collect();
                window.to_lowercase().starts_with(m.as_str())
            })
        })
    }
}

fn log_issue<T>(field: &'static str, outcome: &Sanitized<T>) {
    match outcome {
        Sanitized::Clean(_) => {}
        Sanitized::Repaired { issue, .. } => warn!(field, %issue, "response field repaired"),
        Sanitized::Unavailable(issue) => warn!(field, %issue, "response field unavailable"),
    }
}

fn is_stray_control(c: char) -> bool {
    c.is_control() && !matches!(c, '\n' | '\t' | '\r')
}

/// Whole value is a hex payload: `0x` + at least 8 hex digits, or 32+
/// bare hex digits.
fn is_hex_blob(text: &str) -> bool {
    let (body, prefixed) = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(body) => (body, true),
        None => (text, false),
    };
    let min = if prefixed { 8 } else { 32 };
    body.len() >= min && body.chars().all(|c| c.is_ascii_hexdigit())
}

/// Start of the first `0x` run of at least [`RAW_HEX_RUN`] hex digits.
fn find_hex_run(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'0' && (bytes[i + 1] == b'x' || bytes[i + 1] == b'X') {
            let run = bytes[i + 2..]
                .iter()
                .take_while(|b| b.is_ascii_hexdigit())
                .count();
            if run >= RAW_HEX_RUN {
                return Some(i);
            }
            i += 2 + run;
        } else {
            i += 1;
        }
    }
    None
}

fn truncate_chars(value: String, max: usize) -> (String, bool) {
    match value.char_indices().nth(max) {
        None => (value, false),
        Some((cut, _)) => {
            let mut out = value[..cut].trim_end().to_string();
            out.push('…');
            (out, true)
        }
    }
}
