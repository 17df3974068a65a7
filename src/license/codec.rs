//! Compact token string format: `BASE36(purchase_secs)_TERM_SIGHEX`.
//!
//! Purchase time is whole seconds in upper-case base 36. Decoding only checks
//! structure; signature verification is a separate step.

use crate::error::{AppError, Result};

use super::Term;

const SEPARATOR: char = '_';
const BASE36_DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Structural content of a token string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedToken {
    /// Always a whole number of seconds, in milliseconds.
    pub purchase_time_ms: i64,
    pub term: Term,
    pub signature_hex: String,
}

impl DecodedToken {
    pub fn purchase_time_secs(&self) -> i64 {
        self.purchase_time_ms / 1000
    }
}

pub fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    // digits are all ASCII
    String::from_utf8(digits).unwrap_or_default()
}

/// Parse a non-negative base-36 integer (either case). No sign, no whitespace.
pub fn from_base36(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    u64::from_str_radix(s, 36).ok()
}

pub fn encode(purchase_time_ms: i64, term: Term, signature_hex: &str) -> Result<String> {
    if purchase_time_ms < 0 {
        return Err(AppError::BadRequest("Purchase time must not be negative".into()));
    }
    if signature_hex.is_empty() || signature_hex.contains(SEPARATOR) {
        return Err(AppError::BadRequest("Signature must be non-empty hex".into()));
    }
    let secs = (purchase_time_ms / 1000) as u64;
    Ok(format!(
        "{}{SEPARATOR}{}{SEPARATOR}{}",
        to_base36(secs),
        term.code(),
        signature_hex
    ))
}

/// Parse a token exactly as issued. Surrounding whitespace is not stripped.
pub fn decode(token: &str) -> Result<DecodedToken> {
    let parts: Vec<&str> = token.split(SEPARATOR).collect();
    let [time, term, signature] = parts.as_slice() else {
        return Err(AppError::DecodeError(format!(
            "expected 3 parts, found {}",
            parts.len()
        )));
    };

    let secs = from_base36(time)
        .filter(|s| *s <= (i64::MAX / 1000) as u64)
        .ok_or_else(|| AppError::DecodeError("purchase time is not base36".into()))?;
    let term = Term::from_code(term)
        .map_err(|_| AppError::DecodeError(format!("unknown term {term:?}")))?;
    if signature.is_empty() {
        return Err(AppError::DecodeError("empty signature".into()));
    }
    if !signature.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AppError::DecodeError("signature is not hex".into()));
    }

    Ok(DecodedToken {
        purchase_time_ms: secs as i64 * 1000,
        term,
        signature_hex: signature.to_string(),
    })
}
