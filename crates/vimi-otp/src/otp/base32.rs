//! Base-32 secret codec (RFC 4648 alphabet).
//!
//! Decoding is lenient about case and trailing `=` padding, strict about
//! everything else. Trailing bits that do not fill a whole byte are dropped.

use crate::otp::types::*;

const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Decode a base-32 string into raw key bytes.
pub fn decode(text: &str) -> Result<Vec<u8>, OtpError> {
    let unpadded = text.trim_end_matches('=').to_uppercase();

    if let Some((pos, ch)) = unpadded
        .chars()
        .enumerate()
        .find(|(_, c)| !ALPHABET.contains(*c))
    {
        return Err(OtpError::new(
            OtpErrorKind::InvalidCharacter,
            format!("Invalid base-32 character {:?}", ch),
        )
        .with_detail(format!("position {}", pos)));
    }

    ::base32::decode(::base32::Alphabet::Rfc4648 { padding: false }, &unpadded).ok_or_else(|| {
        OtpError::new(OtpErrorKind::InvalidSecret, "Invalid base-32 secret")
    })
}

/// Encode raw bytes to base-32 (no padding, uppercase).
pub fn encode(bytes: &[u8]) -> String {
    ::base32::encode(::base32::Alphabet::Rfc4648 { padding: false }, bytes)
}

/// Canonical form of a secret: whitespace removed, uppercase.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Check if a string, once normalised, is a non-empty decodable secret.
pub fn is_valid(text: &str) -> bool {
    let cleaned = normalize(text);
    !cleaned.trim_end_matches('=').is_empty() && decode(&cleaned).is_ok()
}
