//! TOTP code generation (RFC 6238 over RFC 4226 truncation).
//!
//! The HMAC is pinned to SHA-1; only the period and digit count vary.

use crate::otp::base32;
use crate::otp::types::*;
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// Placeholder character shown instead of a code that could not be computed.
pub const PLACEHOLDER_CHAR: char = '-';

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Raw HMAC-OTP (RFC 4226 §5.3)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute HMAC-SHA1(key, counter as 8 big-endian bytes).
fn compute_hmac(key: &[u8], counter: u64) -> Result<[u8; 20], OtpError> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key).map_err(|e| {
        OtpError::new(
            OtpErrorKind::CodeComputationFailure,
            format!("HMAC key rejected: {}", e),
        )
    })?;
    mac.update(&counter.to_be_bytes());
    let mut digest = [0u8; 20];
    digest.copy_from_slice(&mac.finalize().into_bytes());
    Ok(digest)
}

/// Dynamic truncation per RFC 4226 §5.3.
fn truncate(digest: &[u8; 20], digits: u8) -> String {
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | (digest[offset + 3] as u32);
    let code = binary % 10u32.pow(digits as u32);
    format!("{:0>width$}", code, width = digits as usize)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Reject digit counts outside `MIN_DIGITS..=MAX_DIGITS`.
pub fn validate_digits(digits: u8) -> Result<u8, OtpError> {
    if (MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
        Ok(digits)
    } else {
        Err(OtpError::new(
            OtpErrorKind::InvalidDigits,
            format!("Digits must be between {} and {}", MIN_DIGITS, MAX_DIGITS),
        )
        .with_detail(format!("got {}", digits)))
    }
}

/// Reject a zero period.
pub fn validate_period(period: u32) -> Result<u32, OtpError> {
    if period == 0 {
        Err(OtpError::new(OtpErrorKind::InvalidPeriod, "Period must be positive"))
    } else {
        Ok(period)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TOTP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Time-step counter for a unix timestamp.
pub fn time_step_at(unix_seconds: u64, period: u32) -> u64 {
    unix_seconds / period as u64
}

/// Seconds remaining in the period containing `unix_seconds` (1..=period).
pub fn seconds_remaining_at(unix_seconds: u64, period: u32) -> u32 {
    let p = period as u64;
    (p - (unix_seconds % p)) as u32
}

/// Fraction of the period still left: 1.0 right after a rollover.
pub fn progress_at(unix_seconds: u64, period: u32) -> f64 {
    seconds_remaining_at(unix_seconds, period) as f64 / period as f64
}

/// Generate the TOTP code for raw key bytes at an explicit unix timestamp.
pub fn generate(key: &[u8], unix_seconds: u64, period: u32, digits: u8) -> Result<String, OtpError> {
    let period = validate_period(period)?;
    let digits = validate_digits(digits)?;
    let digest = compute_hmac(key, time_step_at(unix_seconds, period))?;
    Ok(truncate(&digest, digits))
}

/// Decode a base-32 secret and generate its code.
pub fn generate_for_secret(
    secret_b32: &str,
    unix_seconds: u64,
    period: u32,
    digits: u8,
) -> Result<String, OtpError> {
    let key = base32::decode(secret_b32).map_err(|e| OtpError {
        kind: OtpErrorKind::InvalidSecret,
        ..e
    })?;
    generate(&key, unix_seconds, period, digits)
}

/// Display-path generation: never fails. Any error is logged and replaced
/// by a run of [`PLACEHOLDER_CHAR`] as long as the code would have been.
pub fn code_or_placeholder(secret_b32: &str, unix_seconds: u64, period: u32, digits: u8) -> String {
    match generate_for_secret(secret_b32, unix_seconds, period, digits) {
        Ok(code) => code,
        Err(e) => {
            log::warn!("TOTP generation failed: {}", e);
            placeholder(digits)
        }
    }
}

/// The sentinel string for a code of `digits` length.
pub fn placeholder(digits: u8) -> String {
    let width = if (MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
        digits
    } else {
        DEFAULT_DIGITS
    };
    std::iter::repeat(PLACEHOLDER_CHAR).take(width as usize).collect()
}

/// Whether a code string is the sentinel rather than a real code.
pub fn is_placeholder(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c == PLACEHOLDER_CHAR)
}

/// Format an OTP code with a space in the middle (e.g. "123 456").
pub fn format_code_display(code: &str) -> String {
    if code.len() <= 4 || !code.is_ascii() {
        return code.to_string();
    }
    let mid = code.len() / 2;
    format!("{} {}", &code[..mid], &code[mid..])
}

/// Current unix timestamp in seconds.
pub(crate) fn current_unix_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Secret: "12345678901234567890" (ASCII)
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    // ── RFC 4226 Appendix D (counter = time step, period 1) ──────

    #[test]
    fn rfc4226_truncation_vectors() {
        let expected = [
            "755224", "287082", "359152", "969429", "338314",
            "254676", "287922", "162583", "399871", "520489",
        ];
        let key = b"12345678901234567890";
        for (counter, exp) in expected.iter().enumerate() {
            let code = generate(key, counter as u64, 1, 6).unwrap();
            assert_eq!(&code, exp, "mismatch at counter {}", counter);
        }
    }

    // ── RFC 6238 Appendix B, SHA-1 column ────────────────────────

    #[test]
    fn rfc6238_sha1_vectors() {
        let vectors = [
            (59u64, "94287082"),
            (1111111109, "07081804"),
            (1111111111, "14050471"),
            (1234567890, "89005924"),
            (2000000000, "69279037"),
            (20000000000, "65353130"),
        ];
        for (t, exp) in vectors {
            let code = generate_for_secret(RFC_SECRET, t, 30, 8).unwrap();
            assert_eq!(code, exp, "mismatch at T={}", t);
        }
    }

    #[test]
    fn six_digit_code_at_59() {
        assert_eq!(generate_for_secret(RFC_SECRET, 59, 30, 6).unwrap(), "287082");
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generate_for_secret(RFC_SECRET, 1_700_000_000, 30, 6).unwrap();
        let b = generate_for_secret(RFC_SECRET, 1_700_000_000, 30, 6).unwrap();
        assert_eq!(a, b);
        // Same period, different second
        let c = generate_for_secret(RFC_SECRET, 1_700_000_009, 30, 6).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn output_length_matches_digits() {
        for digits in MIN_DIGITS..=MAX_DIGITS {
            for t in [0u64, 59, 1111111109, 1234567890, 2000000000] {
                let code = generate_for_secret(RFC_SECRET, t, 30, digits).unwrap();
                assert_eq!(code.len(), digits as usize);
                assert!(code.chars().all(|c| c.is_ascii_digit()));
            }
        }
    }

    #[test]
    fn leading_zero_is_kept() {
        // 8-digit code at T=1111111109 starts with '0'
        let code = generate_for_secret(RFC_SECRET, 1111111109, 30, 8).unwrap();
        assert!(code.starts_with('0'));
    }

    #[test]
    fn digits_out_of_range_rejected() {
        for digits in [0u8, 5, 9, 10] {
            let err = generate(b"key", 0, 30, digits).unwrap_err();
            assert_eq!(err.kind, OtpErrorKind::InvalidDigits);
        }
    }

    #[test]
    fn zero_period_rejected() {
        let err = generate(b"key", 0, 0, 6).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidPeriod);
    }

    #[test]
    fn empty_key_still_hashes() {
        // HMAC accepts a zero-length key
        assert_eq!(generate(&[], 0, 30, 6).unwrap().len(), 6);
    }

    // ── Time helpers ─────────────────────────────────────────────

    #[test]
    fn time_step_calculation() {
        assert_eq!(time_step_at(0, 30), 0);
        assert_eq!(time_step_at(29, 30), 0);
        assert_eq!(time_step_at(30, 30), 1);
        assert_eq!(time_step_at(59, 30), 1);
        assert_eq!(time_step_at(60, 30), 2);
    }

    #[test]
    fn seconds_remaining_calculation() {
        assert_eq!(seconds_remaining_at(0, 30), 30);
        assert_eq!(seconds_remaining_at(1, 30), 29);
        assert_eq!(seconds_remaining_at(29, 30), 1);
        assert_eq!(seconds_remaining_at(30, 30), 30);
    }

    #[test]
    fn progress_is_remaining_over_period() {
        assert!((progress_at(0, 30) - 1.0).abs() < 1e-9);
        assert!((progress_at(15, 30) - 0.5).abs() < 1e-9);
        assert!((progress_at(29, 30) - 1.0 / 30.0).abs() < 1e-9);
    }

    // ── Display path ─────────────────────────────────────────────

    #[test]
    fn placeholder_on_bad_secret() {
        let code = code_or_placeholder("NOT*BASE32", 59, 30, 6);
        assert_eq!(code, "------");
        assert!(is_placeholder(&code));
    }

    #[test]
    fn placeholder_width_follows_digits() {
        assert_eq!(placeholder(8), "--------");
        assert_eq!(placeholder(42), "------");
    }

    #[test]
    fn good_secret_is_not_placeholder() {
        let code = code_or_placeholder(RFC_SECRET, 59, 30, 6);
        assert_eq!(code, "287082");
        assert!(!is_placeholder(&code));
    }

    #[test]
    fn format_code_split() {
        assert_eq!(format_code_display("123456"), "123 456");
        assert_eq!(format_code_display("1234567"), "123 4567");
        assert_eq!(format_code_display("12345678"), "1234 5678");
        assert_eq!(format_code_display("------"), "--- ---");
        assert_eq!(format_code_display("1234"), "1234");
    }
}
