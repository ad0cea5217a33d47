//! `otpauth://` URI parsing per the Google Authenticator key-URI format:
//! <https://github.com/google/google-authenticator/wiki/Key-Uri-Format>
//!
//! Format: `otpauth://totp/ISSUER:ACCOUNT?secret=BASE32&issuer=ISSUER`
//!
//! Parsing is best-effort: anything malformed yields `None` so a batch of
//! scanned strings can skip bad entries without failing.

use std::collections::HashSet;

use crate::otp::base32;
use crate::otp::types::*;

/// Prefix a decoded QR payload must carry to be considered at all.
pub const OTPAUTH_PREFIX: &str = "otpauth://";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Parse
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse an `otpauth://totp/...` URI into a candidate credential.
///
/// Returns `None` for a non-`otpauth` scheme, any OTP type other than
/// `totp`, a missing `secret`, a secret that is not base-32, an empty
/// account name, or an unparseable string.
pub fn parse_otpauth_uri(uri: &str) -> Option<OtpCandidate> {
    match try_parse(uri) {
        Ok(candidate) => Some(candidate),
        Err(e) => {
            log::debug!("Skipping URI: {}", e);
            None
        }
    }
}

fn try_parse(uri: &str) -> Result<OtpCandidate, OtpError> {
    let url = url::Url::parse(uri.trim()).map_err(|e| {
        OtpError::new(OtpErrorKind::InvalidUri, format!("Invalid URI: {}", e))
    })?;

    if url.scheme() != "otpauth" {
        return Err(OtpError::new(
            OtpErrorKind::InvalidUri,
            format!("Expected scheme 'otpauth', got '{}'", url.scheme()),
        ));
    }

    match url.host_str() {
        Some("totp") => {}
        other => {
            return Err(OtpError::new(
                OtpErrorKind::InvalidUri,
                format!("Unsupported OTP type: {:?}", other),
            ))
        }
    }

    // Path is "/ACCOUNT" or "/ISSUER:ACCOUNT"; the label issuer is ignored.
    let path = url.path();
    let path = percent_decode(path.strip_prefix('/').unwrap_or(path))?;
    let name = match path.split_once(':') {
        Some((_, account)) => account.trim().to_string(),
        None => path.trim().to_string(),
    };
    if name.is_empty() {
        return Err(OtpError::new(OtpErrorKind::InvalidUri, "Missing account name"));
    }

    let mut secret = None;
    let mut issuer = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "secret" if secret.is_none() => secret = Some(value.into_owned()),
            "issuer" if issuer.is_none() => issuer = Some(value.into_owned()),
            _ => {}
        }
    }

    let secret = base32::normalize(&secret.unwrap_or_default());
    if secret.is_empty() {
        return Err(OtpError::new(OtpErrorKind::InvalidUri, "Missing 'secret' parameter"));
    }
    base32::decode(&secret).map_err(|e| {
        OtpError::new(OtpErrorKind::InvalidUri, "Secret is not base-32").with_detail(e.message)
    })?;

    Ok(OtpCandidate {
        name,
        secret,
        issuer: issuer.unwrap_or_default(),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Batch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Drop candidates whose secret was already seen; the first one wins and
/// the input order is kept.
pub fn dedup_candidates<I>(candidates: I) -> Vec<OtpCandidate>
where
    I: IntoIterator<Item = OtpCandidate>,
{
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.secret.clone()))
        .collect()
}

/// Turn decoder output into deduplicated candidates. Strings that do not
/// start with `otpauth://` or fail to parse are skipped.
pub fn parse_scanned<I, S>(decoded: I) -> Vec<OtpCandidate>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    dedup_candidates(
        decoded
            .into_iter()
            .filter(|s| s.as_ref().starts_with(OTPAUTH_PREFIX))
            .filter_map(|s| parse_otpauth_uri(s.as_ref())),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Percent decoding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decode `%XX` escapes byte-wise; `+` is left alone (path semantics).
/// Escapes that do not form valid UTF-8 reject the label.
fn percent_decode(s: &str) -> Result<String, OtpError> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).map_err(|e| {
        OtpError::new(OtpErrorKind::InvalidUri, "Label is not valid UTF-8").with_detail(e.to_string())
    })
}
