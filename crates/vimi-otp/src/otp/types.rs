//! Core types for the OTP credential engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default TOTP period in seconds.
pub const DEFAULT_PERIOD: u32 = 30;
/// Default number of digits in a generated code.
pub const DEFAULT_DIGITS: u8 = 6;
/// Accepted digit counts.
pub const MIN_DIGITS: u8 = 6;
pub const MAX_DIGITS: u8 = 8;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Credential
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A stored TOTP credential.
///
/// Credentials are immutable once stored; the only mutation the store
/// offers is deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Unique identifier, never reused.
    pub id: String,
    /// Account name (e.g. "alice@example.com").
    pub name: String,
    /// Base-32 secret in canonical form (uppercase, no whitespace).
    pub secret: String,
    /// Issuer label, empty when absent.
    #[serde(default)]
    pub issuer: String,
    /// When the credential was created. Informational only.
    pub created_at: DateTime<Utc>,
}

impl Credential {
    /// Build a credential with a fresh identifier. The store validates
    /// `name` and `secret` before calling this.
    pub fn new(
        name: impl Into<String>,
        secret: impl Into<String>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            secret: secret.into(),
            issuer: issuer.into(),
            created_at: Utc::now(),
        }
    }

    /// Display name: "Issuer (name)" or just "name".
    pub fn display_name(&self) -> String {
        display_name(&self.issuer, &self.name)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Parsed candidate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A credential parsed from an `otpauth://` URI that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpCandidate {
    pub name: String,
    pub secret: String,
    pub issuer: String,
}

impl OtpCandidate {
    pub fn display_name(&self) -> String {
        display_name(&self.issuer, &self.name)
    }
}

fn display_name(issuer: &str, name: &str) -> String {
    if issuer.is_empty() {
        name.to_string()
    } else {
        format!("{} ({})", issuer, name)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Countdown state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Presentation-only urgency of the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// More than 10 seconds left.
    Normal,
    /// 6 to 10 seconds left.
    Warning,
    /// 5 seconds or less.
    Danger,
}

impl Urgency {
    pub fn from_remaining(remaining: u32) -> Self {
        match remaining {
            0..=5 => Self::Danger,
            6..=10 => Self::Warning,
            _ => Self::Normal,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Warning => write!(f, "warning"),
            Self::Danger => write!(f, "danger"),
        }
    }
}

/// What a renderer shows for one credential on a given tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeView {
    pub id: String,
    pub display_name: String,
    /// Raw code, or the placeholder when computation failed.
    pub code: String,
    /// Code split for reading (e.g. "123 456").
    pub formatted: String,
}

/// Everything published on a single scheduler tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickFrame {
    /// Wall-clock second the frame was computed for.
    pub now: u64,
    pub period: u32,
    /// Seconds left in the current period (1..=period).
    pub remaining: u32,
    /// `remaining / period`, 1.0 for a fresh code.
    pub progress: f64,
    pub urgency: Urgency,
    /// Whether codes were recomputed on this tick.
    pub recomputed: bool,
    pub codes: Vec<CodeView>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Error type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Error kind for this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OtpErrorKind {
    InvalidCharacter,
    InvalidSecret,
    InvalidName,
    InvalidUri,
    InvalidDigits,
    InvalidPeriod,
    CodeComputationFailure,
    PersistenceFailure,
    NoImages,
    NoValidCodes,
    ScanFailed,
    NotFound,
    ExportFailed,
    ImportFailed,
    Internal,
}

/// Crate-level error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpError {
    pub kind: OtpErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

impl fmt::Display for OtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)?;
        if let Some(d) = &self.detail {
            write!(f, " ({})", d)?;
        }
        Ok(())
    }
}

impl std::error::Error for OtpError {}

impl OtpError {
    pub fn new(kind: OtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<OtpError> for String {
    fn from(e: OtpError) -> String {
        e.to_string()
    }
}
