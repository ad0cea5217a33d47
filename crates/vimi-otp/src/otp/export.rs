//! Plain JSON backup of the credential list and its restore path.
//!
//! Document shape:
//! ```json
//! { "version": 1, "exportedAt": "2024-01-01T00:00:00.000Z",
//!   "accounts": [{ "name": "...", "secret": "...", "issuer": "" }] }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::otp::types::*;

/// Version written into every export.
pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: u32,
    /// ISO-8601 with millisecond precision.
    pub exported_at: String,
    pub accounts: Vec<ExportAccount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportAccount {
    pub name: String,
    pub secret: String,
    #[serde(default)]
    pub issuer: String,
}

impl From<&Credential> for ExportAccount {
    fn from(c: &Credential) -> Self {
        Self {
            name: c.name.clone(),
            secret: c.secret.clone(),
            issuer: c.issuer.clone(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Export
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the export document. An empty list is refused.
pub fn build_document(
    credentials: &[Credential],
    exported_at: DateTime<Utc>,
) -> Result<ExportDocument, OtpError> {
    if credentials.is_empty() {
        return Err(OtpError::new(OtpErrorKind::ExportFailed, "No keys to export"));
    }
    Ok(ExportDocument {
        version: EXPORT_VERSION,
        exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        accounts: credentials.iter().map(ExportAccount::from).collect(),
    })
}

/// Pretty-printed JSON export.
pub fn export_json(credentials: &[Credential], exported_at: DateTime<Utc>) -> Result<String, OtpError> {
    let doc = build_document(credentials, exported_at)?;
    serde_json::to_string_pretty(&doc).map_err(|e| {
        OtpError::new(
            OtpErrorKind::ExportFailed,
            format!("JSON serialise error: {}", e),
        )
    })
}

/// Suggested file name, dated by the UTC day of `at`.
pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!("vimiotp-backup-{}.json", at.format("%Y-%m-%d"))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Restore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse a backup document. Newer versions are rejected; the accounts are
/// returned unvalidated so the caller can skip bad ones individually.
pub fn parse_backup(json: &str) -> Result<Vec<ExportAccount>, OtpError> {
    let doc: ExportDocument = serde_json::from_str(json).map_err(|e| {
        OtpError::new(OtpErrorKind::ImportFailed, "Not a backup document")
            .with_detail(e.to_string())
    })?;
    if doc.version > EXPORT_VERSION {
        return Err(OtpError::new(
            OtpErrorKind::ImportFailed,
            format!("Unsupported backup version {}", doc.version),
        ));
    }
    Ok(doc.accounts)
}
