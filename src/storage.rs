//! # Credential file
//!
//! Durable home of the credential list: a pretty-printed JSON file holding
//! `{ "otpList": [...] }`. A missing file reads as an empty list.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use vimi_otp::otp::{Credential, CredentialPersistence, OtpError, OtpErrorKind};

pub const CREDENTIALS_FILE: &str = "credentials.json";

/// On-disk layout.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredData {
    #[serde(default)]
    otp_list: Vec<Credential>,
}

/// File-backed [`CredentialPersistence`].
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The credentials file inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(CREDENTIALS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn failure(&self, what: &str, e: impl std::fmt::Display) -> OtpError {
        OtpError::new(
            OtpErrorKind::PersistenceFailure,
            format!("Failed to {} {}", what, self.path.display()),
        )
        .with_detail(e.to_string())
    }
}

impl CredentialPersistence for JsonFilePersistence {
    fn get(&self) -> Result<Vec<Credential>, OtpError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| self.failure("read", e))?;
        let data: StoredData = serde_json::from_str(&text).map_err(|e| self.failure("parse", e))?;
        Ok(data.otp_list)
    }

    /// Writes a sibling temp file, then renames it over the target, so an
    /// interrupted save leaves the previous file intact.
    fn set(&self, credentials: &[Credential]) -> Result<(), OtpError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.failure("create directory for", e))?;
        let data = StoredData {
            otp_list: credentials.to_vec(),
        };
        let json = serde_json::to_string_pretty(&data).map_err(|e| self.failure("serialise", e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.failure("stage", e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| self.failure("write", e))?;
        tmp.persist(&self.path).map_err(|e| self.failure("replace", e.error))?;
        Ok(())
    }
}
