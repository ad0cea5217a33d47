//! High-level orchestrator: owns the credential store and the code
//! settings, and ties the parser, scanner and exporter to it.

use std::sync::Arc;
use tokio::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::otp::core;
use crate::otp::export;
use crate::otp::persist::CredentialPersistence;
use crate::otp::scan::{self, ImageSource, QrDecoder, ScanCandidates, ScanOutcome};
use crate::otp::scheduler::{Clock, RefreshScheduler, SystemClock};
use crate::otp::storage::CredentialStore;
use crate::otp::types::*;
use crate::otp::uri;

/// Shared service state. Every mutation holds the lock for its whole run.
pub type OtpServiceState = Arc<Mutex<OtpService>>;

/// Result of restoring a backup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub added: usize,
    pub skipped_duplicates: usize,
    pub skipped_invalid: usize,
}

/// A ready-to-write export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBundle {
    pub file_name: String,
    pub json: String,
}

pub struct OtpService {
    store: CredentialStore,
    period: u32,
    digits: u8,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for OtpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpService")
            .field("store", &self.store)
            .field("period", &self.period)
            .field("digits", &self.digits)
            .finish()
    }
}

impl OtpService {
    /// Service with default settings and the system clock.
    pub fn new(persistence: Box<dyn CredentialPersistence>) -> Result<OtpServiceState, OtpError> {
        Self::with_settings(
            persistence,
            DEFAULT_PERIOD,
            DEFAULT_DIGITS,
            Arc::new(SystemClock),
        )
    }

    pub fn with_settings(
        persistence: Box<dyn CredentialPersistence>,
        period: u32,
        digits: u8,
        clock: Arc<dyn Clock>,
    ) -> Result<OtpServiceState, OtpError> {
        let service = OtpService {
            period: core::validate_period(period)?,
            digits: core::validate_digits(digits)?,
            store: CredentialStore::load(persistence)?,
            clock,
        };
        Ok(Arc::new(Mutex::new(service)))
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn digits(&self) -> u8 {
        self.digits
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Credentials
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn list(&self) -> &[Credential] {
        self.store.list()
    }

    pub fn get(&self, id: &str) -> Result<&Credential, OtpError> {
        self.store.get(id).ok_or_else(|| {
            OtpError::new(OtpErrorKind::NotFound, format!("Credential {} not found", id))
        })
    }

    /// Add from the manual-entry form: name and secret only.
    pub fn add_manual(&mut self, name: &str, secret: &str) -> Result<Credential, OtpError> {
        self.store.add(name, secret, "")
    }

    pub fn add(&mut self, name: &str, secret: &str, issuer: &str) -> Result<Credential, OtpError> {
        self.store.add(name, secret, issuer)
    }

    /// Idempotent; `false` when the id was not present.
    pub fn delete(&mut self, id: &str) -> bool {
        self.store.delete(id)
    }

    /// Parse a pasted `otpauth://` URI and store it.
    pub fn accept_uri(&mut self, text: &str) -> Result<Credential, OtpError> {
        let c = uri::parse_otpauth_uri(text).ok_or_else(|| {
            OtpError::new(OtpErrorKind::InvalidUri, "Not a usable otpauth://totp URI")
        })?;
        self.store.add(&c.name, &c.secret, &c.issuer)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Codes
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Codes for every credential at an explicit instant. A credential whose
    /// code cannot be computed shows the placeholder.
    pub fn codes_at(&self, unix_seconds: u64) -> Vec<CodeView> {
        self.store
            .list()
            .iter()
            .map(|cred| {
                let code = core::code_or_placeholder(&cred.secret, unix_seconds, self.period, self.digits);
                CodeView {
                    id: cred.id.clone(),
                    display_name: cred.display_name(),
                    formatted: core::format_code_display(&code),
                    code,
                }
            })
            .collect()
    }

    pub fn current_codes(&self) -> Vec<CodeView> {
        self.codes_at(self.clock.now())
    }

    /// A scheduler configured like this service and sharing its clock.
    pub fn scheduler(&self) -> Result<RefreshScheduler, OtpError> {
        RefreshScheduler::new(self.clock.clone(), self.period)?.with_digits(self.digits)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Scan
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Run a scan and apply the batch policy. The lock is only taken once
    /// decoding is done, so ticks keep flowing while images are decoded.
    pub async fn scan(
        state: &OtpServiceState,
        source: &dyn ImageSource,
        decoder: &dyn QrDecoder,
    ) -> Result<ScanOutcome, OtpError> {
        let candidates = scan::scan_candidates(source, decoder).await?;
        let mut service = state.lock().await;
        let outcome = ScanOutcome::resolve(candidates, &mut service.store)?;
        match &outcome {
            ScanOutcome::Added { credential } => {
                log::info!("Scan added {}", credential.display_name())
            }
            ScanOutcome::Choose { candidates } => {
                log::info!("Scan found {} candidates", candidates.len())
            }
        }
        Ok(outcome)
    }

    /// Accept one item of a multi-candidate scan.
    pub fn accept_scanned(
        &mut self,
        pending: &mut ScanCandidates,
        index: usize,
    ) -> Result<Option<Credential>, OtpError> {
        pending.accept(index, &mut self.store)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Export / import
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn export(&self) -> Result<ExportBundle, OtpError> {
        let now = Utc::now();
        Ok(ExportBundle {
            json: export::export_json(self.store.list(), now)?,
            file_name: export::backup_file_name(now),
        })
    }

    /// Restore a backup. Accounts whose secret is already stored are skipped,
    /// as are accounts that fail validation; neither aborts the rest.
    pub fn import_backup(&mut self, json: &str) -> Result<ImportSummary, OtpError> {
        let accounts = export::parse_backup(json)?;
        let mut summary = ImportSummary::default();
        for account in accounts {
            if self.store.contains_secret(&account.secret) {
                summary.skipped_duplicates += 1;
                continue;
            }
            match self.store.add(&account.name, &account.secret, &account.issuer) {
                Ok(_) => summary.added += 1,
                Err(e) => {
                    log::warn!("Skipping backup entry {:?}: {}", account.name, e);
                    summary.skipped_invalid += 1;
                }
            }
        }
        log::info!(
            "Backup restored: {} added, {} duplicates, {} invalid",
            summary.added,
            summary.skipped_duplicates,
            summary.skipped_invalid
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::persist::MemoryPersistence;
    use crate::otp::scan::{ContextId, ImageRef};
    use crate::otp::scheduler::ManualClock;
    use async_trait::async_trait;

    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn service_at(t: u64) -> (OtpServiceState, MemoryPersistence) {
        let p = MemoryPersistence::new();
        let state = OtpService::with_settings(
            Box::new(p.clone()),
            30,
            6,
            Arc::new(ManualClock::new(t)),
        )
        .unwrap();
        (state, p)
    }

    #[test]
    fn settings_are_validated() {
        let p = || Box::new(MemoryPersistence::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let err = OtpService::with_settings(p(), 0, 6, clock.clone()).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidPeriod);
        let err = OtpService::with_settings(p(), 30, 5, clock).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidDigits);
    }

    #[tokio::test]
    async fn manual_entry_messages() {
        let (state, _) = service_at(0);
        let mut svc = state.lock().await;
        let err = svc.add_manual("  ", RFC_SECRET).unwrap_err();
        assert_eq!(err.message, "Account name is required");
        let err = svc.add_manual("alice", "abc!").unwrap_err();
        assert_eq!(err.message, "A valid Base32 secret is required");
        let c = svc.add_manual(" alice ", "gezd gnbv gy3t qojq gezd gnbv gy3t qojq").unwrap();
        assert_eq!(c.secret, RFC_SECRET);
        assert_eq!(c.issuer, "");
    }

    #[tokio::test]
    async fn codes_follow_the_clock() {
        let (state, _) = service_at(59);
        let mut svc = state.lock().await;
        svc.add("alice", RFC_SECRET, "Acme").unwrap();
        let codes = svc.current_codes();
        assert_eq!(codes[0].code, "287082");
        assert_eq!(codes[0].formatted, "287 082");
        assert_eq!(codes[0].display_name, "Acme (alice)");
        assert_eq!(svc.codes_at(59), codes);
    }

    #[tokio::test]
    async fn accept_uri_adds_or_rejects() {
        let (state, p) = service_at(0);
        let mut svc = state.lock().await;
        let c = svc
            .accept_uri("otpauth://totp/Example:alice@example.com?secret=JBSWY3DPEHPK3PXP&issuer=Example")
            .unwrap();
        assert_eq!(c.name, "alice@example.com");
        assert_eq!(c.issuer, "Example");
        assert_eq!(p.snapshot().len(), 1);

        let err = svc.accept_uri("otpauth://hotp/x?secret=JBSWY3DPEHPK3PXP").unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidUri);
    }

    #[tokio::test]
    async fn get_and_delete() {
        let (state, _) = service_at(0);
        let mut svc = state.lock().await;
        let c = svc.add_manual("alice", RFC_SECRET).unwrap();
        assert_eq!(svc.get(&c.id).unwrap().name, "alice");
        assert!(svc.delete(&c.id));
        assert!(!svc.delete(&c.id));
        assert_eq!(svc.get(&c.id).unwrap_err().kind, OtpErrorKind::NotFound);
    }

    #[tokio::test]
    async fn export_then_import_into_fresh_service() {
        let (state, _) = service_at(0);
        let bundle = {
            let mut svc = state.lock().await;
            svc.add("alice", RFC_SECRET, "Acme").unwrap();
            svc.add_manual("bob", "JBSWY3DPEHPK3PXP").unwrap();
            svc.export().unwrap()
        };
        assert!(bundle.file_name.starts_with("vimiotp-backup-"));

        let (other, _) = service_at(0);
        let mut svc = other.lock().await;
        svc.add_manual("already", "JBSWY3DPEHPK3PXP").unwrap();
        let summary = svc.import_backup(&bundle.json).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                added: 1,
                skipped_duplicates: 1,
                skipped_invalid: 0
            }
        );
        assert_eq!(svc.list().len(), 2);
    }

    #[tokio::test]
    async fn import_skips_invalid_entries() {
        let (state, _) = service_at(0);
        let mut svc = state.lock().await;
        let json = r#"{"version":1,"exportedAt":"x","accounts":[
            {"name":"ok","secret":"JBSWY3DPEHPK3PXP"},
            {"name":"","secret":"GEZDGNBVGY3TQOJQ"},
            {"name":"bad","secret":"????"}
        ]}"#;
        let summary = svc.import_backup(json).unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.skipped_invalid, 2);
    }

    #[tokio::test]
    async fn export_of_empty_list_fails() {
        let (state, _) = service_at(0);
        let err = state.lock().await.export().unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::ExportFailed);
    }

    struct Page(Vec<&'static str>);

    #[async_trait]
    impl ImageSource for Page {
        async fn active_context(&self) -> Result<ContextId, OtpError> {
            Ok(ContextId("page".into()))
        }
        async fn extract_images(&self, _ctx: &ContextId) -> Result<Vec<ImageRef>, OtpError> {
            Ok(self.0.iter().map(|s| ImageRef::new(*s)).collect())
        }
    }

    /// The image "source" already is the payload.
    struct Echo;

    #[async_trait]
    impl QrDecoder for Echo {
        async fn decode(&self, image: &ImageRef) -> Option<String> {
            Some(image.source.clone())
        }
    }

    #[tokio::test]
    async fn scan_with_one_code_adds_it() {
        let (state, _) = service_at(0);
        let page = Page(vec!["otpauth://totp/A:alice?secret=JBSWY3DPEHPK3PXP&issuer=A"]);
        let outcome = OtpService::scan(&state, &page, &Echo).await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Added { .. }));
        assert_eq!(state.lock().await.list().len(), 1);
    }

    #[tokio::test]
    async fn scan_with_duplicates_offers_unique_choices() {
        let (state, _) = service_at(0);
        let page = Page(vec![
            "otpauth://totp/A:alice?secret=JBSWY3DPEHPK3PXP",
            "otpauth://totp/A:alice?secret=JBSWY3DPEHPK3PXP",
            "otpauth://totp/B:bob?secret=GEZDGNBVGY3TQOJQ",
        ]);
        let outcome = OtpService::scan(&state, &page, &Echo).await.unwrap();
        let ScanOutcome::Choose { mut candidates } = outcome else {
            panic!("expected a choice");
        };
        assert_eq!(candidates.len(), 2);

        let mut svc = state.lock().await;
        assert!(svc.accept_scanned(&mut candidates, 0).unwrap().is_some());
        assert!(svc.accept_scanned(&mut candidates, 0).unwrap().is_none());
        assert_eq!(svc.list().len(), 1);
    }
}
