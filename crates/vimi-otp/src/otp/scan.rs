//! QR scan pipeline: find images in the active context, run the decoder on
//! each, and turn whatever `otpauth://` payloads come back into candidates.
//!
//! Pixel decoding is not done here. A [`QrDecoder`] returns the payload of
//! one image (or nothing) and an [`ImageSource`] supplies the images.

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::otp::storage::CredentialStore;
use crate::otp::types::*;
use crate::otp::uri;

/// Handle on whatever the images are extracted from (a page, a directory...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub String);

/// One extracted image: a URL, data URL or file path the decoder understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub source: String,
}

impl ImageRef {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// The context the user is currently looking at.
    async fn active_context(&self) -> Result<ContextId, OtpError>;
    /// Every candidate image in `ctx`, in document order.
    async fn extract_images(&self, ctx: &ContextId) -> Result<Vec<ImageRef>, OtpError>;
}

#[async_trait]
pub trait QrDecoder: Send + Sync {
    /// Payload of the first QR code found in the image, if any.
    async fn decode(&self, image: &ImageRef) -> Option<String>;
}

/// Extract and decode every image, returning deduplicated candidates in
/// extraction order.
///
/// Decodes run concurrently; results are still consumed in the order the
/// images were extracted so "first wins" dedup is reproducible.
pub async fn scan_candidates(
    source: &dyn ImageSource,
    decoder: &dyn QrDecoder,
) -> Result<Vec<OtpCandidate>, OtpError> {
    let ctx = source.active_context().await.map_err(scan_failed)?;
    let images = source.extract_images(&ctx).await.map_err(scan_failed)?;
    if images.is_empty() {
        return Err(OtpError::new(OtpErrorKind::NoImages, "No images found"));
    }

    let decoded = join_all(images.iter().map(|img| decoder.decode(img))).await;
    log::debug!(
        "Decoded {} of {} images in {:?}",
        decoded.iter().filter(|d| d.is_some()).count(),
        images.len(),
        ctx.0
    );

    let candidates = uri::parse_scanned(decoded.into_iter().flatten());
    if candidates.is_empty() {
        return Err(OtpError::new(
            OtpErrorKind::NoValidCodes,
            "No valid OTP QR codes found",
        ));
    }
    Ok(candidates)
}

fn scan_failed(e: OtpError) -> OtpError {
    OtpError::new(OtpErrorKind::ScanFailed, format!("Scan failed: {}", e.message))
        .with_detail(format!("{:?}", e.kind))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A scanned candidate and, once accepted, the id it was stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanItem {
    pub candidate: OtpCandidate,
    pub added_id: Option<String>,
}

impl ScanItem {
    pub fn is_added(&self) -> bool {
        self.added_id.is_some()
    }
}

/// Candidates of one scan, waiting for per-item acceptance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCandidates {
    pub items: Vec<ScanItem>,
}

impl ScanCandidates {
    pub fn new(candidates: Vec<OtpCandidate>) -> Self {
        Self {
            items: candidates
                .into_iter()
                .map(|candidate| ScanItem {
                    candidate,
                    added_id: None,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Store the candidate at `index`. Accepting an item twice returns
    /// `Ok(None)` and leaves the store untouched.
    pub fn accept(
        &mut self,
        index: usize,
        store: &mut CredentialStore,
    ) -> Result<Option<Credential>, OtpError> {
        let item = self.items.get_mut(index).ok_or_else(|| {
            OtpError::new(OtpErrorKind::NotFound, format!("No scanned item at index {}", index))
        })?;
        if item.is_added() {
            return Ok(None);
        }
        let c = &item.candidate;
        let cred = store.add(&c.name, &c.secret, &c.issuer)?;
        item.added_id = Some(cred.id.clone());
        Ok(Some(cred))
    }
}

/// What a scan did with its candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Exactly one candidate was found and stored straight away.
    Added { credential: Credential },
    /// Several candidates; each must be accepted explicitly.
    Choose { candidates: ScanCandidates },
}

impl ScanOutcome {
    /// One candidate is stored immediately; more are handed back for choice.
    pub fn resolve(
        candidates: Vec<OtpCandidate>,
        store: &mut CredentialStore,
    ) -> Result<Self, OtpError> {
        match candidates.len() {
            0 => Err(OtpError::new(
                OtpErrorKind::NoValidCodes,
                "No valid OTP QR codes found",
            )),
            1 => {
                let mut pending = ScanCandidates::new(candidates);
                match pending.accept(0, store)? {
                    Some(credential) => Ok(Self::Added { credential }),
                    None => Err(OtpError::new(OtpErrorKind::Internal, "Candidate already accepted")),
                }
            }
            _ => Ok(Self::Choose {
                candidates: ScanCandidates::new(candidates),
            }),
        }
    }
}
