//! Scan input for the command line: a text file (or stdin) where every line
//! is what an external QR decoder produced for one image.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use vimi_otp::otp::scan::{ContextId, ImageRef, ImageSource, QrDecoder};
use vimi_otp::otp::{OtpError, OtpErrorKind};

/// Where the decoded lines come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinesInput {
    Stdin,
    File(PathBuf),
}

impl LinesInput {
    /// `-` means stdin, anything else is a path.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            Self::Stdin
        } else {
            Self::File(PathBuf::from(arg))
        }
    }
}

/// Treats each non-blank line as one extracted image.
#[derive(Debug, Clone)]
pub struct DecodedLinesSource {
    input: LinesInput,
}

impl DecodedLinesSource {
    pub fn new(input: LinesInput) -> Self {
        Self { input }
    }

    async fn read_all(&self) -> Result<String, OtpError> {
        let failed = |e: std::io::Error| {
            OtpError::new(OtpErrorKind::ScanFailed, "Could not read scan input").with_detail(e.to_string())
        };
        match &self.input {
            LinesInput::Stdin => {
                let mut text = String::new();
                tokio::io::stdin().read_to_string(&mut text).await.map_err(failed)?;
                Ok(text)
            }
            LinesInput::File(path) => tokio::fs::read_to_string(path).await.map_err(failed),
        }
    }
}

#[async_trait]
impl ImageSource for DecodedLinesSource {
    async fn active_context(&self) -> Result<ContextId, OtpError> {
        Ok(ContextId(match &self.input {
            LinesInput::Stdin => "stdin".to_string(),
            LinesInput::File(path) => path.display().to_string(),
        }))
    }

    async fn extract_images(&self, _ctx: &ContextId) -> Result<Vec<ImageRef>, OtpError> {
        let text = self.read_all().await?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ImageRef::new)
            .collect())
    }
}

/// The "image" already is the decoded payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDecoder;

#[async_trait]
impl QrDecoder for PassthroughDecoder {
    async fn decode(&self, image: &ImageRef) -> Option<String> {
        Some(image.source.clone())
    }
}
