//! Ports for external collaborators owned by the orchestration layer.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ServiceError, StageCause};

/// PDF text extraction boundary.
#[async_trait]
pub trait PdfTextExtractor: Send + Sync {
    /// Extract plain text from the raw PDF bytes.
    async fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, ServiceError>;
}

/// Passthrough extractor for deterministic runtime mode and tests: treats the
/// payload as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl PdfTextExtractor for PlainTextExtractor {
    async fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, ServiceError> {
        String::from_utf8(pdf_bytes.to_vec())
            .map_err(|e| ServiceError::stage(StageCause::Extract, format!("invalid UTF-8: {e}")))
    }
}

/// Async sleep boundary so retry loops are testable without waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Tokio-backed sleeper used at runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
