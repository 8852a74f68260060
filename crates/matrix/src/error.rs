//! Typed error enum for the Matrix adapter.

use thiserror::Error;

/// Errors from Matrix client-server API operations.
#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("matrix API status {status}: {body}")]
    Api {
        status: u16,
        body: String,
        /// Server-provided backoff for `M_LIMIT_EXCEEDED` responses.
        retry_after_ms: Option<u64>,
    },

    #[error("invalid mxc url: {0}")]
    InvalidMediaUrl(String),
}

impl MatrixError {
    /// Build an API error, extracting `retry_after_ms` from the body.
    pub fn from_status(status: u16, body: String) -> Self {
        let retry_after_ms = extract_retry_after_ms(&body);
        Self::Api { status, body, retry_after_ms }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Api { status: 429, .. })
    }

    /// Backoff hint for rate-limited calls.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::Api { retry_after_ms, status: 429, .. } => Some(retry_after_ms.unwrap_or(0)),
            _ => None,
        }
    }

    /// Transient failures worth a queue-level retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::InvalidMediaUrl(_) => false,
        }
    }
}

fn extract_retry_after_ms(body: &str) -> Option<u64> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    parsed.get("retry_after_ms")?.as_u64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_is_extracted_from_limit_exceeded_body() {
        let error = MatrixError::from_status(
            429,
            r#"{"errcode":"M_LIMIT_EXCEEDED","error":"Too Many Requests","retry_after_ms":500}"#
                .to_owned(),
        );

        assert!(error.is_rate_limited());
        assert_eq!(error.retry_after_ms(), Some(500));
    }

    #[test]
    fn rate_limit_without_hint_yields_zero() {
        let error = MatrixError::from_status(429, "Too Many Requests".to_owned());

        assert_eq!(error.retry_after_ms(), Some(0));
    }

    #[test]
    fn non_429_has_no_retry_hint() {
        let error = MatrixError::from_status(500, r#"{"retry_after_ms":500}"#.to_owned());

        assert_eq!(error.retry_after_ms(), None);
        assert!(error.is_transient());
    }
}
