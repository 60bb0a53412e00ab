// src/providers/mod.rs
// ProviderClient trait and error taxonomy for multi-provider support

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod gemini;
pub mod groq;
pub mod openrouter;
pub mod registry;

pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use openrouter::OpenRouterProvider;
pub use registry::{build_registry, key_looks_valid, key_prefix, validate_providers};

/// What went wrong talking to one provider.
///
/// The orchestration layer classifies on this to decide whether to retry the
/// same provider, move on to the next one, or disable the provider for the
/// rest of the process lifetime.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Credential rejected. Never retried; the provider is disabled until restart.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The provider itself returned 429.
    #[error("remote rate limit hit: {0}")]
    RateLimitedRemotely(String),

    #[error("remote error {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Transient failures are worth retrying against the same provider.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout(_)
            | ProviderError::RateLimitedRemotely(_)
            | ProviderError::Network(_)
            | ProviderError::MalformedResponse(_) => true,
            ProviderError::Remote { status, .. } => (500..=599).contains(status),
            ProviderError::Auth(_) => false,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ProviderError::Auth(_))
    }
}

/// Universal text-generation provider interface.
///
/// `timeout` is a hard deadline for the whole call, not a hint.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider name for logging and metering
    fn name(&self) -> &'static str;

    async fn generate(&self, message: &str, timeout: Duration) -> Result<String, ProviderError>;
}

/// Map a non-2xx HTTP status plus response body onto the error taxonomy.
pub(crate) fn classify_status(status: u16, body: &str) -> ProviderError {
    let message = truncate_body(body);
    match status {
        401 | 403 => ProviderError::Auth(message),
        429 => ProviderError::RateLimitedRemotely(message),
        _ => ProviderError::Remote { status, message },
    }
}

/// Map a reqwest transport error onto the error taxonomy.
pub(crate) fn classify_transport(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::Network(err.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    const MAX_CHARS: usize = 200;
    if body.chars().count() <= MAX_CHARS {
        body.to_string()
    } else {
        let mut out: String = body.chars().take(MAX_CHARS).collect();
        out.push('…');
        out
    }
}

/// Shared reqwest client for provider implementations.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(ProviderError::Network("connection reset".into()).is_retryable());
        assert!(ProviderError::RateLimitedRemotely("slow down".into()).is_retryable());
        assert!(
            ProviderError::Remote {
                status: 503,
                message: "unavailable".into()
            }
            .is_retryable()
        );
        assert!(
            !ProviderError::Remote {
                status: 400,
                message: "bad request".into()
            }
            .is_retryable()
        );
        assert!(!ProviderError::Auth("invalid key".into()).is_retryable());
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(401, "nope").is_auth());
        assert!(classify_status(403, "nope").is_auth());
        assert!(matches!(
            classify_status(429, "quota"),
            ProviderError::RateLimitedRemotely(_)
        ));
        assert!(matches!(
            classify_status(500, "boom"),
            ProviderError::Remote { status: 500, .. }
        ));
    }

    #[test]
    fn test_truncate_body_caps_length() {
        let long = "x".repeat(5000);
        let truncated = truncate_body(&long);
        assert!(truncated.len() < 300);
        assert!(truncated.ends_with('…'));
        assert_eq!(truncate_body("short"), "short");
    }
}
