//! Classified outcomes of outbound platform calls.
//!
//! Classification happens here, at the lowest layer: callers map an
//! [`ApiError`] to an externally visible status and message via
//! [`ApiError::http_status`] / [`ApiError::user_message`] and never
//! re-derive it. Retries are contained in the client: intermediate attempt
//! failures are never surfaced, only the final outcome.

use crate::credentials::Service;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No key anywhere: no stored credential and no environment fallback.
    #[error("Add {} API key in Settings", .service.display_name())]
    NotConfigured { service: Service },

    /// A stored credential exists but no longer decrypts. Deliberately not
    /// masked by the environment fallback; the user must re-enter the key.
    #[error("Invalid {} API key. Please re-enter it in Settings.", .service.display_name())]
    InvalidStoredKey { service: Service },

    /// Operator misconfiguration: the master encryption secret is absent.
    #[error("encryption secret is not configured: {0}")]
    MissingSecret(String),

    /// The provider answered with a non-2xx status.
    #[error("{} request failed with status {status}", .service.display_name())]
    Upstream {
        service: Service,
        status: u16,
        /// Provider error body, logged but never shown to end users.
        message: Option<String>,
        retryable: bool,
    },

    /// No response at all (DNS, connect, read) after all attempts.
    #[error("Network error. Please check your connection.")]
    Network { attempts: u32 },

    /// The credential lookup pool is saturated.
    #[error("Service is busy. Please try again later.")]
    ResourceExhausted,

    /// The caller's cancellation signal fired.
    #[error("request cancelled")]
    Cancelled,

    /// A 2xx body that failed to parse as the expected JSON shape.
    #[error("invalid response body")]
    Decode(#[source] reqwest::Error),

    /// Credential store failure other than saturation.
    #[error("credential store error")]
    Store(#[source] anyhow::Error),
}

impl ApiError {
    /// The externally visible HTTP status a request handler should answer
    /// with. Credential problems are the caller's to fix (400); transient
    /// infrastructure problems ask for a retry (503).
    pub fn http_status(&self) -> u16 {
        match self {
            ApiError::NotConfigured { .. } | ApiError::InvalidStoredKey { .. } => 400,
            ApiError::MissingSecret(_) | ApiError::Store(_) => 500,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Network { .. } | ApiError::ResourceExhausted => 503,
            ApiError::Cancelled => 499,
            ApiError::Decode(_) => 502,
        }
    }

    /// Message safe to show an end user. Actionable for credential issues,
    /// generic for everything upstream; raw provider bodies stay in logs.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::NotConfigured { .. }
            | ApiError::InvalidStoredKey { .. }
            | ApiError::Network { .. }
            | ApiError::ResourceExhausted => self.to_string(),
            ApiError::MissingSecret(_) | ApiError::Store(_) => {
                "Internal configuration error. Contact the operator.".to_string()
            }
            ApiError::Upstream {
                service, retryable, ..
            } => {
                if *retryable {
                    format!(
                        "{} is temporarily unavailable. Please try again later.",
                        service.display_name()
                    )
                } else {
                    format!("{} rejected the request.", service.display_name())
                }
            }
            ApiError::Cancelled => "Request cancelled.".to_string(),
            ApiError::Decode(_) => "Unexpected response from the provider.".to_string(),
        }
    }

    /// True for outcomes that might succeed on a later identical request.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::Upstream {
                retryable: true,
                ..
            } | ApiError::Network { .. }
                | ApiError::ResourceExhausted
        )
    }
}
