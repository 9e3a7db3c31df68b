//! Client Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, DebiError>;

/// Errors raised while talking to the debi API or verifying its webhooks
#[derive(Error, Debug)]
pub enum DebiError {
    /// The API answered with a non-success status
    #[error("{message} (HTTP {status})")]
    RequestFailed { status: u16, message: String },

    /// Transport-level failure (DNS, TLS, timeout, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A success response whose body is not JSON
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload is not a JSON event object
    #[error("Webhook payload invalid: {0}")]
    WebhookPayload(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DebiError {
    /// HTTP status returned by the API, when there was one
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed { status, .. } => *status == 429 || *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            Self::RequestFailed { .. } | Self::Http(_) | Self::InvalidResponse(_) => {
                "Payment processing failed. Please try again."
            }
            Self::WebhookSignature(_) => "Bad signature",
            Self::WebhookPayload(_) => "Bad payload",
            Self::Config(_) | Self::Json(_) => "Service configuration error.",
        }
    }
}
