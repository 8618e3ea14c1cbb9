//! Webhook Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, WebhookError>;

/// Webhook-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// Request carried no signature header
    #[error("Webhook signature missing")]
    MissingSignature,

    /// Signature header could not be decoded
    #[error("Webhook signature malformed: {0}")]
    MalformedSignature(String),

    /// Signature did not match the payload
    #[error("Webhook signature invalid")]
    InvalidSignature,

    /// Signed timestamp outside the accepted window
    #[error("Webhook timestamp out of range: {age_secs}s old")]
    TimestampOutOfRange { age_secs: i64 },

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WebhookError {
    /// Whether the request was rejected because it could not be authenticated
    pub const fn is_signature_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingSignature
                | Self::MalformedSignature(_)
                | Self::InvalidSignature
                | Self::TimestampOutOfRange { .. }
        )
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingSignature => "Signature header is required.".into(),
            Self::MalformedSignature(_) | Self::InvalidSignature => "Invalid webhook signature.".into(),
            Self::TimestampOutOfRange { .. } => "Webhook signature has expired.".into(),
            Self::Parse(_) => "Webhook payload could not be parsed.".into(),
            Self::Config(_) => "Webhook endpoint is not configured.".into(),
        }
    }

    /// Short machine-readable code for HTTP error bodies
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingSignature => "MISSING_SIGNATURE",
            Self::MalformedSignature(_) | Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::TimestampOutOfRange { .. } => "EXPIRED_SIGNATURE",
            Self::Parse(_) => "INVALID_PAYLOAD",
            Self::Config(_) => "WEBHOOK_MISCONFIGURED",
        }
    }
}
