//! Error Types

use thiserror::Error;

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout error types
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Product key not present in the catalog
    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    /// Product exists but cannot be bought through a provider (free / contact-only)
    #[error("Product is not purchasable: {0}")]
    NotPurchasable(String),

    /// Product references a provider that has no registered adapter
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Browser refused to open the checkout window
    #[error("Popup blocked - please allow popups for payments")]
    PopupBlocked,

    /// Provider SDK or client could not be initialised
    #[error("Provider initialization failed: {0}")]
    ProviderInit(String),

    /// Provider reported the checkout as failed
    #[error("Checkout failed: {0}")]
    CheckoutFailed(String),

    /// Webhook or callback signature did not match
    #[error("Signature verification failed: {0}")]
    SignatureVerification(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CheckoutError {
    /// Short machine-readable code, stable across releases
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownProduct(_) => "UNKNOWN_PRODUCT",
            Self::NotPurchasable(_) => "NOT_PURCHASABLE",
            Self::UnknownProvider(_) => "UNKNOWN_PROVIDER",
            Self::PopupBlocked => "POPUP_BLOCKED",
            Self::ProviderInit(_) => "PROVIDER_UNAVAILABLE",
            Self::CheckoutFailed(_) => "CHECKOUT_FAILED",
            Self::SignatureVerification(_) => "INVALID_SIGNATURE",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::PopupBlocked => {
                "Your browser blocked the checkout window. Please allow popups for this site and try again.".into()
            }
            Self::ProviderInit(_) => "The payment system is currently unavailable. Please try again later.".into(),
            Self::CheckoutFailed(_) => "Payment failed. Please try again.".into(),
            Self::NotPurchasable(_) => "This plan is not sold online. Please contact us.".into(),
            Self::UnknownProduct(key) => format!("The product '{key}' is not available."),
            _ => "An error occurred processing your payment.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popup_blocked_guides_user() {
        let msg = CheckoutError::PopupBlocked.user_message();
        assert!(msg.contains("allow popups"));
    }

    #[test]
    fn test_init_failure_is_generic_for_users() {
        let err = CheckoutError::ProviderInit("script load timed out".into());
        assert!(!err.user_message().contains("timed out"));
        assert_eq!(err.code(), "PROVIDER_UNAVAILABLE");
    }
}
