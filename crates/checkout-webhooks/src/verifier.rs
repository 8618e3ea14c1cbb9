//! Webhook Verifier
//!
//! Authenticates a provider notification and only then parses it. A request
//! that fails any check is rejected as a whole and logged.

use std::time::Duration;

use crate::error::{Result, WebhookError};
use crate::event::{WebhookEvent, WebhookProvider};
use crate::signature::{LemonSqueezySignature, PaddleSignature, SignatureScheme};

/// Per-provider verifier holding the shared secret
pub struct WebhookVerifier {
    provider: WebhookProvider,
    secret: String,
    scheme: Box<dyn SignatureScheme>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("provider", &self.provider)
            .field("secret", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Create a verifier. Empty secrets are refused.
    pub fn new(provider: WebhookProvider, secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(WebhookError::Config(format!("{provider} webhook secret is empty")));
        }

        let scheme: Box<dyn SignatureScheme> = match provider {
            WebhookProvider::LemonSqueezy => Box::new(LemonSqueezySignature),
            WebhookProvider::Paddle => Box::new(PaddleSignature::new()),
        };

        Ok(Self {
            provider,
            secret,
            scheme,
        })
    }

    pub fn lemonsqueezy(secret: impl Into<String>) -> Result<Self> {
        Self::new(WebhookProvider::LemonSqueezy, secret)
    }

    /// Paddle verifier with a replay window around the signed timestamp
    pub fn paddle(secret: impl Into<String>, tolerance: Duration) -> Result<Self> {
        let mut verifier = Self::new(WebhookProvider::Paddle, secret)?;
        verifier.scheme = Box::new(PaddleSignature::with_tolerance(tolerance));
        Ok(verifier)
    }

    pub const fn provider(&self) -> WebhookProvider {
        self.provider
    }

    /// HTTP header this verifier reads the signature from
    pub fn header_name(&self) -> &'static str {
        self.scheme.header_name()
    }

    /// Whether `signature_header` authenticates `raw_body`
    pub fn verify(&self, signature_header: &str, raw_body: &[u8]) -> bool {
        self.scheme.verify(signature_header, raw_body, &self.secret)
    }

    /// Parse without authenticating; `signature_valid` stays false
    pub fn parse(&self, raw_body: &[u8]) -> Result<WebhookEvent> {
        self.provider.parse(raw_body)
    }

    /// Verify, then parse. Nothing is parsed from an unauthenticated body.
    pub fn verify_and_parse(&self, signature_header: Option<&str>, raw_body: &[u8]) -> Result<WebhookEvent> {
        let result = signature_header
            .filter(|header| !header.trim().is_empty())
            .ok_or(WebhookError::MissingSignature)
            .and_then(|header| self.scheme.check(header, raw_body, &self.secret))
            .and_then(|()| self.parse(raw_body))
            .map(WebhookEvent::verified);

        match &result {
            Ok(event) => tracing::info!(
                provider = %self.provider,
                event_type = %event.event_type,
                kind = %event.kind,
                event_id = ?event.event_id,
                "Verified webhook"
            ),
            Err(e) if e.is_signature_failure() => tracing::warn!(
                provider = %self.provider,
                error = %e,
                body_len = raw_body.len(),
                "Rejected unauthenticated webhook"
            ),
            Err(e) => tracing::warn!(
                provider = %self.provider,
                error = %e,
                "Rejected authenticated webhook with unusable payload"
            ),
        }

        result
    }
}
