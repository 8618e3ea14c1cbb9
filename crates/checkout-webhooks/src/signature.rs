//! Provider Signing Schemes
//!
//! | Provider     | Header             | Signed bytes     | Format               |
//! |--------------|--------------------|------------------|----------------------|
//! | LemonSqueezy | `X-Signature`      | raw body         | hex HMAC-SHA256      |
//! | Paddle       | `Paddle-Signature` | `{ts}:{body}`    | `ts=<unix>;h1=<hex>` |
//!
//! Comparison goes through `Mac::verify_slice`, which is constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

use crate::error::{Result, WebhookError};

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str) -> Result<HmacSha256> {
    if secret.is_empty() {
        return Err(WebhookError::Config("webhook secret is empty".into()));
    }
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| WebhookError::Config(e.to_string()))
}

/// A provider's webhook signing scheme
pub trait SignatureScheme: Send + Sync {
    /// HTTP header carrying the signature
    fn header_name(&self) -> &'static str;

    /// Check `header` against `raw_body`, explaining any rejection
    fn check(&self, header: &str, raw_body: &[u8], secret: &str) -> Result<()>;

    /// Boolean form of [`check`](Self::check)
    fn verify(&self, header: &str, raw_body: &[u8], secret: &str) -> bool {
        self.check(header, raw_body, secret).is_ok()
    }
}

/// LemonSqueezy: hex HMAC-SHA256 of the raw body
#[derive(Clone, Copy, Debug, Default)]
pub struct LemonSqueezySignature;

impl LemonSqueezySignature {
    pub const HEADER: &'static str = "x-signature";

    /// Compute the `X-Signature` value for a body
    pub fn sign(raw_body: &[u8], secret: &str) -> Result<String> {
        let mut mac = mac(secret)?;
        mac.update(raw_body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl SignatureScheme for LemonSqueezySignature {
    fn header_name(&self) -> &'static str {
        Self::HEADER
    }

    fn check(&self, header: &str, raw_body: &[u8], secret: &str) -> Result<()> {
        let signature = hex::decode(header.trim())
            .map_err(|e| WebhookError::MalformedSignature(e.to_string()))?;

        let mut mac = mac(secret)?;
        mac.update(raw_body);
        mac.verify_slice(&signature)
            .map_err(|_| WebhookError::InvalidSignature)
    }
}

/// Parsed `Paddle-Signature` header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaddleSignatureHeader {
    pub timestamp: i64,
    /// One entry per active secret during rotation
    pub signatures: Vec<Vec<u8>>,
}

impl PaddleSignatureHeader {
    /// Parse `ts=<unix>;h1=<hex>[;h1=<hex>...]`
    pub fn parse(header: &str) -> Result<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(';') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| WebhookError::MalformedSignature("invalid header format".into()))?;

            match key {
                "ts" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::MalformedSignature("invalid timestamp".into())
                    })?);
                }
                "h1" => signatures.push(
                    hex::decode(value)
                        .map_err(|_| WebhookError::MalformedSignature("invalid h1 signature hex".into()))?,
                ),
                // Unknown fields are allowed for forward compatibility
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| WebhookError::MalformedSignature("missing ts".into()))?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedSignature("missing h1".into()));
        }

        Ok(Self { timestamp, signatures })
    }
}

/// Paddle Billing: HMAC-SHA256 over `{ts}:{body}`, optional replay window
#[derive(Clone, Copy, Debug, Default)]
pub struct PaddleSignature {
    tolerance: Option<Duration>,
}

impl PaddleSignature {
    pub const HEADER: &'static str = "paddle-signature";

    pub const fn new() -> Self {
        Self { tolerance: None }
    }

    /// Reject signatures whose timestamp is further than `tolerance` from now
    pub const fn with_tolerance(tolerance: Duration) -> Self {
        Self {
            tolerance: Some(tolerance),
        }
    }

    /// Compute a full `Paddle-Signature` header value
    pub fn sign(timestamp: i64, raw_body: &[u8], secret: &str) -> Result<String> {
        let mut mac = mac(secret)?;
        mac.update(format!("{timestamp}:").as_bytes());
        mac.update(raw_body);
        Ok(format!("ts={timestamp};h1={}", hex::encode(mac.finalize().into_bytes())))
    }

    /// [`check`](SignatureScheme::check) against an explicit clock
    pub fn check_at(&self, header: &str, raw_body: &[u8], secret: &str, now: i64) -> Result<()> {
        let parsed = PaddleSignatureHeader::parse(header)?;

        // `ts` is unauthenticated here, so the arithmetic must not overflow
        if let Some(tolerance) = self.tolerance {
            if now.abs_diff(parsed.timestamp) > tolerance.as_secs() {
                return Err(WebhookError::TimestampOutOfRange {
                    age_secs: now.saturating_sub(parsed.timestamp),
                });
            }
        }

        let mut mac = mac(secret)?;
        mac.update(format!("{}:", parsed.timestamp).as_bytes());
        mac.update(raw_body);

        let matched = parsed
            .signatures
            .iter()
            .any(|candidate| mac.clone().verify_slice(candidate).is_ok());
        if matched {
            Ok(())
        } else {
            Err(WebhookError::InvalidSignature)
        }
    }
}

impl SignatureScheme for PaddleSignature {
    fn header_name(&self) -> &'static str {
        Self::HEADER
    }

    fn check(&self, header: &str, raw_body: &[u8], secret: &str) -> Result<()> {
        self.check_at(header, raw_body, secret, chrono::Utc::now().timestamp())
    }
}
