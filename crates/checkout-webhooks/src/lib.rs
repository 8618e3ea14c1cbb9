//! # checkout-webhooks
//!
//! Server-side verification of provider webhooks.
//!
//! Webhooks are the only trustworthy confirmation of payment. Browser-side
//! checkout events can be spoofed or missed, so downstream systems should act
//! on a [`WebhookEvent`] only when `signature_valid` is set.
//!
//! ```text
//! raw body + signature header
//!        │
//!        ▼
//! ┌─────────────────┐   reject   ┌──────────────┐
//! │ SignatureScheme │──────────▶ │ WebhookError │  (logged, never parsed)
//! └─────────────────┘            └──────────────┘
//!        │ ok
//!        ▼
//! ┌─────────────────┐
//! │  WebhookEvent   │  provider, kind, event_id, payload
//! └─────────────────┘
//! ```
//!
//! Verification is stateless and safe to run concurrently.

pub mod error;
pub mod event;
pub mod signature;
pub mod verifier;

pub use error::{Result, WebhookError};
pub use event::{WebhookEvent, WebhookEventKind, WebhookProvider};
pub use signature::{LemonSqueezySignature, PaddleSignature, PaddleSignatureHeader, SignatureScheme};
pub use verifier::WebhookVerifier;
