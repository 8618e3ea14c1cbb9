//! Checkout Session
//!
//! One user-initiated attempt to pay for a product, from initiation to
//! terminal resolution.
//!
//! ```text
//! idle ──▶ opening ──▶ awaiting-completion ──┬──▶ resolved-success
//!             │                              ├──▶ resolved-cancelled
//!             └──────────────────────────────┴──▶ resolved-error
//! ```
//!
//! No transition leaves a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::catalog::Product;
use crate::error::CheckoutError;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Idle,
    Opening,
    AwaitingCompletion,
    ResolvedSuccess,
    ResolvedCancelled,
    ResolvedError,
}

impl SessionStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::ResolvedSuccess | Self::ResolvedCancelled | Self::ResolvedError
        )
    }

    /// Whether `next` is a legal successor of `self`
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Idle => matches!(next, Self::Opening),
            Self::Opening => matches!(
                next,
                Self::AwaitingCompletion | Self::ResolvedCancelled | Self::ResolvedError
            ),
            Self::AwaitingCompletion => next.is_terminal(),
            Self::ResolvedSuccess | Self::ResolvedCancelled | Self::ResolvedError => false,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Opening => "opening",
            Self::AwaitingCompletion => "awaiting-completion",
            Self::ResolvedSuccess => "resolved-success",
            Self::ResolvedCancelled => "resolved-cancelled",
            Self::ResolvedError => "resolved-error",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a session ended
#[derive(Debug)]
pub enum Resolution {
    /// Provider reported completion; payload is whatever the provider sent
    Success(serde_json::Value),

    /// User closed the checkout, or the UI cancelled it
    Cancelled,

    /// A newer session on the same control replaced this one; no callback fires
    Superseded,

    Error(CheckoutError),
}

impl Resolution {
    pub const fn status(&self) -> SessionStatus {
        match self {
            Self::Success(_) => SessionStatus::ResolvedSuccess,
            Self::Cancelled | Self::Superseded => SessionStatus::ResolvedCancelled,
            Self::Error(_) => SessionStatus::ResolvedError,
        }
    }
}

/// A checkout attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: SessionId,

    pub product_key: String,

    /// Provider adapter name
    pub provider: String,

    pub customer_email: Option<String>,

    pub customer_name: Option<String>,

    pub custom_data: HashMap<String, serde_json::Value>,

    pub status: SessionStatus,

    /// Landing page handed to the provider for successful payments
    pub success_url: String,

    pub created_at: DateTime<Utc>,

    pub resolved_at: Option<DateTime<Utc>>,
}

impl CheckoutSession {
    pub fn new(product: &Product, success_url: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            product_key: product.key.clone(),
            provider: product.provider.clone(),
            customer_email: None,
            customer_name: None,
            custom_data: HashMap::new(),
            status: SessionStatus::Idle,
            success_url: success_url.into(),
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Apply a status transition. Returns `false` (and changes nothing) if the
    /// transition is not allowed from the current status.
    pub fn transition(&mut self, next: SessionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }

        self.status = next;
        if next.is_terminal() {
            self.resolved_at = Some(Utc::now());
        }
        true
    }

    pub const fn is_resolved(&self) -> bool {
        self.status.is_terminal()
    }
}
