//! Payment Provider Strategy Pattern
//!
//! Defines a common interface for payment providers (LemonSqueezy, Paddle, ...)
//! so the session manager can open a checkout without knowing which provider
//! sits behind it.
//!
//! Two capability variants exist:
//!
//! - **Popup** adapters open a new browsing context and can only be observed by
//!   polling whether it has been closed.
//! - **Embedded** adapters drive a provider SDK that reports typed events.
//!
//! Both hand back a [`ProviderHandle`], which is what the
//! [`CompletionWatcher`](crate::watcher::CompletionWatcher) observes.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CheckoutError, Result};

/// Generic "start checkout" request handed to an adapter
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OpenRequest {
    /// Provider-side product identifier from the catalog
    pub product_id: String,

    #[serde(default)]
    pub customer_email: Option<String>,

    #[serde(default)]
    pub customer_name: Option<String>,

    /// Free-form fields echoed back by the provider in its webhooks
    #[serde(default)]
    pub custom_data: HashMap<String, serde_json::Value>,

    /// Landing page once the provider considers the payment done
    pub success_url: String,
}

/// Failure to inspect a checkout surface.
///
/// Reading the state of a cross-origin window is allowed to fail; callers
/// treat this as "unknown right now" and try again later.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceAccessError(pub String);

impl std::fmt::Display for SurfaceAccessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface not accessible: {}", self.0)
    }
}

/// An open checkout surface (popup window, overlay, iframe)
pub trait CheckoutSurface: Send + Sync {
    /// Whether the surface has been closed by the user or the provider
    fn is_closed(&self) -> std::result::Result<bool, SurfaceAccessError>;

    /// Close the surface if it is still open. Must be idempotent.
    fn close(&self);
}

/// Typed event emitted by a provider SDK
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderEvent {
    /// Event name, e.g. `checkout.completed`
    pub name: String,

    #[serde(default)]
    pub data: serde_json::Value,
}

/// Event names the watcher acts on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderEventKind {
    Completed,
    Error,
    Closed,
    Other,
}

impl ProviderEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn kind(&self) -> ProviderEventKind {
        match self.name.as_str() {
            "checkout.completed" => ProviderEventKind::Completed,
            "checkout.error" => ProviderEventKind::Error,
            "checkout.closed" => ProviderEventKind::Closed,
            _ => ProviderEventKind::Other,
        }
    }
}

/// Stream of provider events for one checkout
pub type ProviderEventStream = Pin<Box<dyn Stream<Item = ProviderEvent> + Send>>;

/// Opaque handle to an open checkout.
///
/// Dropping the handle releases it: the event subscription is dropped and the
/// surface is closed if it is still open.
pub struct ProviderHandle {
    surface: Box<dyn CheckoutSurface>,
    events: Option<ProviderEventStream>,
    poll_interval: Option<Duration>,
}

impl ProviderHandle {
    /// Handle for a popup observed by polling for closure
    pub fn popup(surface: Box<dyn CheckoutSurface>, poll_interval: Duration) -> Self {
        Self {
            surface,
            events: None,
            poll_interval: Some(poll_interval),
        }
    }

    /// Handle for an SDK-driven checkout observed through its events
    pub fn embedded(surface: Box<dyn CheckoutSurface>, events: ProviderEventStream) -> Self {
        Self {
            surface,
            events: Some(events),
            poll_interval: None,
        }
    }

    /// Attach an event stream to a popup handle; events win over poll inference
    pub fn with_events(mut self, events: ProviderEventStream) -> Self {
        self.events = Some(events);
        self
    }

    pub const fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }

    pub fn surface(&self) -> &dyn CheckoutSurface {
        self.surface.as_ref()
    }

    pub(crate) fn take_events(&mut self) -> Option<ProviderEventStream> {
        self.events.take()
    }
}

impl std::fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("events", &self.events.is_some())
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl Drop for ProviderHandle {
    fn drop(&mut self) {
        self.events = None;
        self.surface.close();
    }
}

/// Strategy trait for payment providers
///
/// Implement this trait to add a provider. The session manager works
/// exclusively through this interface.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name, matched against [`Product::provider`](crate::catalog::Product)
    fn name(&self) -> &str;

    /// Open the provider's checkout surface.
    ///
    /// Popup adapters must open their window before the first `.await` point so
    /// the call stays inside the user gesture that triggered it.
    async fn open(&self, request: OpenRequest) -> Result<ProviderHandle>;

    /// Check a webhook signature with the provider's signing scheme
    fn verify(&self, signature: &str, raw_body: &[u8], secret: &str) -> bool;

    /// [`verify`](Self::verify) as a `Result`
    fn authenticate(&self, signature: &str, raw_body: &[u8], secret: &str) -> Result<()> {
        if self.verify(signature, raw_body, secret) {
            Ok(())
        } else {
            Err(CheckoutError::SignatureVerification(format!(
                "{} webhook signature rejected",
                self.name()
            )))
        }
    }
}

/// Registry of available provider adapters
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own name
    pub fn register<A: ProviderAdapter + 'static>(&mut self, adapter: A) {
        self.register_arc(Arc::new(adapter));
    }

    pub fn register_arc(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(name)
            .cloned()
            .ok_or_else(|| CheckoutError::UnknownProvider(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.adapters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
