//! Mock Provider Components
//!
//! For testing and demos. `MockSurface` stands in for a popup window or an
//! overlay, `ScriptedAdapter` for a provider.

use async_trait::async_trait;
use futures::channel::mpsc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{CheckoutError, Result};
use crate::lock;
use crate::provider::{
    CheckoutSurface, OpenRequest, ProviderAdapter, ProviderEvent, ProviderHandle, SurfaceAccessError,
};

#[derive(Debug, Default)]
struct SurfaceState {
    closed: AtomicBool,
    polls: AtomicUsize,
    programmatic_closes: AtomicUsize,
    failing_polls: AtomicUsize,
}

/// Checkout surface whose state is driven by the test
#[derive(Clone, Debug, Default)]
pub struct MockSurface {
    state: Arc<SurfaceState>,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the user closing the window
    pub fn user_close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }

    /// Make the next `n` state reads fail as a cross-origin read would
    pub fn fail_next_polls(&self, n: usize) {
        self.state.failing_polls.store(n, Ordering::SeqCst);
    }

    pub fn closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Number of `is_closed` reads so far
    pub fn polls(&self) -> usize {
        self.state.polls.load(Ordering::SeqCst)
    }

    /// Number of times `close` actually closed an open surface
    pub fn programmatic_closes(&self) -> usize {
        self.state.programmatic_closes.load(Ordering::SeqCst)
    }
}

impl CheckoutSurface for MockSurface {
    fn is_closed(&self) -> std::result::Result<bool, SurfaceAccessError> {
        self.state.polls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .state
            .failing_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(SurfaceAccessError("blocked a frame with a different origin".into()));
        }

        Ok(self.closed())
    }

    fn close(&self) {
        if !self.state.closed.swap(true, Ordering::SeqCst) {
            self.state.programmatic_closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A checkout opened through a [`ScriptedAdapter`]
#[derive(Clone, Debug)]
pub struct OpenedCheckout {
    pub request: OpenRequest,
    pub surface: MockSurface,
    events: mpsc::UnboundedSender<ProviderEvent>,
}

impl OpenedCheckout {
    /// Deliver a provider event to the session's watcher
    pub fn emit(&self, event: ProviderEvent) {
        if self.events.unbounded_send(event).is_err() {
            tracing::debug!("Mock event dropped: watcher already released the handle");
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Behavior {
    Popup(Duration),
    Embedded,
    Blocked,
    InitFailure,
}

/// Provider adapter with scripted behavior
#[derive(Debug)]
pub struct ScriptedAdapter {
    name: String,
    behavior: Behavior,
    opened: Mutex<Vec<OpenedCheckout>>,
}

impl ScriptedAdapter {
    fn with_behavior(name: impl Into<String>, behavior: Behavior) -> Self {
        Self {
            name: name.into(),
            behavior,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Popup polled every second; also accepts emitted events
    pub fn popup(name: impl Into<String>) -> Self {
        Self::with_behavior(name, Behavior::Popup(Duration::from_secs(1)))
    }

    /// SDK-style checkout observed only through events
    pub fn embedded(name: impl Into<String>) -> Self {
        Self::with_behavior(name, Behavior::Embedded)
    }

    /// Every open fails with [`CheckoutError::PopupBlocked`]
    pub fn blocked(name: impl Into<String>) -> Self {
        Self::with_behavior(name, Behavior::Blocked)
    }

    /// Every open fails with [`CheckoutError::ProviderInit`]
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self::with_behavior(name, Behavior::InitFailure)
    }

    pub fn opened(&self) -> Vec<OpenedCheckout> {
        lock(&self.opened).clone()
    }

    pub fn last_opened(&self) -> Option<OpenedCheckout> {
        lock(&self.opened).last().cloned()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self, request: OpenRequest) -> Result<ProviderHandle> {
        let surface = MockSurface::new();
        let (tx, rx) = mpsc::unbounded();

        let handle = match self.behavior {
            Behavior::Blocked => return Err(CheckoutError::PopupBlocked),
            Behavior::InitFailure => return Err(CheckoutError::ProviderInit("scripted failure".into())),
            Behavior::Popup(interval) => {
                ProviderHandle::popup(Box::new(surface.clone()), interval).with_events(Box::pin(rx))
            }
            Behavior::Embedded => ProviderHandle::embedded(Box::new(surface.clone()), Box::pin(rx)),
        };

        lock(&self.opened).push(OpenedCheckout {
            request,
            surface,
            events: tx,
        });
        Ok(handle)
    }

    /// Test scheme: the signature is the secret itself
    fn verify(&self, signature: &str, _raw_body: &[u8], secret: &str) -> bool {
        !secret.is_empty() && signature == secret
    }
}
