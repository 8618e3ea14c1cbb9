//! Mock browser and SDK collaborators
//!
//! Let the real adapters run without a browser: `MockPopupOpener` stands in
//! for `window.open`, `MockPaddleInitializer` for loading the Paddle SDK.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use checkout_core::mock::MockSurface;
use checkout_core::{lock, CheckoutError, CheckoutSurface, ProviderEvent, Result};

use crate::lemonsqueezy::PopupOpener;
use crate::paddle::{PaddleCheckoutOptions, PaddleClient, PaddleConfig, PaddleEventSink, PaddleInitializer};

/// A window opened through [`MockPopupOpener`]
#[derive(Clone, Debug)]
pub struct OpenedPopup {
    pub url: String,
    pub window_name: String,
    pub features: String,
    pub surface: MockSurface,
}

/// Popup opener recording every window it opens
#[derive(Debug, Default)]
pub struct MockPopupOpener {
    blocked: AtomicBool,
    opened: Mutex<Vec<OpenedPopup>>,
}

impl MockPopupOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opener behaving like a browser with popups disabled
    pub fn blocking() -> Self {
        let opener = Self::default();
        opener.set_blocked(true);
        opener
    }

    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    pub fn opened(&self) -> Vec<OpenedPopup> {
        lock(&self.opened).clone()
    }

    pub fn last_opened(&self) -> Option<OpenedPopup> {
        lock(&self.opened).last().cloned()
    }
}

impl PopupOpener for MockPopupOpener {
    fn open(&self, url: &str, window_name: &str, features: &str) -> Option<Box<dyn CheckoutSurface>> {
        if self.blocked.load(Ordering::SeqCst) {
            return None;
        }

        let surface = MockSurface::new();
        lock(&self.opened).push(OpenedPopup {
            url: url.to_string(),
            window_name: window_name.to_string(),
            features: features.to_string(),
            surface: surface.clone(),
        });
        Some(Box::new(surface))
    }
}

/// An overlay opened through [`MockPaddleClient`]
#[derive(Clone, Debug)]
pub struct OpenedOverlay {
    pub options: PaddleCheckoutOptions,
    pub surface: MockSurface,
    events: PaddleEventSink,
}

impl OpenedOverlay {
    /// Fire an SDK callback for this overlay
    pub fn emit(&self, event: ProviderEvent) {
        if self.events.unbounded_send(event).is_err() {
            tracing::debug!("Paddle event dropped: checkout no longer observed");
        }
    }
}

/// Paddle SDK stand-in recording opened overlays
#[derive(Debug, Default)]
pub struct MockPaddleClient {
    opened: Mutex<Vec<OpenedOverlay>>,
}

impl MockPaddleClient {
    pub fn opened(&self) -> Vec<OpenedOverlay> {
        lock(&self.opened).clone()
    }

    pub fn last_opened(&self) -> Option<OpenedOverlay> {
        lock(&self.opened).last().cloned()
    }
}

impl PaddleClient for MockPaddleClient {
    fn open_checkout(
        &self,
        options: &PaddleCheckoutOptions,
        events: PaddleEventSink,
    ) -> Result<Box<dyn CheckoutSurface>> {
        let surface = MockSurface::new();
        lock(&self.opened).push(OpenedOverlay {
            options: options.clone(),
            surface: surface.clone(),
            events,
        });
        Ok(Box::new(surface))
    }
}

/// Initializer handing out one shared [`MockPaddleClient`]
#[derive(Debug, Default)]
pub struct MockPaddleInitializer {
    client: Arc<MockPaddleClient>,
    init_calls: AtomicUsize,
    failures_left: AtomicUsize,
}

impl MockPaddleInitializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` initialisations
    pub fn failing(n: usize) -> Self {
        let initializer = Self::default();
        initializer.failures_left.store(n, Ordering::SeqCst);
        initializer
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn client(&self) -> Arc<MockPaddleClient> {
        self.client.clone()
    }
}

#[async_trait]
impl PaddleInitializer for MockPaddleInitializer {
    async fn initialize(&self, config: &PaddleConfig) -> Result<Arc<dyn PaddleClient>> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(CheckoutError::ProviderInit(format!(
                "paddle.js failed to load ({})",
                config.environment.as_str()
            )));
        }

        Ok(self.client.clone())
    }
}
