//! Checkout Session Manager
//!
//! Owns the lifecycle of checkout attempts: resolves the product, asks the
//! product's provider adapter to open a checkout, hands the resulting handle to
//! the [`CompletionWatcher`] and resolves the session exactly once.
//!
//! ```text
//! start(key) ─▶ ProductCatalog ─▶ ProviderAdapter::open ─▶ CompletionWatcher
//!                                         │                       │
//!                                         └── error ──┐   outcome │
//!                                                     ▼           ▼
//!                                              SessionSlot::resolve (once)
//!                                                     │
//!                                     on_success / on_cancel / on_error
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::catalog::{Product, ProductCatalog};
use crate::error::{CheckoutError, Result};
use crate::lock;
use crate::provider::{OpenRequest, ProviderRegistry};
use crate::session::{CheckoutSession, Resolution, SessionId, SessionStatus};
use crate::watcher::{CompletionWatcher, WatchGuard, WatchOutcome};

type SuccessCallback = Box<dyn FnOnce(&CheckoutSession) + Send>;
type CancelCallback = Box<dyn FnOnce(&CheckoutSession) + Send>;
type ErrorCallback = Box<dyn FnOnce(&CheckoutSession, &CheckoutError) + Send>;

/// Terminal callbacks for a session. At most one of them runs.
#[derive(Default)]
pub struct SessionCallbacks {
    on_success: Option<SuccessCallback>,
    on_cancel: Option<CancelCallback>,
    on_error: Option<ErrorCallback>,
}

impl SessionCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl FnOnce(&CheckoutSession) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_cancel(mut self, f: impl FnOnce(&CheckoutSession) + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&CheckoutSession, &CheckoutError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    fn invoke(self, session: &CheckoutSession, resolution: &Resolution) {
        match resolution {
            Resolution::Success(_) => {
                if let Some(f) = self.on_success {
                    f(session);
                }
            }
            Resolution::Cancelled => {
                if let Some(f) = self.on_cancel {
                    f(session);
                }
            }
            Resolution::Error(err) => {
                if let Some(f) = self.on_error {
                    f(session, err);
                }
            }
            Resolution::Superseded => {}
        }
    }
}

impl std::fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_cancel", &self.on_cancel.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Options for starting a checkout
#[derive(Debug, Default)]
pub struct StartOptions {
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub custom_data: HashMap<String, serde_json::Value>,
    pub callbacks: SessionCallbacks,
}

impl StartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn customer(mut self, email: impl Into<String>, name: Option<String>) -> Self {
        self.customer_email = Some(email.into());
        self.customer_name = name;
        self
    }

    pub fn custom(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.custom_data.insert(key.into(), value.into());
        self
    }

    pub fn callbacks(mut self, callbacks: SessionCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }
}

struct SlotState {
    session: CheckoutSession,
    callbacks: Option<SessionCallbacks>,
    watch: Option<WatchGuard>,
}

/// Shared, exclusively-owned state of one session
struct SessionSlot {
    state: Mutex<SlotState>,
    status: watch::Sender<SessionStatus>,
}

impl SessionSlot {
    fn new(session: CheckoutSession, callbacks: SessionCallbacks) -> Arc<Self> {
        let (status, _) = watch::channel(session.status);
        Arc::new(Self {
            state: Mutex::new(SlotState {
                session,
                callbacks: Some(callbacks),
                watch: None,
            }),
            status,
        })
    }

    /// Non-terminal transition; false if the session has already moved on
    fn advance(&self, next: SessionStatus) -> bool {
        let mut state = lock(&self.state);
        if !state.session.transition(next) {
            return false;
        }
        self.status.send_replace(next);
        true
    }

    /// Keep the watch guard so the session can be cancelled later
    fn attach(&self, guard: WatchGuard) {
        let mut state = lock(&self.state);
        if state.session.is_resolved() {
            guard.cancel();
        } else {
            state.watch = Some(guard);
        }
    }

    /// Resolve the session. Only the first call has any effect.
    fn resolve(&self, resolution: Resolution) -> bool {
        let (snapshot, callbacks, watch) = {
            let mut state = lock(&self.state);
            let next = resolution.status();
            if state.session.is_resolved() || !state.session.transition(next) {
                tracing::debug!(
                    session_id = %state.session.id,
                    status = %state.session.status,
                    discarded = %next,
                    "Discarding resolution for settled session"
                );
                return false;
            }
            (state.session.clone(), state.callbacks.take(), state.watch.take())
        };

        if let Some(guard) = watch {
            guard.cancel();
        }
        self.status.send_replace(snapshot.status);

        match &resolution {
            Resolution::Error(err) => tracing::warn!(
                session_id = %snapshot.id,
                product = %snapshot.product_key,
                provider = %snapshot.provider,
                error = %err,
                "Checkout session failed"
            ),
            _ => tracing::info!(
                session_id = %snapshot.id,
                product = %snapshot.product_key,
                provider = %snapshot.provider,
                status = %snapshot.status,
                "Checkout session resolved"
            ),
        }

        if let Some(callbacks) = callbacks {
            callbacks.invoke(&snapshot, &resolution);
        }
        true
    }

    fn snapshot(&self) -> CheckoutSession {
        lock(&self.state).session.clone()
    }
}

impl From<WatchOutcome> for Resolution {
    fn from(outcome: WatchOutcome) -> Self {
        match outcome {
            WatchOutcome::Completed(data) => Self::Success(data),
            WatchOutcome::Failed(reason) => Self::Error(CheckoutError::CheckoutFailed(reason)),
            WatchOutcome::Closed => Self::Cancelled,
        }
    }
}

/// Caller's view of a started session
#[derive(Clone)]
pub struct SessionHandle {
    slot: Arc<SessionSlot>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.snapshot().id
    }

    pub fn status(&self) -> SessionStatus {
        *self.slot.status.borrow()
    }

    pub fn is_resolved(&self) -> bool {
        self.status().is_terminal()
    }

    /// Copy of the session as it is now
    pub fn snapshot(&self) -> CheckoutSession {
        self.slot.snapshot()
    }

    /// Wait for the session to reach a terminal status
    pub async fn resolved(&self) -> SessionStatus {
        let mut rx = self.slot.status.subscribe();
        match rx.wait_for(|status| status.is_terminal()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        }
    }

    /// Cancel from the UI. Fires `on_cancel` if the session was still open.
    pub fn cancel(&self) -> bool {
        self.slot.resolve(Resolution::Cancelled)
    }

    /// Replace this session with a newer one; no callback fires.
    pub fn supersede(&self) -> bool {
        self.slot.resolve(Resolution::Superseded)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Starts and resolves checkout sessions
pub struct CheckoutSessionManager {
    catalog: Arc<ProductCatalog>,
    providers: ProviderRegistry,
    watcher: CompletionWatcher,
    origin: String,
}

impl CheckoutSessionManager {
    /// `origin` is the site origin used to build the success redirect
    pub fn new(catalog: Arc<ProductCatalog>, providers: ProviderRegistry, origin: impl Into<String>) -> Self {
        Self {
            catalog,
            providers,
            watcher: CompletionWatcher::new(),
            origin: origin.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    /// `{origin}/payment/success?product={key}&provider={name}`
    pub fn success_url(&self, product: &Product) -> String {
        format!(
            "{}/payment/success?product={}&provider={}",
            self.origin, product.key, product.provider
        )
    }

    /// Start a checkout for `product_key`.
    ///
    /// Catalog and registry errors are returned directly and no session is
    /// created. Once a session exists, every failure resolves it and runs
    /// `on_error`; the returned handle is then already resolved.
    pub async fn start(&self, product_key: &str, options: StartOptions) -> Result<SessionHandle> {
        let product = self.catalog.resolve(product_key)?;
        if !product.is_purchasable() {
            return Err(CheckoutError::NotPurchasable(product.key.clone()));
        }
        let adapter = self.providers.get(&product.provider)?;

        let StartOptions {
            customer_email,
            customer_name,
            mut custom_data,
            callbacks,
        } = options;

        let mut session = CheckoutSession::new(product, self.success_url(product));

        // Attribution echoed back in webhook `custom_data`; caller keys win
        for (key, value) in [
            ("product_key", product.key.clone()),
            ("plan_type", product.billing_cycle.as_str().to_owned()),
            ("session_id", session.id.to_string()),
        ] {
            custom_data.entry(key.to_owned()).or_insert_with(|| value.into());
        }
        session.customer_email.clone_from(&customer_email);
        session.customer_name.clone_from(&customer_name);
        session.custom_data.clone_from(&custom_data);

        tracing::info!(
            session_id = %session.id,
            product = %product.key,
            provider = %product.provider,
            "Starting checkout session"
        );

        let request = OpenRequest {
            product_id: product.provider_product_id.clone(),
            customer_email,
            customer_name,
            custom_data,
            success_url: session.success_url.clone(),
        };

        let slot = SessionSlot::new(session, callbacks);
        let handle = SessionHandle { slot: slot.clone() };
        slot.advance(SessionStatus::Opening);

        let provider_handle = match adapter.open(request).await {
            Ok(provider_handle) => provider_handle,
            Err(err) => {
                if matches!(err, CheckoutError::ProviderInit(_)) {
                    tracing::error!(provider = %product.provider, error = %err, "Payment provider unavailable");
                }
                slot.resolve(Resolution::Error(err));
                return Ok(handle);
            }
        };

        if !slot.advance(SessionStatus::AwaitingCompletion) {
            return Ok(handle);
        }

        let resolver = slot.clone();
        let guard = self.watcher.watch(provider_handle, move |outcome| {
            resolver.resolve(outcome.into());
        });
        slot.attach(guard);

        Ok(handle)
    }
}

/// A UI control (e.g. a checkout button) that owns at most one live session.
///
/// Starting a new checkout supersedes the previous one: the old session is
/// resolved as cancelled without running any of its callbacks, and its
/// watcher is stopped. Dropping the control does the same.
pub struct CheckoutControl {
    manager: Arc<CheckoutSessionManager>,
    current: Option<SessionHandle>,
}

impl CheckoutControl {
    pub const fn new(manager: Arc<CheckoutSessionManager>) -> Self {
        Self { manager, current: None }
    }

    pub async fn start(&mut self, product_key: &str, options: StartOptions) -> Result<SessionHandle> {
        self.release();
        let handle = self.manager.start(product_key, options).await?;
        self.current = Some(handle.clone());
        Ok(handle)
    }

    /// Whether the control's session is still waiting for an outcome
    pub fn is_busy(&self) -> bool {
        self.current.as_ref().is_some_and(|h| !h.is_resolved())
    }

    pub const fn current(&self) -> Option<&SessionHandle> {
        self.current.as_ref()
    }

    fn release(&mut self) {
        if let Some(prior) = self.current.take() {
            if prior.supersede() {
                tracing::info!(session_id = %prior.id(), "Superseded in-flight checkout session");
            }
        }
    }
}

impl Drop for CheckoutControl {
    fn drop(&mut self) {
        self.release();
    }
}
