//! # checkout-core
//!
//! Provider-agnostic checkout session orchestration.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     CheckoutSessionManager                       │
//! │  ┌────────────────┐  ┌──────────────────┐  ┌──────────────────┐  │
//! │  │ ProductCatalog │──│ ProviderAdapter  │──│ CompletionWatcher│  │
//! │  │   (lookup)     │  │   (Strategy)     │  │ (poll / events)  │  │
//! │  └────────────────┘  └──────────────────┘  └──────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ProviderAdapter` trait lets LemonSqueezy, Paddle or any other
//! provider be plugged in without touching the session manager. Browser-side
//! outcomes are a UX signal only; payment is confirmed by verified webhooks
//! (see the `checkout-webhooks` crate).

pub mod catalog;
pub mod error;
pub mod manager;
pub mod mock;
pub mod provider;
pub mod session;
pub mod watcher;

pub use catalog::{BillingCycle, Product, ProductCatalog};
pub use error::{CheckoutError, Result};
pub use manager::{CheckoutControl, CheckoutSessionManager, SessionCallbacks, SessionHandle, StartOptions};
pub use provider::{
    CheckoutSurface, OpenRequest, ProviderAdapter, ProviderEvent, ProviderEventStream, ProviderHandle,
    ProviderRegistry, SurfaceAccessError,
};
pub use session::{CheckoutSession, Resolution, SessionId, SessionStatus};
pub use watcher::{CompletionWatcher, WatchGuard, WatchOutcome};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_recovers_poisoned_mutex() {
        let shared = std::sync::Arc::new(Mutex::new(vec![1]));
        let writer = shared.clone();
        let poisoned = std::thread::spawn(move || {
            writer.lock().unwrap().push(2);
            panic!("holder panicked");
        })
        .join();

        assert!(poisoned.is_err());
        assert!(shared.is_poisoned());
        lock(&shared).push(3);
        assert_eq!(*lock(&shared), vec![1, 2, 3]);
    }
}
