//! # checkout-providers
//!
//! Concrete [`ProviderAdapter`](checkout_core::ProviderAdapter)s:
//!
//! | Adapter                 | Surface                | Completion signal          |
//! |-------------------------|------------------------|----------------------------|
//! | [`LemonSqueezyAdapter`] | popup window           | polling `closed` (1s)      |
//! | [`PaddleAdapter`]       | SDK overlay            | `checkout.*` SDK callbacks |
//!
//! Browser and SDK access goes through the [`PopupOpener`] and
//! [`PaddleInitializer`] seams; [`mock`] provides in-process versions.

pub mod catalog;
pub mod lemonsqueezy;
pub mod mock;
pub mod paddle;

pub use catalog::{lemonsqueezy_catalog, paddle_catalog};
pub use lemonsqueezy::{LemonSqueezyAdapter, LemonSqueezyConfig, PopupOpener};
pub use paddle::{
    PaddleAdapter, PaddleCheckoutOptions, PaddleClient, PaddleClientCell, PaddleConfig, PaddleEnvironment,
    PaddleEventSink, PaddleInitializer,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockPaddleInitializer, MockPopupOpener};
    use checkout_core::{
        CheckoutError, CheckoutSessionManager, ProviderEvent, ProviderRegistry, SessionCallbacks, SessionStatus,
        StartOptions,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Counts {
        success: Arc<AtomicUsize>,
        cancel: Arc<AtomicUsize>,
        error: Arc<AtomicUsize>,
    }

    impl Counts {
        fn callbacks(&self) -> SessionCallbacks {
            let (s, c, e) = (self.success.clone(), self.cancel.clone(), self.error.clone());
            SessionCallbacks::new()
                .on_success(move |_| {
                    s.fetch_add(1, Ordering::SeqCst);
                })
                .on_cancel(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                })
                .on_error(move |_, _| {
                    e.fetch_add(1, Ordering::SeqCst);
                })
        }

        fn get(&self) -> (usize, usize, usize) {
            (
                self.success.load(Ordering::SeqCst),
                self.cancel.load(Ordering::SeqCst),
                self.error.load(Ordering::SeqCst),
            )
        }
    }

    fn lemonsqueezy_manager(opener: &Arc<MockPopupOpener>) -> CheckoutSessionManager {
        let mut providers = ProviderRegistry::new();
        providers.register(LemonSqueezyAdapter::new(LemonSqueezyConfig::default(), opener.clone()));
        CheckoutSessionManager::new(Arc::new(lemonsqueezy_catalog()), providers, "https://flowsupport.ai")
    }

    fn paddle_manager(initializer: &Arc<MockPaddleInitializer>) -> CheckoutSessionManager {
        let mut providers = ProviderRegistry::new();
        providers.register(PaddleAdapter::new(
            PaddleConfig::new(PaddleEnvironment::Sandbox, "test_token"),
            initializer.clone(),
        ));
        CheckoutSessionManager::new(Arc::new(paddle_catalog()), providers, "https://flowsupport.ai")
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_popup_cancels_once_and_stops_polling() {
        let opener = Arc::new(MockPopupOpener::new());
        let manager = lemonsqueezy_manager(&opener);
        let counts = Counts::default();

        let handle = manager
            .start("growthMonthly", StartOptions::new().callbacks(counts.callbacks()))
            .await
            .unwrap();
        let popup = opener.last_opened().unwrap();
        assert!(popup.url.contains("/checkout/buy/1?embed=1"));

        popup.surface.user_close();
        assert_eq!(handle.resolved().await, SessionStatus::ResolvedCancelled);
        assert_eq!(counts.get(), (0, 1, 0));

        let polls = popup.surface.polls();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(popup.surface.polls(), polls);
        assert_eq!(counts.get(), (0, 1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_popup_resolves_with_error() {
        let opener = Arc::new(MockPopupOpener::blocking());
        let manager = lemonsqueezy_manager(&opener);
        let counts = Counts::default();

        let handle = manager
            .start("growthYearly", StartOptions::new().callbacks(counts.callbacks()))
            .await
            .unwrap();

        assert_eq!(handle.status(), SessionStatus::ResolvedError);
        assert_eq!(counts.get(), (0, 0, 1));
        assert!(opener.opened().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lemonsqueezy_url_carries_checkout_attribution() {
        let opener = Arc::new(MockPopupOpener::new());
        let manager = lemonsqueezy_manager(&opener);

        let handle = manager.start("growthMonthly", StartOptions::new()).await.unwrap();
        let popup = opener.last_opened().unwrap();
        let url = reqwest::Url::parse(&popup.url).unwrap();
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        for (key, value) in [
            ("checkout[custom][product_key]", "growthMonthly".to_string()),
            ("checkout[custom][plan_type]", "monthly".to_string()),
            ("checkout[custom][session_id]", handle.id().to_string()),
        ] {
            assert!(
                query.contains(&(key.to_string(), value.clone())),
                "{key}={value} missing from {url}"
            );
        }
        handle.cancel();
    }

    #[tokio::test]
    async fn test_free_analysis_is_not_sent_to_provider() {
        let opener = Arc::new(MockPopupOpener::new());
        let manager = lemonsqueezy_manager(&opener);

        let err = manager.start("freeAnalysis", StartOptions::new()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::NotPurchasable(_)));
        assert!(opener.opened().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paddle_completed_event_succeeds_once() {
        let initializer = Arc::new(MockPaddleInitializer::new());
        let manager = paddle_manager(&initializer);
        let counts = Counts::default();

        let handle = manager
            .start(
                "growthMonthly",
                StartOptions::new()
                    .customer("jane@example.com", Some("Jane".into()))
                    .callbacks(counts.callbacks()),
            )
            .await
            .unwrap();
        assert_eq!(handle.status(), SessionStatus::AwaitingCompletion);

        let overlay = initializer.client().last_opened().unwrap();
        assert_eq!(overlay.options.items[0].price_id, "pri_01k59bk6ttdtkd75tbkvn1v4hc");
        assert_eq!(
            overlay.options.settings.success_url,
            "https://flowsupport.ai/payment/success?product=growthMonthly&provider=paddle"
        );
        let options = serde_json::to_value(&overlay.options).unwrap();
        assert_eq!(options["customData"]["product_key"], "growthMonthly");
        assert_eq!(options["customData"]["plan_type"], "monthly");
        assert_eq!(options["customData"]["session_id"], handle.id().to_string());

        overlay.emit(ProviderEvent::new("checkout.completed"));
        assert_eq!(handle.resolved().await, SessionStatus::ResolvedSuccess);

        overlay.emit(ProviderEvent::new("checkout.completed"));
        overlay.emit(ProviderEvent::new("checkout.closed"));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(counts.get(), (1, 0, 0));
        assert_eq!(handle.status(), SessionStatus::ResolvedSuccess);
        assert!(overlay.surface.closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paddle_init_failure_surfaces_as_error() {
        let initializer = Arc::new(MockPaddleInitializer::failing(1));
        let manager = paddle_manager(&initializer);
        let counts = Counts::default();

        let handle = manager
            .start("professionalYearly", StartOptions::new().callbacks(counts.callbacks()))
            .await
            .unwrap();
        assert_eq!(handle.status(), SessionStatus::ResolvedError);
        assert_eq!(counts.get(), (0, 0, 1));

        let retry = manager.start("professionalYearly", StartOptions::new()).await.unwrap();
        assert_eq!(retry.status(), SessionStatus::AwaitingCompletion);
        assert_eq!(initializer.init_calls(), 2);
    }
}
