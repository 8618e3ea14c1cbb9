//! LemonSqueezy Popup Checkout
//!
//! Opens the hosted "buy" page in a new browsing context and relies on the
//! completion watcher polling whether that window was closed.

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use checkout_core::{CheckoutError, CheckoutSurface, OpenRequest, ProviderAdapter, ProviderHandle, Result};
use checkout_webhooks::WebhookProvider;

/// Provider name used in catalogs and the registry
pub const PROVIDER_NAME: &str = "lemonsqueezy";

/// LemonSqueezy checkout configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LemonSqueezyConfig {
    /// Store subdomain, as in `https://{store}.lemonsqueezy.com`
    pub store: String,
    pub window_name: String,
    pub window_features: String,
    pub poll_interval: Duration,
}

impl Default for LemonSqueezyConfig {
    fn default() -> Self {
        Self {
            store: "flowsupportai".into(),
            window_name: "lemonsqueezy-checkout".into(),
            window_features: "width=800,height=800,scrollbars=yes,resizable=yes".into(),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl LemonSqueezyConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the environment.
    ///
    /// Reads `LEMONSQUEEZY_STORE` and `LEMONSQUEEZY_POLL_INTERVAL_MS`; unset
    /// values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(store) = lookup("LEMONSQUEEZY_STORE") {
            let store = store.trim();
            if store.is_empty() || !store.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(CheckoutError::Config(format!("invalid LEMONSQUEEZY_STORE: {store:?}")));
            }
            config.store = store.to_string();
        }

        if let Some(ms) = lookup("LEMONSQUEEZY_POLL_INTERVAL_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|_| CheckoutError::Config("LEMONSQUEEZY_POLL_INTERVAL_MS must be an integer".into()))?;
            if ms == 0 {
                return Err(CheckoutError::Config("LEMONSQUEEZY_POLL_INTERVAL_MS must be positive".into()));
            }
            config.poll_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Hosted checkout page for a variant, before customer parameters
    pub fn buy_url(&self, variant_id: &str) -> String {
        format!("https://{}.lemonsqueezy.com/checkout/buy/{variant_id}?embed=1", self.store)
    }
}

/// Opens new browsing contexts.
///
/// Returning `None` means the browser refused to open the window. In a wasm
/// front-end this wraps `web_sys::Window::open_with_url_and_target_and_features`;
/// [`MockPopupOpener`](crate::mock::MockPopupOpener) serves tests.
pub trait PopupOpener: Send + Sync {
    fn open(&self, url: &str, window_name: &str, features: &str) -> Option<Box<dyn CheckoutSurface>>;
}

/// LemonSqueezy provider adapter
pub struct LemonSqueezyAdapter {
    config: LemonSqueezyConfig,
    opener: Arc<dyn PopupOpener>,
}

impl LemonSqueezyAdapter {
    pub fn new(config: LemonSqueezyConfig, opener: Arc<dyn PopupOpener>) -> Self {
        Self { config, opener }
    }

    pub const fn config(&self) -> &LemonSqueezyConfig {
        &self.config
    }

    /// Full checkout URL with customer prefill and custom fields
    pub fn checkout_url(&self, request: &OpenRequest) -> Result<Url> {
        let mut params: Vec<(String, String)> = Vec::new();

        if let Some(email) = &request.customer_email {
            params.push(("checkout[email]".into(), email.clone()));
        }
        if let Some(name) = &request.customer_name {
            params.push(("checkout[name]".into(), name.clone()));
        }

        let mut custom: Vec<_> = request.custom_data.iter().collect();
        custom.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in custom {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            params.push((format!("checkout[custom][{key}]"), value));
        }

        Url::parse_with_params(&self.config.buy_url(&request.product_id), &params)
            .map_err(|e| CheckoutError::Config(format!("invalid checkout url: {e}")))
    }
}

#[async_trait]
impl ProviderAdapter for LemonSqueezyAdapter {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn open(&self, request: OpenRequest) -> Result<ProviderHandle> {
        let url = self.checkout_url(&request)?;

        // No await before this point: the window must open inside the user gesture
        let surface = self
            .opener
            .open(url.as_str(), &self.config.window_name, &self.config.window_features)
            .ok_or(CheckoutError::PopupBlocked)?;

        tracing::info!(variant_id = %request.product_id, "Opened LemonSqueezy checkout");
        Ok(ProviderHandle::popup(surface, self.config.poll_interval))
    }

    fn verify(&self, signature: &str, raw_body: &[u8], secret: &str) -> bool {
        WebhookProvider::LemonSqueezy.verify(signature, raw_body, secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPopupOpener;
    use checkout_webhooks::LemonSqueezySignature;
    use std::collections::HashMap;

    fn request() -> OpenRequest {
        OpenRequest {
            product_id: "1".into(),
            customer_email: Some("jane@example.com".into()),
            customer_name: Some("Jane Doe".into()),
            custom_data: HashMap::from([
                ("plan_type".to_string(), Value::from("monthly")),
                ("seats".to_string(), Value::from(3)),
            ]),
            success_url: "https://flowsupport.ai/payment/success?product=growthMonthly".into(),
        }
    }

    fn adapter(opener: &Arc<MockPopupOpener>) -> LemonSqueezyAdapter {
        LemonSqueezyAdapter::new(LemonSqueezyConfig::default(), opener.clone())
    }

    #[test]
    fn test_checkout_url() {
        let url = adapter(&Arc::new(MockPopupOpener::new())).checkout_url(&request()).unwrap();

        assert_eq!(url.host_str(), Some("flowsupportai.lemonsqueezy.com"));
        assert_eq!(url.path(), "/checkout/buy/1");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("embed".into(), "1".into()),
                ("checkout[email]".into(), "jane@example.com".into()),
                ("checkout[name]".into(), "Jane Doe".into()),
                ("checkout[custom][plan_type]".into(), "monthly".into()),
                ("checkout[custom][seats]".into(), "3".into()),
            ]
        );
    }

    #[test]
    fn test_checkout_url_without_customer() {
        let request = OpenRequest {
            product_id: "2".into(),
            ..OpenRequest::default()
        };
        let url = adapter(&Arc::new(MockPopupOpener::new())).checkout_url(&request).unwrap();
        assert_eq!(url.query(), Some("embed=1"));
    }

    #[tokio::test]
    async fn test_open_uses_window_settings() {
        let opener = Arc::new(MockPopupOpener::new());
        let handle = adapter(&opener).open(request()).await.unwrap();

        assert_eq!(handle.poll_interval(), Some(Duration::from_secs(1)));
        let popup = opener.last_opened().unwrap();
        assert_eq!(popup.window_name, "lemonsqueezy-checkout");
        assert_eq!(popup.features, "width=800,height=800,scrollbars=yes,resizable=yes");
        assert!(popup.url.starts_with("https://flowsupportai.lemonsqueezy.com/checkout/buy/1?embed=1&"));

        drop(handle);
        assert!(popup.surface.closed());
    }

    #[tokio::test]
    async fn test_open_blocked_popup() {
        let opener = Arc::new(MockPopupOpener::blocking());
        let err = adapter(&opener).open(request()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::PopupBlocked));
    }

    #[test]
    fn test_config_from_lookup() {
        let config = LemonSqueezyConfig::from_lookup(|key| match key {
            "LEMONSQUEEZY_STORE" => Some("acme".into()),
            "LEMONSQUEEZY_POLL_INTERVAL_MS" => Some("250".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.store, "acme");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.buy_url("9"), "https://acme.lemonsqueezy.com/checkout/buy/9?embed=1");

        assert_eq!(LemonSqueezyConfig::from_lookup(|_| None).unwrap(), LemonSqueezyConfig::default());
        assert!(LemonSqueezyConfig::from_lookup(|k| (k == "LEMONSQUEEZY_POLL_INTERVAL_MS").then(|| "0".into())).is_err());
        assert!(LemonSqueezyConfig::from_lookup(|k| (k == "LEMONSQUEEZY_STORE").then(|| "evil.com/".into())).is_err());
    }

    #[test]
    fn test_verify_delegates_to_hmac_scheme() {
        let adapter = adapter(&Arc::new(MockPopupOpener::new()));
        let body = br#"{"meta":{"event_name":"order_created"}}"#;
        let signature = LemonSqueezySignature::sign(body, "secret").unwrap();

        assert!(adapter.verify(&signature, body, "secret"));
        assert!(!adapter.verify(&signature, body, "other"));
        assert!(!adapter.verify("secret", body, "secret"));
    }
}
