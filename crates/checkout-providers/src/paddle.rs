//! Paddle Embedded Checkout
//!
//! Paddle's SDK renders an overlay and reports typed events such as
//! `checkout.completed`. The SDK client is created lazily on the first
//! checkout and shared by every later one.

use async_trait::async_trait;
use futures::channel::mpsc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use checkout_core::{
    CheckoutError, CheckoutSurface, OpenRequest, ProviderAdapter, ProviderEvent, ProviderHandle, Result,
};
use checkout_webhooks::WebhookProvider;

/// Provider name used in catalogs and the registry
pub const PROVIDER_NAME: &str = "paddle";

/// Paddle environment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddleEnvironment {
    Sandbox,
    #[default]
    Production,
}

impl PaddleEnvironment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }

    /// Client-token prefix Paddle issues for this environment
    const fn token_prefix(self) -> &'static str {
        match self {
            Self::Sandbox => "test_",
            Self::Production => "live_",
        }
    }
}

/// Paddle SDK configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaddleConfig {
    pub environment: PaddleEnvironment,
    pub client_token: String,
    pub theme: String,
    pub locale: String,
    pub display_mode: String,
}

impl PaddleConfig {
    pub fn new(environment: PaddleEnvironment, client_token: impl Into<String>) -> Self {
        Self {
            environment,
            client_token: client_token.into(),
            theme: "light".into(),
            locale: "en".into(),
            display_mode: "overlay".into(),
        }
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let environment = match lookup("PADDLE_ENVIRONMENT").as_deref().map(str::trim) {
            None | Some("production") => PaddleEnvironment::Production,
            Some("sandbox") => PaddleEnvironment::Sandbox,
            Some(other) => {
                return Err(CheckoutError::Config(format!(
                    "PADDLE_ENVIRONMENT must be sandbox or production, got {other:?}"
                )));
            }
        };

        let client_token = lookup("PADDLE_CLIENT_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CheckoutError::Config("PADDLE_CLIENT_TOKEN not set".into()))?;

        if !client_token.starts_with(environment.token_prefix()) {
            return Err(CheckoutError::Config(format!(
                "PADDLE_CLIENT_TOKEN is not a {} token",
                environment.as_str()
            )));
        }

        Ok(Self::new(environment, client_token))
    }
}

/// Options passed to the SDK's `Checkout.open`
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaddleCheckoutOptions {
    pub items: Vec<PaddleItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<PaddleCustomer>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub custom_data: HashMap<String, Value>,
    pub settings: PaddleSettings,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaddleItem {
    pub price_id: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PaddleCustomer {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaddleSettings {
    pub display_mode: String,
    pub theme: String,
    pub locale: String,
    pub success_url: String,
}

impl PaddleCheckoutOptions {
    /// Single line item of quantity 1; customer only when an email is known
    pub fn from_request(request: &OpenRequest, config: &PaddleConfig) -> Self {
        Self {
            items: vec![PaddleItem {
                price_id: request.product_id.clone(),
                quantity: 1,
            }],
            customer: request.customer_email.as_ref().map(|email| PaddleCustomer {
                email: email.clone(),
                name: request.customer_name.clone(),
            }),
            custom_data: request.custom_data.clone(),
            settings: PaddleSettings {
                display_mode: config.display_mode.clone(),
                theme: config.theme.clone(),
                locale: config.locale.clone(),
                success_url: request.success_url.clone(),
            },
        }
    }
}

/// Sender side of an overlay's event callback
pub type PaddleEventSink = mpsc::UnboundedSender<ProviderEvent>;

/// An initialised Paddle SDK instance
pub trait PaddleClient: Send + Sync {
    /// Open the overlay. SDK callbacks are forwarded to `events` until the
    /// returned surface is closed.
    fn open_checkout(
        &self,
        options: &PaddleCheckoutOptions,
        events: PaddleEventSink,
    ) -> Result<Box<dyn CheckoutSurface>>;
}

/// Loads and initialises the Paddle SDK
///
/// In a wasm front-end this loads paddle.js and calls `Paddle.Initialize`
/// (or `initializePaddle` from `@paddle/paddle-js`), handing back a client
/// around the resulting `Paddle.Checkout`.
/// [`MockPaddleInitializer`](crate::mock::MockPaddleInitializer) serves tests.
#[async_trait]
pub trait PaddleInitializer: Send + Sync {
    async fn initialize(&self, config: &PaddleConfig) -> Result<Arc<dyn PaddleClient>>;
}

/// Lazily initialised, shared Paddle client.
///
/// Concurrent first calls initialise once. A failed initialisation is not
/// cached, so the next checkout attempt retries it.
pub struct PaddleClientCell {
    config: PaddleConfig,
    initializer: Arc<dyn PaddleInitializer>,
    client: OnceCell<Arc<dyn PaddleClient>>,
}

impl PaddleClientCell {
    pub fn new(config: PaddleConfig, initializer: Arc<dyn PaddleInitializer>) -> Self {
        Self {
            config,
            initializer,
            client: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }

    pub async fn get(&self) -> Result<Arc<dyn PaddleClient>> {
        self.client
            .get_or_try_init(|| async {
                tracing::debug!(environment = self.config.environment.as_str(), "Initializing Paddle");
                self.initializer.initialize(&self.config).await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to initialize Paddle");
                    match e {
                        CheckoutError::ProviderInit(_) => e,
                        other => CheckoutError::ProviderInit(other.to_string()),
                    }
                })
            })
            .await
            .cloned()
    }
}

/// Paddle provider adapter
pub struct PaddleAdapter {
    client: PaddleClientCell,
}

impl PaddleAdapter {
    pub fn new(config: PaddleConfig, initializer: Arc<dyn PaddleInitializer>) -> Self {
        Self {
            client: PaddleClientCell::new(config, initializer),
        }
    }

    pub const fn client(&self) -> &PaddleClientCell {
        &self.client
    }
}

#[async_trait]
impl ProviderAdapter for PaddleAdapter {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn open(&self, request: OpenRequest) -> Result<ProviderHandle> {
        let client = self.client.get().await?;
        let options = PaddleCheckoutOptions::from_request(&request, &self.client.config);

        let (events, receiver) = mpsc::unbounded();
        let surface = client.open_checkout(&options, events)?;

        tracing::info!(price_id = %request.product_id, "Opened Paddle checkout");
        Ok(ProviderHandle::embedded(surface, Box::pin(receiver)))
    }

    fn verify(&self, signature: &str, raw_body: &[u8], secret: &str) -> bool {
        WebhookProvider::Paddle.verify(signature, raw_body, secret)
    }
}
