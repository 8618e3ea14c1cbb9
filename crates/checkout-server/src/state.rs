//! Application State

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;

use checkout_core::ProductCatalog;
use checkout_providers::{lemonsqueezy_catalog, paddle_catalog};
use checkout_webhooks::{WebhookEvent, WebhookProvider, WebhookVerifier};

use crate::config::ServerConfig;

/// Buffered verified events per slow subscriber
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// LemonSqueezy verifier (None if no secret is configured)
    pub lemonsqueezy: Option<Arc<WebhookVerifier>>,

    /// Paddle verifier (None if no secret is configured)
    pub paddle: Option<Arc<WebhookVerifier>>,

    pub lemonsqueezy_catalog: Arc<ProductCatalog>,
    pub paddle_catalog: Arc<ProductCatalog>,

    /// Verified webhook events for downstream consumers
    pub events: broadcast::Sender<WebhookEvent>,
}

impl AppState {
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let lemonsqueezy = config
            .lemonsqueezy_webhook_secret
            .as_deref()
            .map(WebhookVerifier::lemonsqueezy)
            .transpose()?;

        let paddle = config
            .paddle_webhook_secret
            .as_deref()
            .map(|secret| {
                if config.paddle_webhook_tolerance.is_zero() {
                    WebhookVerifier::new(WebhookProvider::Paddle, secret)
                } else {
                    WebhookVerifier::paddle(secret, config.paddle_webhook_tolerance)
                }
            })
            .transpose()?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            lemonsqueezy: lemonsqueezy.map(Arc::new),
            paddle: paddle.map(Arc::new),
            lemonsqueezy_catalog: Arc::new(lemonsqueezy_catalog()),
            paddle_catalog: Arc::new(paddle_catalog()),
            events,
        })
    }

    pub fn verifier(&self, provider: WebhookProvider) -> Option<&Arc<WebhookVerifier>> {
        match provider {
            WebhookProvider::LemonSqueezy => self.lemonsqueezy.as_ref(),
            WebhookProvider::Paddle => self.paddle.as_ref(),
        }
    }

    pub fn catalog(&self, provider: WebhookProvider) -> &ProductCatalog {
        match provider {
            WebhookProvider::LemonSqueezy => &self.lemonsqueezy_catalog,
            WebhookProvider::Paddle => &self.paddle_catalog,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WebhookEvent> {
        self.events.subscribe()
    }
}
