//! Webhook Event Normalization
//!
//! Maps each provider's event envelope onto a shared [`WebhookEvent`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, WebhookError};
use crate::signature::{LemonSqueezySignature, PaddleSignature, SignatureScheme};

/// Provider that sent the webhook
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookProvider {
    LemonSqueezy,
    Paddle,
}

impl WebhookProvider {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LemonSqueezy => "lemonsqueezy",
            Self::Paddle => "paddle",
        }
    }

    /// HTTP header carrying this provider's signature
    pub const fn signature_header(self) -> &'static str {
        match self {
            Self::LemonSqueezy => LemonSqueezySignature::HEADER,
            Self::Paddle => PaddleSignature::HEADER,
        }
    }

    /// Stateless signature check with the provider's default scheme
    pub fn verify(self, signature_header: &str, raw_body: &[u8], shared_secret: &str) -> bool {
        match self {
            Self::LemonSqueezy => LemonSqueezySignature.verify(signature_header, raw_body, shared_secret),
            Self::Paddle => PaddleSignature::new().verify(signature_header, raw_body, shared_secret),
        }
    }

    /// Parse a raw body into an unverified event
    pub fn parse(self, raw_body: &[u8]) -> Result<WebhookEvent> {
        match self {
            Self::LemonSqueezy => parse_lemonsqueezy(raw_body),
            Self::Paddle => parse_paddle(raw_body),
        }
    }
}

impl fmt::Display for WebhookProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookProvider {
    type Err = WebhookError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lemonsqueezy" => Ok(Self::LemonSqueezy),
            "paddle" => Ok(Self::Paddle),
            other => Err(WebhookError::Config(format!("unknown webhook provider: {other}"))),
        }
    }
}

/// Provider-neutral event category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEventKind {
    #[serde(rename = "checkout.completed")]
    CheckoutCompleted,
    #[serde(rename = "checkout.error")]
    CheckoutError,
    #[serde(rename = "subscription.created")]
    SubscriptionCreated,
    #[serde(rename = "subscription.updated")]
    SubscriptionUpdated,
    #[serde(rename = "subscription.cancelled")]
    SubscriptionCancelled,
    #[serde(rename = "payment.succeeded")]
    PaymentSucceeded,
    #[serde(rename = "order.refunded")]
    OrderRefunded,
    #[serde(rename = "other")]
    Other,
}

impl WebhookEventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckoutCompleted => "checkout.completed",
            Self::CheckoutError => "checkout.error",
            Self::SubscriptionCreated => "subscription.created",
            Self::SubscriptionUpdated => "subscription.updated",
            Self::SubscriptionCancelled => "subscription.cancelled",
            Self::PaymentSucceeded => "payment.succeeded",
            Self::OrderRefunded => "order.refunded",
            Self::Other => "other",
        }
    }

    /// Normalize a LemonSqueezy `meta.event_name`
    pub fn from_lemonsqueezy(event_name: &str) -> Self {
        match event_name {
            "order_created" => Self::CheckoutCompleted,
            "order_refunded" => Self::OrderRefunded,
            "subscription_created" => Self::SubscriptionCreated,
            "subscription_updated" | "subscription_resumed" | "subscription_unpaused" | "subscription_paused" => {
                Self::SubscriptionUpdated
            }
            "subscription_cancelled" | "subscription_expired" => Self::SubscriptionCancelled,
            "subscription_payment_success" => Self::PaymentSucceeded,
            "subscription_payment_failed" => Self::CheckoutError,
            _ => Self::Other,
        }
    }

    /// Normalize a Paddle Billing `event_type`
    pub fn from_paddle(event_type: &str) -> Self {
        match event_type {
            "transaction.completed" => Self::CheckoutCompleted,
            "transaction.payment_failed" => Self::CheckoutError,
            "transaction.paid" => Self::PaymentSucceeded,
            "subscription.created" | "subscription.activated" => Self::SubscriptionCreated,
            "subscription.updated" | "subscription.paused" | "subscription.resumed" => Self::SubscriptionUpdated,
            "subscription.canceled" => Self::SubscriptionCancelled,
            "adjustment.created" => Self::OrderRefunded,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for WebhookEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized webhook notification
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WebhookEvent {
    pub provider: WebhookProvider,
    pub signature_valid: bool,
    /// Event name exactly as the provider sent it
    pub event_type: String,
    pub kind: WebhookEventKind,
    pub event_id: Option<String>,
    /// ID of the order, transaction or subscription the event is about
    pub resource_id: Option<String>,
    pub customer_email: Option<String>,
    pub custom_data: Option<Value>,
    pub payload: Value,
}

impl WebhookEvent {
    /// Mark the event as authenticated
    #[must_use]
    pub const fn verified(mut self) -> Self {
        self.signature_valid = true;
        self
    }
}

#[derive(Deserialize)]
struct LemonSqueezyEnvelope {
    meta: LemonSqueezyMeta,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct LemonSqueezyMeta {
    event_name: String,
    #[serde(default)]
    webhook_id: Option<String>,
    #[serde(default)]
    custom_data: Option<Value>,
}

#[derive(Deserialize)]
struct PaddleEnvelope {
    #[serde(default)]
    event_id: Option<String>,
    event_type: String,
    #[serde(default)]
    data: Value,
}

fn string_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(Value::as_str).map(ToOwned::to_owned)
}

fn non_null(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

fn parse_lemonsqueezy(raw_body: &[u8]) -> Result<WebhookEvent> {
    let payload: Value = serde_json::from_slice(raw_body).map_err(|e| WebhookError::Parse(e.to_string()))?;
    let envelope: LemonSqueezyEnvelope =
        serde_json::from_value(payload.clone()).map_err(|e| WebhookError::Parse(e.to_string()))?;

    Ok(WebhookEvent {
        provider: WebhookProvider::LemonSqueezy,
        signature_valid: false,
        kind: WebhookEventKind::from_lemonsqueezy(&envelope.meta.event_name),
        event_type: envelope.meta.event_name,
        event_id: envelope.meta.webhook_id,
        resource_id: string_at(&envelope.data, "/id"),
        customer_email: string_at(&envelope.data, "/attributes/user_email"),
        custom_data: non_null(envelope.meta.custom_data.as_ref()),
        payload,
    })
}

fn parse_paddle(raw_body: &[u8]) -> Result<WebhookEvent> {
    let payload: Value = serde_json::from_slice(raw_body).map_err(|e| WebhookError::Parse(e.to_string()))?;
    let envelope: PaddleEnvelope =
        serde_json::from_value(payload.clone()).map_err(|e| WebhookError::Parse(e.to_string()))?;

    // Transactions only carry customer_id unless the customer was included
    let customer_email =
        string_at(&envelope.data, "/customer/email").or_else(|| string_at(&envelope.data, "/email"));

    Ok(WebhookEvent {
        provider: WebhookProvider::Paddle,
        signature_valid: false,
        kind: WebhookEventKind::from_paddle(&envelope.event_type),
        event_type: envelope.event_type,
        event_id: envelope.event_id,
        resource_id: string_at(&envelope.data, "/id"),
        customer_email,
        custom_data: non_null(envelope.data.get("custom_data")),
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_lemonsqueezy_order() {
        let body = json!({
            "meta": {
                "event_name": "order_created",
                "custom_data": { "source": "pricing-page" }
            },
            "data": {
                "id": "1024",
                "type": "orders",
                "attributes": { "user_email": "jane@example.com", "status": "paid", "total": 24900 }
            }
        });

        let event = WebhookProvider::LemonSqueezy
            .parse(body.to_string().as_bytes())
            .unwrap();

        assert_eq!(event.provider, WebhookProvider::LemonSqueezy);
        assert!(!event.signature_valid);
        assert_eq!(event.event_type, "order_created");
        assert_eq!(event.kind, WebhookEventKind::CheckoutCompleted);
        assert_eq!(event.resource_id.as_deref(), Some("1024"));
        assert_eq!(event.customer_email.as_deref(), Some("jane@example.com"));
        assert_eq!(event.custom_data, Some(json!({ "source": "pricing-page" })));
        assert_eq!(event.payload, body);
    }

    #[test]
    fn test_parse_paddle_transaction() {
        let body = json!({
            "event_id": "evt_01h8441jx8x1q971q9ksksqh82",
            "event_type": "transaction.completed",
            "occurred_at": "2024-01-01T00:00:00Z",
            "data": {
                "id": "txn_01h8441jx8x1q971q9ksksqh82",
                "status": "completed",
                "customer_id": "ctm_01h8441jx8x1q971q9ksksqh82",
                "custom_data": null
            }
        });

        let event = WebhookProvider::Paddle.parse(body.to_string().as_bytes()).unwrap();

        assert_eq!(event.kind, WebhookEventKind::CheckoutCompleted);
        assert_eq!(event.event_id.as_deref(), Some("evt_01h8441jx8x1q971q9ksksqh82"));
        assert_eq!(event.resource_id.as_deref(), Some("txn_01h8441jx8x1q971q9ksksqh82"));
        assert_eq!(event.customer_email, None);
        assert_eq!(event.custom_data, None);
    }

    #[test]
    fn test_event_kind_mapping() {
        assert_eq!(
            WebhookEventKind::from_lemonsqueezy("subscription_cancelled"),
            WebhookEventKind::SubscriptionCancelled
        );
        assert_eq!(
            WebhookEventKind::from_lemonsqueezy("subscription_payment_success"),
            WebhookEventKind::PaymentSucceeded
        );
        assert_eq!(WebhookEventKind::from_lemonsqueezy("license_key_created"), WebhookEventKind::Other);
        assert_eq!(
            WebhookEventKind::from_paddle("subscription.canceled"),
            WebhookEventKind::SubscriptionCancelled
        );
        assert_eq!(
            WebhookEventKind::from_paddle("transaction.payment_failed"),
            WebhookEventKind::CheckoutError
        );
        assert_eq!(WebhookEventKind::from_paddle("customer.created"), WebhookEventKind::Other);
    }

    #[test]
    fn test_kind_serializes_as_dotted_name() {
        assert_eq!(
            serde_json::to_value(WebhookEventKind::SubscriptionCancelled).unwrap(),
            json!("subscription.cancelled")
        );
        assert_eq!(WebhookEventKind::CheckoutError.to_string(), "checkout.error");
    }

    #[test]
    fn test_parse_rejects_bad_bodies() {
        for body in [&b"not json"[..], br#"{"data":{}}"#, br#"[]"#] {
            assert!(matches!(WebhookProvider::LemonSqueezy.parse(body), Err(WebhookError::Parse(_))));
            assert!(matches!(WebhookProvider::Paddle.parse(body), Err(WebhookError::Parse(_))));
        }
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("Paddle".parse::<WebhookProvider>().unwrap(), WebhookProvider::Paddle);
        assert_eq!("lemonsqueezy".parse::<WebhookProvider>().unwrap(), WebhookProvider::LemonSqueezy);
        assert!("stripe".parse::<WebhookProvider>().is_err());
    }
}
