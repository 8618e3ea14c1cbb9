//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use checkout_core::{BillingCycle, Product};
use checkout_webhooks::{WebhookError, WebhookEvent, WebhookEventKind, WebhookProvider};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub lemonsqueezy_configured: bool,
    pub paddle_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct ProductsQuery {
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub key: String,
    pub provider: String,
    pub name: String,
    pub description: String,
    pub price: u32,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub display_price: String,
    pub purchasable: bool,
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        Self {
            key: product.key.clone(),
            provider: product.provider.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            currency: product.currency.clone(),
            billing_cycle: product.billing_cycle,
            display_price: product.display_price(),
            purchasable: product.is_purchasable(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub event_type: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        lemonsqueezy_configured: state.lemonsqueezy.is_some(),
        paddle_configured: state.paddle.is_some(),
    })
}

/// Product listing, optionally for a single provider
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let providers = match query.provider.as_deref() {
        None => vec![WebhookProvider::Paddle, WebhookProvider::LemonSqueezy],
        Some(name) => vec![name.parse::<WebhookProvider>().map_err(|_| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("Unknown provider: {name}"),
                "UNKNOWN_PROVIDER",
            )
        })?],
    };

    let products = providers
        .into_iter()
        .flat_map(|provider| state.catalog(provider).products())
        .map(ProductResponse::from)
        .collect();

    Ok(Json(products))
}

/// LemonSqueezy webhook handler
pub async fn lemonsqueezy_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    receive_webhook(&state, WebhookProvider::LemonSqueezy, &headers, &body)
}

/// Paddle webhook handler
pub async fn paddle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    receive_webhook(&state, WebhookProvider::Paddle, &headers, &body)
}

fn receive_webhook(
    state: &AppState,
    provider: WebhookProvider,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Json<WebhookAck>, ApiError> {
    let verifier = state.verifier(provider).ok_or_else(|| {
        tracing::warn!(provider = %provider, "Webhook received but no secret is configured");
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("{provider} webhooks not configured"),
            "WEBHOOKS_DISABLED",
        )
    })?;

    let signature = headers
        .get(verifier.header_name())
        .and_then(|v| v.to_str().ok());

    let event = verifier
        .verify_and_parse(signature, body)
        .map_err(|e| api_error(status_for(&e), e.user_message(), e.code()))?;

    record(&event);

    let event_type = event.event_type.clone();
    if state.events.send(event).is_err() {
        tracing::debug!(provider = %provider, "No subscribers for verified webhook event");
    }

    Ok(Json(WebhookAck {
        received: true,
        event_type,
    }))
}

const fn status_for(error: &WebhookError) -> StatusCode {
    match error {
        WebhookError::MissingSignature | WebhookError::Parse(_) => StatusCode::BAD_REQUEST,
        WebhookError::MalformedSignature(_)
        | WebhookError::InvalidSignature
        | WebhookError::TimestampOutOfRange { .. } => StatusCode::UNAUTHORIZED,
        WebhookError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn record(event: &WebhookEvent) {
    match event.kind {
        WebhookEventKind::CheckoutCompleted | WebhookEventKind::PaymentSucceeded => tracing::info!(
            provider = %event.provider,
            resource_id = ?event.resource_id,
            email = ?event.customer_email,
            "Payment confirmed"
        ),
        WebhookEventKind::CheckoutError => tracing::warn!(
            provider = %event.provider,
            resource_id = ?event.resource_id,
            email = ?event.customer_email,
            "Payment failed - may need to notify customer"
        ),
        WebhookEventKind::SubscriptionCreated
        | WebhookEventKind::SubscriptionUpdated
        | WebhookEventKind::SubscriptionCancelled
        | WebhookEventKind::OrderRefunded => tracing::info!(
            provider = %event.provider,
            kind = %event.kind,
            resource_id = ?event.resource_id,
            "Billing lifecycle event"
        ),
        WebhookEventKind::Other => tracing::debug!(
            provider = %event.provider,
            event_type = %event.event_type,
            "Unhandled webhook event"
        ),
    }
}
