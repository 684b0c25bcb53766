//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port against the Stripe REST API.
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 over `"{timestamp}.{payload}"` with
//!   constant-time comparison
//! - Timestamps more than five minutes from now are rejected to block replays
//! - Secrets are handled via `secrecy::SecretString`

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::adapters::payment::signature::{constant_time_eq, hmac_sha256};
use crate::config::{StripeSettings, ValidationError};
use crate::domain::events::ProviderEvent;
use crate::domain::{ProviderKind, WebhookHeaders};
use crate::ports::{
    Charge, ChargeRequest, ChargeStatus, CheckoutSession, CreateCheckoutRequest, PaymentError,
    PaymentProvider, PortalSession, SubscribeRequest, Subscription, SubscriptionStatus,
};

/// Maximum distance between a webhook timestamp and now (5 minutes).
const MAX_TIMESTAMP_SKEW_SECS: i64 = 300;

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    api_key: SecretString,
    api_base_url: String,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Stripe payment provider adapter.
pub struct StripeProvider {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeProvider {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Build from validated settings.
    ///
    /// # Errors
    ///
    /// Fails permanently when the API key is missing or malformed; provider
    /// construction is never retried.
    pub fn from_settings(settings: &StripeSettings) -> Result<Self, ValidationError> {
        settings.validate()?;
        let mut config = StripeConfig::new(settings.api_key.clone());
        if let Some(url) = &settings.api_base_url {
            config = config.with_base_url(url.clone());
        }
        Ok(Self::new(config))
    }

    async fn post_form(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, PaymentError> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        read_json_response(response).await
    }

    async fn delete(&self, path: &str) -> Result<serde_json::Value, PaymentError> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let response = self
            .http_client
            .delete(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        read_json_response(response).await
    }
}

async fn read_json_response(response: reqwest::Response) -> Result<serde_json::Value, PaymentError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(PaymentError::not_found("Stripe resource"));
    }
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, error = %error_text, "Stripe API call failed");
        return Err(PaymentError::provider(format!(
            "Stripe API error ({}): {}",
            status, error_text
        )));
    }
    response
        .json()
        .await
        .map_err(|e| PaymentError::provider(format!("Failed to parse Stripe response: {}", e)))
}

/// Flatten a metadata object into Stripe's `metadata[key]=value` form fields.
fn metadata_params(metadata: &Option<serde_json::Value>, params: &mut Vec<(String, String)>) {
    if let Some(map) = metadata.as_ref().and_then(|m| m.as_object()) {
        for (key, value) in map {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            params.push((format!("metadata[{}]", key), rendered));
        }
    }
}

fn charge_status_from_str(status: &str) -> ChargeStatus {
    match status {
        "succeeded" => ChargeStatus::Succeeded,
        "canceled" => ChargeStatus::Failed,
        // requires_payment_method, requires_confirmation, processing, ...
        _ => ChargeStatus::Pending,
    }
}

#[derive(Deserialize)]
struct StripeSubscriptionResponse {
    id: String,
    customer: Option<String>,
    status: String,
    current_period_end: Option<i64>,
    #[serde(default)]
    cancel_at_period_end: bool,
}

fn subscription_from_response(sub: StripeSubscriptionResponse) -> Subscription {
    Subscription {
        id: sub.id,
        customer_id: sub.customer,
        status: SubscriptionStatus::from_provider_str(&sub.status),
        current_period_end: sub.current_period_end,
        cancel_at_period_end: sub.cancel_at_period_end,
    }
}

/// Parsed `Stripe-Signature` header: `t=<unix>,v1=<hex>`.
struct SignatureParts {
    timestamp: i64,
    digest: Vec<u8>,
}

fn parse_signature_header(header: &str) -> Option<SignatureParts> {
    let mut timestamp = None;
    let mut digest = None;

    for part in header.split(',') {
        let (key, value) = part.split_once('=')?;
        match key.trim() {
            "t" => timestamp = value.trim().parse().ok(),
            "v1" => digest = hex::decode(value.trim()).ok(),
            // Ignore v0 and future fields.
            _ => {}
        }
    }

    Some(SignatureParts {
        timestamp: timestamp?,
        digest: digest?,
    })
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stripe
    }

    async fn charge(&self, request: ChargeRequest) -> Result<Charge, PaymentError> {
        let mut params = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.clone()),
        ];
        if let Some(customer) = &request.customer_id {
            params.push(("customer".to_string(), customer.clone()));
        }
        if let Some(email) = &request.email {
            params.push(("receipt_email".to_string(), email.clone()));
        }
        if let Some(description) = &request.description {
            params.push(("description".to_string(), description.clone()));
        }
        metadata_params(&request.metadata, &mut params);

        let body = self.post_form("/v1/payment_intents", &params).await?;

        #[derive(Deserialize)]
        struct PaymentIntentResponse {
            id: String,
            status: String,
            amount: i64,
            currency: String,
        }

        let intent: PaymentIntentResponse = serde_json::from_value(body)
            .map_err(|e| PaymentError::provider(format!("Invalid payment intent: {}", e)))?;

        Ok(Charge {
            id: intent.id,
            status: charge_status_from_str(&intent.status),
            amount: intent.amount,
            currency: intent.currency,
        })
    }

    async fn subscribe(&self, request: SubscribeRequest) -> Result<Subscription, PaymentError> {
        let mut params = vec![
            ("customer".to_string(), request.customer_id.clone()),
            ("items[0][price]".to_string(), request.plan_id.clone()),
        ];
        metadata_params(&request.metadata, &mut params);

        let body = self.post_form("/v1/subscriptions", &params).await?;
        let sub: StripeSubscriptionResponse = serde_json::from_value(body)
            .map_err(|e| PaymentError::provider(format!("Invalid subscription: {}", e)))?;

        Ok(subscription_from_response(sub))
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<Subscription, PaymentError> {
        let body = if at_period_end {
            self.post_form(
                &format!("/v1/subscriptions/{}", subscription_id),
                &[("cancel_at_period_end".to_string(), "true".to_string())],
            )
            .await?
        } else {
            self.delete(&format!("/v1/subscriptions/{}", subscription_id))
                .await?
        };

        let sub: StripeSubscriptionResponse = serde_json::from_value(body)
            .map_err(|e| PaymentError::provider(format!("Invalid subscription: {}", e)))?;

        Ok(subscription_from_response(sub))
    }

    async fn pause_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        let body = self
            .post_form(
                &format!("/v1/subscriptions/{}", subscription_id),
                &[(
                    "pause_collection[behavior]".to_string(),
                    "void".to_string(),
                )],
            )
            .await?;

        let sub: StripeSubscriptionResponse = serde_json::from_value(body)
            .map_err(|e| PaymentError::provider(format!("Invalid subscription: {}", e)))?;

        // Stripe keeps the status "active" while collection is paused.
        let mut subscription = subscription_from_response(sub);
        subscription.status = SubscriptionStatus::Paused;
        Ok(subscription)
    }

    async fn resume_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        // Clearing pause_collection resumes collection.
        let body = self
            .post_form(
                &format!("/v1/subscriptions/{}", subscription_id),
                &[("pause_collection".to_string(), String::new())],
            )
            .await?;

        let sub: StripeSubscriptionResponse = serde_json::from_value(body)
            .map_err(|e| PaymentError::provider(format!("Invalid subscription: {}", e)))?;

        Ok(subscription_from_response(sub))
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut params = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("line_items[0][price]".to_string(), request.plan_id.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
        ];
        if let Some(email) = &request.email {
            params.push(("customer_email".to_string(), email.clone()));
        }
        metadata_params(&request.metadata, &mut params);

        let body = self.post_form("/v1/checkout/sessions", &params).await?;

        #[derive(Deserialize)]
        struct CheckoutSessionResponse {
            id: String,
            url: Option<String>,
            expires_at: Option<i64>,
        }

        let session: CheckoutSessionResponse = serde_json::from_value(body)
            .map_err(|e| PaymentError::provider(format!("Invalid checkout session: {}", e)))?;

        let url = session
            .url
            .unwrap_or_else(|| format!("https://checkout.stripe.com/c/pay/{}", session.id));

        Ok(CheckoutSession {
            id: session.id,
            url,
            expires_at: session.expires_at,
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        let body = self
            .post_form(
                "/v1/billing_portal/sessions",
                &[
                    ("customer".to_string(), customer_id.to_string()),
                    ("return_url".to_string(), return_url.to_string()),
                ],
            )
            .await?;

        #[derive(Deserialize)]
        struct PortalSessionResponse {
            id: String,
            url: String,
        }

        let portal: PortalSessionResponse = serde_json::from_value(body)
            .map_err(|e| PaymentError::provider(format!("Invalid portal session: {}", e)))?;

        Ok(PortalSession {
            id: portal.id,
            url: portal.url,
        })
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        secret: Option<&str>,
        _headers: &WebhookHeaders,
    ) -> bool {
        let (Some(signature), Some(secret)) = (signature, secret) else {
            return false;
        };

        let Some(parts) = parse_signature_header(signature) else {
            tracing::warn!("Malformed Stripe-Signature header");
            return false;
        };
        // Wrong-length digests are rejected before any HMAC is computed.
        if parts.digest.len() != crate::adapters::payment::signature::DIGEST_LEN {
            return false;
        }

        let now = chrono::Utc::now().timestamp();
        if (now - parts.timestamp).abs() > MAX_TIMESTAMP_SKEW_SECS {
            tracing::warn!(
                event_timestamp = parts.timestamp,
                current_time = now,
                "Stripe webhook timestamp outside tolerance"
            );
            return false;
        }

        let mut signed_payload = parts.timestamp.to_string().into_bytes();
        signed_payload.push(b'.');
        signed_payload.extend_from_slice(payload);

        constant_time_eq(
            &hmac_sha256(secret.as_bytes(), &signed_payload),
            &parts.digest,
        )
    }

    fn normalize_webhook_event(&self, raw: &serde_json::Value) -> Option<ProviderEvent> {
        Some(ProviderEvent {
            event_type: raw.get("type")?.as_str()?.to_string(),
            id: raw.get("id").and_then(|v| v.as_str()).map(String::from),
            data: raw
                .get("data")
                .and_then(|d| d.get("object"))
                .cloned()
                .unwrap_or(serde_json::Value::Null),
            occurred_at: raw.get("created").and_then(|v| v.as_i64()),
        })
    }
}
