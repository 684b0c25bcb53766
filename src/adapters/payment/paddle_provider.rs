//! Paddle payment provider adapter.
//!
//! Implements the `PaymentProvider` port against the Paddle Billing API.
//!
//! # Security
//!
//! Webhook signatures arrive as `ts=<unix>;h1=<hex>`: HMAC-SHA256 over
//! `"{ts}:{payload}"` compared in constant time. Paddle's scheme enforces no
//! timestamp tolerance; the timestamp participates in the signed payload
//! only.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::adapters::payment::signature::{constant_time_eq, hmac_sha256};
use crate::config::{PaddleSettings, ValidationError};
use crate::domain::events::ProviderEvent;
use crate::domain::{ProviderKind, WebhookHeaders};
use crate::ports::{
    Charge, ChargeRequest, ChargeStatus, CheckoutSession, CreateCheckoutRequest, PaymentError,
    PaymentProvider, PortalSession, SubscribeRequest, Subscription, SubscriptionStatus,
};

const LIVE_API_BASE_URL: &str = "https://api.paddle.com";
const SANDBOX_API_BASE_URL: &str = "https://sandbox-api.paddle.com";

/// Paddle API configuration.
#[derive(Clone)]
pub struct PaddleConfig {
    api_key: SecretString,
    api_base_url: String,
}

impl PaddleConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: LIVE_API_BASE_URL.to_string(),
        }
    }

    /// Point at the Paddle sandbox environment.
    pub fn sandbox(mut self) -> Self {
        self.api_base_url = SANDBOX_API_BASE_URL.to_string();
        self
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Paddle payment provider adapter.
pub struct PaddleProvider {
    config: PaddleConfig,
    http_client: reqwest::Client,
}

impl PaddleProvider {
    pub fn new(config: PaddleConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Build from validated settings.
    ///
    /// # Errors
    ///
    /// Fails permanently when the API key is missing.
    pub fn from_settings(settings: &PaddleSettings) -> Result<Self, ValidationError> {
        settings.validate()?;
        let mut config = PaddleConfig::new(settings.api_key.clone());
        if settings.sandbox {
            config = config.sandbox();
        }
        if let Some(url) = &settings.api_base_url {
            config = config.with_base_url(url.clone());
        }
        Ok(Self::new(config))
    }

    async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, PaymentError> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::not_found("Paddle resource"));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, error = %error_text, "Paddle API call failed");
            return Err(PaymentError::provider(format!(
                "Paddle API error ({}): {}",
                status, error_text
            )));
        }

        // Paddle wraps every response in a `data` envelope.
        let envelope: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PaymentError::provider(format!("Failed to parse Paddle response: {}", e)))?;
        Ok(envelope.get("data").cloned().unwrap_or(envelope))
    }
}

#[derive(Deserialize)]
struct PaddleSubscriptionResponse {
    id: String,
    customer_id: Option<String>,
    status: String,
    current_billing_period: Option<PaddleBillingPeriod>,
    scheduled_change: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct PaddleBillingPeriod {
    ends_at: Option<String>,
}

fn subscription_from_response(sub: PaddleSubscriptionResponse) -> Subscription {
    let cancel_scheduled = sub
        .scheduled_change
        .as_ref()
        .and_then(|c| c.get("action"))
        .and_then(|a| a.as_str())
        .is_some_and(|a| a == "cancel");

    Subscription {
        id: sub.id,
        customer_id: sub.customer_id,
        status: SubscriptionStatus::from_provider_str(&sub.status),
        current_period_end: sub
            .current_billing_period
            .and_then(|p| p.ends_at)
            .and_then(|t| parse_rfc3339(&t)),
        cancel_at_period_end: cancel_scheduled,
    }
}

fn parse_rfc3339(value: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.timestamp())
}

/// Parse a `Paddle-Signature` header: `ts=<unix>;h1=<hex>`.
fn parse_signature_header(header: &str) -> Option<(i64, Vec<u8>)> {
    let mut timestamp = None;
    let mut digest = None;

    for part in header.split(';') {
        let (key, value) = part.split_once('=')?;
        match key.trim() {
            "ts" => timestamp = value.trim().parse().ok(),
            "h1" => digest = hex::decode(value.trim()).ok(),
            _ => {}
        }
    }

    Some((timestamp?, digest?))
}

#[async_trait]
impl PaymentProvider for PaddleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Paddle
    }

    async fn charge(&self, request: ChargeRequest) -> Result<Charge, PaymentError> {
        // Ad-hoc (non-catalog) price on a transaction.
        let mut body = json!({
            "items": [{
                "quantity": 1,
                "price": {
                    "description": request.description.clone().unwrap_or_else(|| "One-time charge".to_string()),
                    "unit_price": {
                        "amount": request.amount.to_string(),
                        "currency_code": request.currency.to_ascii_uppercase(),
                    }
                }
            }]
        });
        if let Some(customer_id) = &request.customer_id {
            body["customer_id"] = json!(customer_id);
        }
        if let Some(metadata) = &request.metadata {
            body["custom_data"] = metadata.clone();
        }

        let data = self.post_json("/transactions", body).await?;

        #[derive(Deserialize)]
        struct TransactionResponse {
            id: String,
            status: String,
        }

        let txn: TransactionResponse = serde_json::from_value(data)
            .map_err(|e| PaymentError::provider(format!("Invalid transaction: {}", e)))?;

        let status = match txn.status.as_str() {
            "completed" | "paid" => ChargeStatus::Succeeded,
            "canceled" => ChargeStatus::Failed,
            _ => ChargeStatus::Pending,
        };

        Ok(Charge {
            id: txn.id,
            status,
            amount: request.amount,
            currency: request.currency,
        })
    }

    async fn subscribe(&self, _request: SubscribeRequest) -> Result<Subscription, PaymentError> {
        // Paddle only creates subscriptions through completed checkout
        // transactions; there is no direct subscription-create endpoint.
        Err(PaymentError::unsupported(
            "direct subscription creation (use a checkout session)",
            ProviderKind::Paddle,
        ))
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<Subscription, PaymentError> {
        let effective_from = if at_period_end {
            "next_billing_period"
        } else {
            "immediately"
        };
        let data = self
            .post_json(
                &format!("/subscriptions/{}/cancel", subscription_id),
                json!({"effective_from": effective_from}),
            )
            .await?;

        let sub: PaddleSubscriptionResponse = serde_json::from_value(data)
            .map_err(|e| PaymentError::provider(format!("Invalid subscription: {}", e)))?;
        Ok(subscription_from_response(sub))
    }

    async fn pause_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        let data = self
            .post_json(
                &format!("/subscriptions/{}/pause", subscription_id),
                json!({}),
            )
            .await?;

        let sub: PaddleSubscriptionResponse = serde_json::from_value(data)
            .map_err(|e| PaymentError::provider(format!("Invalid subscription: {}", e)))?;
        Ok(subscription_from_response(sub))
    }

    async fn resume_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        let data = self
            .post_json(
                &format!("/subscriptions/{}/resume", subscription_id),
                json!({"effective_from": "immediately"}),
            )
            .await?;

        let sub: PaddleSubscriptionResponse = serde_json::from_value(data)
            .map_err(|e| PaymentError::provider(format!("Invalid subscription: {}", e)))?;
        Ok(subscription_from_response(sub))
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut body = json!({
            "items": [{"price_id": request.plan_id, "quantity": 1}],
            "checkout": {"url": request.success_url},
        });
        if let Some(email) = &request.email {
            body["customer"] = json!({"email": email});
        }
        if let Some(metadata) = &request.metadata {
            body["custom_data"] = metadata.clone();
        }

        let data = self.post_json("/transactions", body).await?;

        let id = data
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PaymentError::provider("Transaction response missing id"))?
            .to_string();
        let url = data
            .get("checkout")
            .and_then(|c| c.get("url"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| PaymentError::provider("Transaction response missing checkout url"))?
            .to_string();

        Ok(CheckoutSession {
            id,
            url,
            expires_at: None,
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        _return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        let data = self
            .post_json(
                &format!("/customers/{}/portal-sessions", customer_id),
                json!({}),
            )
            .await?;

        let id = data
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let url = data
            .get("urls")
            .and_then(|u| u.get("general"))
            .and_then(|g| g.get("overview"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| PaymentError::provider("Portal session response missing url"))?
            .to_string();

        Ok(PortalSession { id, url })
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

        let Some((timestamp, digest)) = parse_signature_header(signature) else {
            tracing::warn!("Malformed Paddle-Signature header");
            return false;
        };
        // Wrong-length digests are rejected before any HMAC is computed.
        if digest.len() != crate::adapters::payment::signature::DIGEST_LEN {
            return false;
        }

        let mut signed_payload = timestamp.to_string().into_bytes();
        signed_payload.push(b':');
        signed_payload.extend_from_slice(payload);

        constant_time_eq(&hmac_sha256(secret.as_bytes(), &signed_payload), &digest)
    }

    fn normalize_webhook_event(&self, raw: &serde_json::Value) -> Option<ProviderEvent> {
        Some(ProviderEvent {
            event_type: raw.get("event_type")?.as_str()?.to_string(),
            id: raw
                .get("event_id")
                .and_then(|v| v.as_str())
                .map(String::from),
            data: raw.get("data").cloned().unwrap_or(serde_json::Value::Null),
            occurred_at: raw
                .get("occurred_at")
                .and_then(|v| v.as_str())
                .and_then(parse_rfc3339),
        })
    }
}
