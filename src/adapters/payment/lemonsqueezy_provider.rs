//! Lemon Squeezy payment provider adapter.
//!
//! Implements the `PaymentProvider` port against the Lemon Squeezy JSON:API.
//! Payments and subscriptions are created through hosted checkouts; the
//! direct `charge`/`subscribe` operations report `Unsupported`.
//!
//! # Security
//!
//! The `X-Signature` webhook header carries a raw hex HMAC-SHA256 digest of
//! the payload, compared in constant time.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::adapters::payment::signature::verify_hex_digest;
use crate::config::{LemonSqueezySettings, ValidationError};
use crate::domain::events::ProviderEvent;
use crate::domain::{ProviderKind, WebhookHeaders};
use crate::ports::{
    Charge, ChargeRequest, CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentProvider,
    PortalSession, SubscribeRequest, Subscription, SubscriptionStatus,
};

const DEFAULT_API_BASE_URL: &str = "https://api.lemonsqueezy.com";

/// Lemon Squeezy API configuration.
#[derive(Clone)]
pub struct LemonSqueezyConfig {
    api_key: SecretString,
    store_id: Option<String>,
    api_base_url: String,
}

impl LemonSqueezyConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            store_id: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    /// Store the checkouts belong to.
    pub fn with_store_id(mut self, store_id: impl Into<String>) -> Self {
        self.store_id = Some(store_id.into());
        self
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Lemon Squeezy payment provider adapter.
pub struct LemonSqueezyProvider {
    config: LemonSqueezyConfig,
    http_client: reqwest::Client,
}

impl LemonSqueezyProvider {
    pub fn new(config: LemonSqueezyConfig) -> Self {
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
    pub fn from_settings(settings: &LemonSqueezySettings) -> Result<Self, ValidationError> {
        settings.validate()?;
        let mut config = LemonSqueezyConfig::new(settings.api_key.clone());
        if let Some(store_id) = &settings.store_id {
            config = config.with_store_id(store_id.clone());
        }
        if let Some(url) = &settings.api_base_url {
            config = config.with_base_url(url.clone());
        }
        Ok(Self::new(config))
    }

    async fn request_json(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, PaymentError> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let mut request = self
            .http_client
            .request(method, &url)
            .bearer_auth(self.config.api_key.expose_secret())
            .header("Accept", "application/vnd.api+json");
        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/vnd.api+json")
                .json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::not_found("Lemon Squeezy resource"));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, error = %error_text, "Lemon Squeezy API call failed");
            return Err(PaymentError::provider(format!(
                "Lemon Squeezy API error ({}): {}",
                status, error_text
            )));
        }

        let envelope: serde_json::Value = response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Lemon Squeezy response: {}", e))
        })?;
        Ok(envelope.get("data").cloned().unwrap_or(envelope))
    }
}

fn subscription_from_resource(data: &serde_json::Value) -> Result<Subscription, PaymentError> {
    let id = data
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| PaymentError::provider("Subscription resource missing id"))?
        .to_string();
    let attributes = data.get("attributes").cloned().unwrap_or(json!({}));

    let status = attributes
        .get("status")
        .and_then(|v| v.as_str())
        .map(SubscriptionStatus::from_provider_str)
        .unwrap_or(SubscriptionStatus::Unknown);

    let customer_id = attributes.get("customer_id").map(|v| match v {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => String::new(),
    });

    let current_period_end = attributes
        .get("renews_at")
        .and_then(|v| v.as_str())
        .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
        .map(|dt| dt.timestamp());

    Ok(Subscription {
        id,
        customer_id: customer_id.filter(|c| !c.is_empty()),
        status,
        current_period_end,
        cancel_at_period_end: attributes
            .get("cancelled")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    })
}

#[async_trait]
impl PaymentProvider for LemonSqueezyProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LemonSqueezy
    }

    async fn charge(&self, _request: ChargeRequest) -> Result<Charge, PaymentError> {
        // All payments flow through hosted checkouts.
        Err(PaymentError::unsupported(
            "direct charges (use a checkout session)",
            ProviderKind::LemonSqueezy,
        ))
    }

    async fn subscribe(&self, _request: SubscribeRequest) -> Result<Subscription, PaymentError> {
        Err(PaymentError::unsupported(
            "direct subscription creation (use a checkout session)",
            ProviderKind::LemonSqueezy,
        ))
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        _at_period_end: bool,
    ) -> Result<Subscription, PaymentError> {
        // Lemon Squeezy cancellation always runs to the end of the paid period.
        let data = self
            .request_json(
                reqwest::Method::DELETE,
                &format!("/v1/subscriptions/{}", subscription_id),
                None,
            )
            .await?;
        subscription_from_resource(&data)
    }

    async fn pause_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        let body = json!({
            "data": {
                "type": "subscriptions",
                "id": subscription_id,
                "attributes": {"pause": {"mode": "void"}}
            }
        });
        let data = self
            .request_json(
                reqwest::Method::PATCH,
                &format!("/v1/subscriptions/{}", subscription_id),
                Some(body),
            )
            .await?;
        subscription_from_resource(&data)
    }

    async fn resume_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        let body = json!({
            "data": {
                "type": "subscriptions",
                "id": subscription_id,
                "attributes": {"pause": null}
            }
        });
        let data = self
            .request_json(
                reqwest::Method::PATCH,
                &format!("/v1/subscriptions/{}", subscription_id),
                Some(body),
            )
            .await?;
        subscription_from_resource(&data)
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let store_id = self.config.store_id.clone().ok_or_else(|| {
            PaymentError::provider("Lemon Squeezy checkouts require a configured store_id")
        })?;

        let mut checkout_data = json!({});
        if let Some(email) = &request.email {
            checkout_data["email"] = json!(email);
        }
        if let Some(metadata) = &request.metadata {
            checkout_data["custom"] = metadata.clone();
        }

        let body = json!({
            "data": {
                "type": "checkouts",
                "attributes": {
                    "checkout_data": checkout_data,
                    "product_options": {"redirect_url": request.success_url},
                },
                "relationships": {
                    "store": {"data": {"type": "stores", "id": store_id}},
                    "variant": {"data": {"type": "variants", "id": request.plan_id}},
                }
            }
        });

        let data = self
            .request_json(reqwest::Method::POST, "/v1/checkouts", Some(body))
            .await?;

        let id = data
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let url = data
            .get("attributes")
            .and_then(|a| a.get("url"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| PaymentError::provider("Checkout response missing url"))?
            .to_string();
        let expires_at = data
            .get("attributes")
            .and_then(|a| a.get("expires_at"))
            .and_then(|v| v.as_str())
            .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
            .map(|dt| dt.timestamp());

        Ok(CheckoutSession { id, url, expires_at })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        _return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        // The portal URL is a signed link on the customer resource.
        let data = self
            .request_json(
                reqwest::Method::GET,
                &format!("/v1/customers/{}", customer_id),
                None,
            )
            .await?;

        let url = data
            .get("attributes")
            .and_then(|a| a.get("urls"))
            .and_then(|u| u.get("customer_portal"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| PaymentError::provider("Customer resource missing portal url"))?
            .to_string();

        Ok(PortalSession {
            id: customer_id.to_string(),
            url,
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
        verify_hex_digest(secret.as_bytes(), payload, signature)
    }

    fn normalize_webhook_event(&self, raw: &serde_json::Value) -> Option<ProviderEvent> {
        let event_type = raw
            .get("meta")?
            .get("event_name")?
            .as_str()?
            .to_string();

        Some(ProviderEvent {
            event_type,
            id: raw
                .get("data")
                .and_then(|d| d.get("id"))
                .and_then(|v| v.as_str())
                .map(String::from),
            data: raw.get("data").cloned().unwrap_or(serde_json::Value::Null),
            // Lemon Squeezy envelopes carry no event timestamp.
            occurred_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::payment::signature::hmac_sha256_hex;

    const TEST_SECRET: &str = "ls_whsec_test";

    fn test_provider() -> LemonSqueezyProvider {
        LemonSqueezyProvider::new(LemonSqueezyConfig::new("lskey_test").with_store_id("12345"))
    }

    #[test]
    fn from_settings_rejects_missing_api_key() {
        assert!(LemonSqueezyProvider::from_settings(&LemonSqueezySettings::default()).is_err());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Signature verification
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn verify_accepts_valid_signature() {
        let provider = test_provider();
        let payload = br#"{"meta":{"event_name":"order_created"}}"#;
        let signature = hmac_sha256_hex(TEST_SECRET.as_bytes(), payload);

        assert!(
            provider
                .verify_webhook(payload, Some(&signature), Some(TEST_SECRET), &WebhookHeaders::new())
                .await
        );
    }

    #[tokio::test]
    async fn verify_rejects_wrong_secret() {
        let provider = test_provider();
        let payload = br#"{"meta":{"event_name":"order_created"}}"#;
        let signature = hmac_sha256_hex(b"wrong_secret", payload);

        assert!(
            !provider
                .verify_webhook(payload, Some(&signature), Some(TEST_SECRET), &WebhookHeaders::new())
                .await
        );
    }

    #[tokio::test]
    async fn verify_rejects_tampered_payload() {
        let provider = test_provider();
        let signature = hmac_sha256_hex(TEST_SECRET.as_bytes(), b"original");

        assert!(
            !provider
                .verify_webhook(b"tampered", Some(&signature), Some(TEST_SECRET), &WebhookHeaders::new())
                .await
        );
    }

    #[tokio::test]
    async fn verify_rejects_non_hex_signature() {
        let provider = test_provider();
        assert!(
            !provider
                .verify_webhook(
                    b"payload",
                    Some("not-a-valid-hex-signature"),
                    Some(TEST_SECRET),
                    &WebhookHeaders::new()
                )
                .await
        );
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Operations without a processor equivalent
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn direct_charge_reports_unsupported() {
        let provider = test_provider();
        let result = provider
            .charge(ChargeRequest {
                amount: 999,
                currency: "usd".to_string(),
                customer_id: None,
                email: None,
                description: None,
                metadata: None,
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.code, crate::ports::PaymentErrorCode::Unsupported);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Envelope extraction
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn normalize_reads_event_name_from_meta() {
        let provider = test_provider();
        let raw = serde_json::json!({
            "meta": {"event_name": "subscription_created", "custom_data": {}},
            "data": {"type": "subscriptions", "id": "9876", "attributes": {"status": "active"}}
        });

        let event = provider.normalize_webhook_event(&raw).unwrap();
        assert_eq!(event.event_type, "subscription_created");
        assert_eq!(event.id.as_deref(), Some("9876"));
        assert!(event.occurred_at.is_none());
    }

    #[test]
    fn normalize_rejects_envelope_without_meta() {
        let provider = test_provider();
        assert!(provider
            .normalize_webhook_event(&serde_json::json!({"data": {}}))
            .is_none());
    }

    #[test]
    fn subscription_resource_parsing() {
        let data = serde_json::json!({
            "id": "4567",
            "attributes": {
                "status": "on_trial",
                "customer_id": 112233,
                "renews_at": "2024-02-01T00:00:00Z",
                "cancelled": false
            }
        });
        let sub = subscription_from_resource(&data).unwrap();
        assert_eq!(sub.id, "4567");
        assert_eq!(sub.customer_id.as_deref(), Some("112233"));
        assert_eq!(sub.status, SubscriptionStatus::Trialing);
        assert!(sub.current_period_end.is_some());
    }
}
