//! Polar payment provider adapter.
//!
//! Implements the `PaymentProvider` port against the Polar API. Payments and
//! subscriptions are created through hosted checkouts; pause/resume have no
//! processor equivalent and report `Unsupported`.
//!
//! # Security
//!
//! The `x-polar-signature` header carries a raw hex HMAC-SHA256 digest of the
//! payload. Polar issues Standard-Webhooks style secrets, so the configured
//! secret is tried base64-decoded first and as raw bytes second; either
//! keying that matches the digest authenticates the payload.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::adapters::payment::signature::verify_hex_digest;
use crate::config::{PolarSettings, ValidationError};
use crate::domain::events::ProviderEvent;
use crate::domain::{ProviderKind, WebhookHeaders};
use crate::ports::{
    Charge, ChargeRequest, CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentProvider,
    PortalSession, SubscribeRequest, Subscription, SubscriptionStatus,
};

const LIVE_API_BASE_URL: &str = "https://api.polar.sh";
const SANDBOX_API_BASE_URL: &str = "https://sandbox-api.polar.sh";

/// Polar API configuration.
#[derive(Clone)]
pub struct PolarConfig {
    access_token: SecretString,
    api_base_url: String,
}

impl PolarConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
            api_base_url: LIVE_API_BASE_URL.to_string(),
        }
    }

    /// Point at the Polar sandbox environment.
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

/// Polar payment provider adapter.
pub struct PolarProvider {
    config: PolarConfig,
    http_client: reqwest::Client,
}

impl PolarProvider {
    pub fn new(config: PolarConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Build from validated settings.
    ///
    /// # Errors
    ///
    /// Fails permanently when the access token is missing.
    pub fn from_settings(settings: &PolarSettings) -> Result<Self, ValidationError> {
        settings.validate()?;
        let mut config = PolarConfig::new(settings.access_token.clone());
        if settings.sandbox {
            config = config.sandbox();
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
            .bearer_auth(self.config.access_token.expose_secret());
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::not_found("Polar resource"));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, error = %error_text, "Polar API call failed");
            return Err(PaymentError::provider(format!(
                "Polar API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PaymentError::provider(format!("Failed to parse Polar response: {}", e)))
    }
}

fn subscription_from_response(data: &serde_json::Value) -> Result<Subscription, PaymentError> {
    let id = data
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| PaymentError::provider("Subscription response missing id"))?
        .to_string();

    Ok(Subscription {
        id,
        customer_id: data
            .get("customer_id")
            .and_then(|v| v.as_str())
            .map(String::from),
        status: data
            .get("status")
            .and_then(|v| v.as_str())
            .map(SubscriptionStatus::from_provider_str)
            .unwrap_or(SubscriptionStatus::Unknown),
        current_period_end: data
            .get("current_period_end")
            .and_then(|v| v.as_str())
            .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
            .map(|dt| dt.timestamp()),
        cancel_at_period_end: data
            .get("cancel_at_period_end")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    })
}

/// Candidate HMAC keys for a Standard-Webhooks style secret.
///
/// The optional `whsec_` prefix is stripped and the remainder base64-decoded;
/// the raw secret bytes are kept as the fallback keying.
fn secret_candidates(secret: &str) -> Vec<Vec<u8>> {
    let mut candidates = Vec::new();
    let stripped = secret.strip_prefix("whsec_").unwrap_or(secret);
    if let Ok(decoded) = STANDARD.decode(stripped) {
        if !decoded.is_empty() {
            candidates.push(decoded);
        }
    }
    candidates.push(secret.as_bytes().to_vec());
    candidates
}

#[async_trait]
impl PaymentProvider for PolarProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Polar
    }

    async fn charge(&self, _request: ChargeRequest) -> Result<Charge, PaymentError> {
        Err(PaymentError::unsupported(
            "direct charges (use a checkout session)",
            ProviderKind::Polar,
        ))
    }

    async fn subscribe(&self, _request: SubscribeRequest) -> Result<Subscription, PaymentError> {
        Err(PaymentError::unsupported(
            "direct subscription creation (use a checkout session)",
            ProviderKind::Polar,
        ))
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<Subscription, PaymentError> {
        let data = if at_period_end {
            self.request_json(
                reqwest::Method::PATCH,
                &format!("/v1/subscriptions/{}", subscription_id),
                Some(json!({"cancel_at_period_end": true})),
            )
            .await?
        } else {
            // Immediate revocation.
            self.request_json(
                reqwest::Method::DELETE,
                &format!("/v1/subscriptions/{}", subscription_id),
                None,
            )
            .await?
        };
        subscription_from_response(&data)
    }

    async fn pause_subscription(
        &self,
        _subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        Err(PaymentError::unsupported(
            "pausing subscriptions",
            ProviderKind::Polar,
        ))
    }

    async fn resume_subscription(
        &self,
        _subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        Err(PaymentError::unsupported(
            "resuming subscriptions",
            ProviderKind::Polar,
        ))
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut body = json!({
            "products": [request.plan_id],
            "success_url": request.success_url,
        });
        if let Some(email) = &request.email {
            body["customer_email"] = json!(email);
        }
        if let Some(metadata) = &request.metadata {
            body["metadata"] = metadata.clone();
        }

        let data = self
            .request_json(reqwest::Method::POST, "/v1/checkouts/", Some(body))
            .await?;

        let id = data
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PaymentError::provider("Checkout response missing id"))?
            .to_string();
        let url = data
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PaymentError::provider("Checkout response missing url"))?
            .to_string();
        let expires_at = data
            .get("expires_at")
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
        let data = self
            .request_json(
                reqwest::Method::POST,
                "/v1/customer-sessions/",
                Some(json!({"customer_id": customer_id})),
            )
            .await?;

        let url = data
            .get("customer_portal_url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PaymentError::provider("Customer session missing portal url"))?
            .to_string();

        Ok(PortalSession {
            id: data
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or(customer_id)
                .to_string(),
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

        secret_candidates(secret)
            .iter()
            .any(|key| verify_hex_digest(key, payload, signature))
    }

    fn normalize_webhook_event(&self, raw: &serde_json::Value) -> Option<ProviderEvent> {
        let occurred_at = raw
            .get("timestamp")
            .or_else(|| raw.get("created_at"))
            .and_then(parse_timestamp)
            .unwrap_or_else(|| chrono::Utc::now().timestamp());

        Some(ProviderEvent {
            event_type: raw.get("type")?.as_str()?.to_string(),
            id: raw
                .get("data")
                .and_then(|d| d.get("id"))
                .and_then(|v| v.as_str())
                .map(String::from),
            data: raw.get("data").cloned().unwrap_or(serde_json::Value::Null),
            occurred_at: Some(occurred_at),
        })
    }
}

/// Polar timestamps arrive as either unix integers or RFC 3339 strings.
fn parse_timestamp(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp()),
        _ => None,
    }
}
