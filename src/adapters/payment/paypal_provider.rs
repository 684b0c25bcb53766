//! PayPal payment provider adapter.
//!
//! Implements the `PaymentProvider` port against the PayPal REST API.
//!
//! # Security
//!
//! PayPal webhooks carry no locally verifiable HMAC. The trust decision is
//! delegated to PayPal's own verification endpoint: the five transmission
//! headers, the configured webhook id and the parsed payload are POSTed to
//! `/v1/notifications/verify-webhook-signature` and the event is trusted only
//! on an explicit `verification_status == "SUCCESS"`. Missing headers or a
//! missing webhook id fail closed without making the network call; transport
//! errors are logged, reported as `false` once, and never retried.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::config::{PayPalSettings, ValidationError};
use crate::domain::events::ProviderEvent;
use crate::domain::{ProviderKind, WebhookHeaders};
use crate::ports::{
    Charge, ChargeRequest, ChargeStatus, CheckoutSession, CreateCheckoutRequest, PaymentError,
    PaymentProvider, PortalSession, SubscribeRequest, Subscription, SubscriptionStatus,
};

const LIVE_API_BASE_URL: &str = "https://api-m.paypal.com";
const SANDBOX_API_BASE_URL: &str = "https://api-m.sandbox.paypal.com";

/// Transmission headers PayPal sends with every webhook delivery. All five
/// must be present before remote verification is attempted.
const AUTH_ALGO_HEADER: &str = "paypal-auth-algo";
const CERT_URL_HEADER: &str = "paypal-cert-url";
const TRANSMISSION_ID_HEADER: &str = "paypal-transmission-id";
const TRANSMISSION_SIG_HEADER: &str = "paypal-transmission-sig";
const TRANSMISSION_TIME_HEADER: &str = "paypal-transmission-time";

/// PayPal API configuration.
#[derive(Clone)]
pub struct PayPalConfig {
    client_id: String,
    client_secret: SecretString,
    api_base_url: String,
}

impl PayPalConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            api_base_url: LIVE_API_BASE_URL.to_string(),
        }
    }

    /// Point at the PayPal sandbox environment.
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

/// PayPal payment provider adapter.
pub struct PayPalProvider {
    config: PayPalConfig,
    http_client: reqwest::Client,
}

impl PayPalProvider {
    pub fn new(config: PayPalConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Build from validated settings.
    ///
    /// # Errors
    ///
    /// Fails permanently when client id or client secret are missing.
    pub fn from_settings(settings: &PayPalSettings) -> Result<Self, ValidationError> {
        settings.validate()?;
        let mut config = PayPalConfig::new(settings.client_id.clone(), settings.client_secret.clone());
        if settings.sandbox {
            config = config.sandbox();
        }
        if let Some(url) = &settings.api_base_url {
            config = config.with_base_url(url.clone());
        }
        Ok(Self::new(config))
    }

    /// Fetch an OAuth2 access token via the client-credentials grant.
    async fn access_token(&self) -> Result<String, PaymentError> {
        let url = format!("{}/v1/oauth2/token", self.config.api_base_url);
        let response = self
            .http_client
            .post(&url)
            .basic_auth(
                &self.config.client_id,
                Some(self.config.client_secret.expose_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PaymentError::new(
                crate::ports::PaymentErrorCode::AuthenticationError,
                format!("PayPal token request failed: {}", error_text),
            ));
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::provider(format!("Failed to parse token response: {}", e)))?;
        Ok(token.access_token)
    }

    /// POST a JSON body; returns `None` for 204/empty responses.
    async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<Option<serde_json::Value>, PaymentError> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.config.api_base_url, path);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::not_found("PayPal resource"));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, error = %error_text, "PayPal API call failed");
            return Err(PaymentError::provider(format!(
                "PayPal API error ({}): {}",
                status, error_text
            )));
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let text = response
            .text()
            .await
            .map_err(|e| PaymentError::provider(format!("Failed to read PayPal response: {}", e)))?;
        if text.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| PaymentError::provider(format!("Failed to parse PayPal response: {}", e)))
    }
}

fn subscription_status_from_paypal(status: &str) -> SubscriptionStatus {
    match status {
        "ACTIVE" => SubscriptionStatus::Active,
        "SUSPENDED" => SubscriptionStatus::Paused,
        "CANCELLED" => SubscriptionStatus::Canceled,
        "APPROVAL_PENDING" | "APPROVED" => SubscriptionStatus::Incomplete,
        _ => SubscriptionStatus::Unknown,
    }
}

/// Render minor units as PayPal's decimal string ("1999" -> "19.99").
fn minor_units_to_decimal(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let amount = amount.abs();
    format!("{}{}.{:02}", sign, amount / 100, amount % 100)
}

#[async_trait]
impl PaymentProvider for PayPalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::PayPal
    }

    async fn charge(&self, request: ChargeRequest) -> Result<Charge, PaymentError> {
        let mut purchase_unit = json!({
            "amount": {
                "currency_code": request.currency.to_ascii_uppercase(),
                "value": minor_units_to_decimal(request.amount),
            }
        });
        if let Some(description) = &request.description {
            purchase_unit["description"] = json!(description);
        }

        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [purchase_unit],
        });

        let data = self
            .post_json("/v2/checkout/orders", body)
            .await?
            .ok_or_else(|| PaymentError::provider("Empty order response"))?;

        let id = data
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PaymentError::provider("Order response missing id"))?
            .to_string();
        let status = match data.get("status").and_then(|v| v.as_str()) {
            Some("COMPLETED") => ChargeStatus::Succeeded,
            Some("VOIDED") => ChargeStatus::Failed,
            _ => ChargeStatus::Pending,
        };

        Ok(Charge {
            id,
            status,
            amount: request.amount,
            currency: request.currency,
        })
    }

    async fn subscribe(&self, request: SubscribeRequest) -> Result<Subscription, PaymentError> {
        let mut body = json!({"plan_id": request.plan_id});
        if let Some(metadata) = &request.metadata {
            if let Some(custom_id) = metadata.get("custom_id").and_then(|v| v.as_str()) {
                body["custom_id"] = json!(custom_id);
            }
        }

        let data = self
            .post_json("/v1/billing/subscriptions", body)
            .await?
            .ok_or_else(|| PaymentError::provider("Empty subscription response"))?;

        let id = data
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PaymentError::provider("Subscription response missing id"))?
            .to_string();
        let status = data
            .get("status")
            .and_then(|v| v.as_str())
            .map(subscription_status_from_paypal)
            .unwrap_or(SubscriptionStatus::Unknown);

        Ok(Subscription {
            id,
            customer_id: Some(request.customer_id),
            status,
            current_period_end: None,
            cancel_at_period_end: false,
        })
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        _at_period_end: bool,
    ) -> Result<Subscription, PaymentError> {
        // PayPal cancellation is always immediate; there is no
        // cancel-at-period-end variant in its API.
        self.post_json(
            &format!("/v1/billing/subscriptions/{}/cancel", subscription_id),
            json!({"reason": "Cancelled by application"}),
        )
        .await?;

        Ok(Subscription {
            id: subscription_id.to_string(),
            customer_id: None,
            status: SubscriptionStatus::Canceled,
            current_period_end: None,
            cancel_at_period_end: false,
        })
    }

    async fn pause_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        self.post_json(
            &format!("/v1/billing/subscriptions/{}/suspend", subscription_id),
            json!({"reason": "Paused by application"}),
        )
        .await?;

        Ok(Subscription {
            id: subscription_id.to_string(),
            customer_id: None,
            status: SubscriptionStatus::Paused,
            current_period_end: None,
            cancel_at_period_end: false,
        })
    }

    async fn resume_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        self.post_json(
            &format!("/v1/billing/subscriptions/{}/activate", subscription_id),
            json!({"reason": "Resumed by application"}),
        )
        .await?;

        Ok(Subscription {
            id: subscription_id.to_string(),
            customer_id: None,
            status: SubscriptionStatus::Active,
            current_period_end: None,
            cancel_at_period_end: false,
        })
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let body = json!({
            "plan_id": request.plan_id,
            "application_context": {
                "return_url": request.success_url,
                "cancel_url": request.cancel_url,
            },
            "subscriber": request.email.as_ref().map(|e| json!({"email_address": e})),
        });

        let data = self
            .post_json("/v1/billing/subscriptions", body)
            .await?
            .ok_or_else(|| PaymentError::provider("Empty subscription response"))?;

        let id = data
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PaymentError::provider("Subscription response missing id"))?
            .to_string();

        // The hosted approval URL rides in the HATEOAS links array.
        let url = data
            .get("links")
            .and_then(|v| v.as_array())
            .and_then(|links| {
                links.iter().find(|l| {
                    l.get("rel").and_then(|r| r.as_str()) == Some("approve")
                })
            })
            .and_then(|l| l.get("href"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| PaymentError::provider("Subscription response missing approval link"))?
            .to_string();

        Ok(CheckoutSession {
            id,
            url,
            expires_at: None,
        })
    }

    async fn create_portal_session(
        &self,
        _customer_id: &str,
        _return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        Err(PaymentError::unsupported(
            "a hosted customer portal",
            ProviderKind::PayPal,
        ))
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        secret: Option<&str>,
        headers: &WebhookHeaders,
    ) -> bool {
        // The "secret" for PayPal is the provider-issued webhook id.
        let Some(webhook_id) = secret else {
            tracing::warn!("PayPal verification without a configured webhook id");
            return false;
        };

        let transmission_sig =
            signature.or_else(|| headers.get(TRANSMISSION_SIG_HEADER));
        let required = (
            headers.get(AUTH_ALGO_HEADER),
            headers.get(CERT_URL_HEADER),
            headers.get(TRANSMISSION_ID_HEADER),
            transmission_sig,
            headers.get(TRANSMISSION_TIME_HEADER),
        );
        let (Some(auth_algo), Some(cert_url), Some(transmission_id), Some(transmission_sig), Some(transmission_time)) =
            required
        else {
            tracing::warn!("PayPal webhook missing transmission headers");
            return false;
        };

        let Ok(webhook_event) = serde_json::from_slice::<serde_json::Value>(payload) else {
            tracing::warn!("PayPal webhook payload is not valid JSON");
            return false;
        };

        let body = json!({
            "auth_algo": auth_algo,
            "cert_url": cert_url,
            "transmission_id": transmission_id,
            "transmission_sig": transmission_sig,
            "transmission_time": transmission_time,
            "webhook_id": webhook_id,
            "webhook_event": webhook_event,
        });

        // One attempt only; transport failure is a verification failure.
        match self
            .post_json("/v1/notifications/verify-webhook-signature", body)
            .await
        {
            Ok(Some(response)) => {
                response.get("verification_status").and_then(|v| v.as_str()) == Some("SUCCESS")
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "PayPal remote verification call failed");
                false
            }
        }
    }

    fn normalize_webhook_event(&self, raw: &serde_json::Value) -> Option<ProviderEvent> {
        Some(ProviderEvent {
            event_type: raw.get("event_type")?.as_str()?.to_string(),
            id: raw.get("id").and_then(|v| v.as_str()).map(String::from),
            data: raw
                .get("resource")
                .cloned()
                .unwrap_or(serde_json::Value::Null),
            occurred_at: raw
                .get("create_time")
                .and_then(|v| v.as_str())
                .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
                .map(|dt| dt.timestamp()),
        })
    }
}
