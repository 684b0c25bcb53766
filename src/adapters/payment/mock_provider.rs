//! Mock payment provider for local development and testing.
//!
//! Stores all state in memory and can be configured to fail the next
//! operation for error-path testing. `verify_webhook` always returns `true`;
//! this variant never makes a real trust decision and must not be selected
//! in production.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::events::ProviderEvent;
use crate::domain::{ProviderKind, WebhookHeaders};
use crate::ports::{
    Charge, ChargeRequest, ChargeStatus, CheckoutSession, CreateCheckoutRequest, PaymentError,
    PaymentProvider, PortalSession, SubscribeRequest, Subscription, SubscriptionStatus,
};

/// In-memory mock provider.
pub struct MockProvider {
    charges: Arc<RwLock<HashMap<String, Charge>>>,
    subscriptions: Arc<RwLock<HashMap<String, Subscription>>>,
    fail_next: Arc<RwLock<bool>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            charges: Arc::new(RwLock::new(HashMap::new())),
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            fail_next: Arc::new(RwLock::new(false)),
        }
    }

    /// Configure the next operation to fail.
    pub async fn set_fail_next(&self, fail: bool) {
        *self.fail_next.write().await = fail;
    }

    /// Number of charges recorded.
    pub async fn charge_count(&self) -> usize {
        self.charges.read().await.len()
    }

    /// Number of subscriptions recorded.
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// Clear all stored state.
    pub async fn clear(&self) {
        self.charges.write().await.clear();
        self.subscriptions.write().await.clear();
    }

    async fn check_fail(&self) -> Result<(), PaymentError> {
        let mut fail = self.fail_next.write().await;
        if *fail {
            *fail = false;
            return Err(PaymentError::provider("Simulated mock failure"));
        }
        Ok(())
    }

    async fn update_subscription_status(
        &self,
        subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<Subscription, PaymentError> {
        self.check_fail().await?;
        let mut subscriptions = self.subscriptions.write().await;
        let subscription = subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| PaymentError::not_found("Subscription"))?;
        subscription.status = status;
        Ok(subscription.clone())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    async fn charge(&self, request: ChargeRequest) -> Result<Charge, PaymentError> {
        self.check_fail().await?;
        let charge = Charge {
            id: format!("mock_ch_{}", Uuid::new_v4().simple()),
            status: ChargeStatus::Succeeded,
            amount: request.amount,
            currency: request.currency,
        };
        self.charges
            .write()
            .await
            .insert(charge.id.clone(), charge.clone());
        Ok(charge)
    }

    async fn subscribe(&self, request: SubscribeRequest) -> Result<Subscription, PaymentError> {
        self.check_fail().await?;
        let subscription = Subscription {
            id: format!("mock_sub_{}", Uuid::new_v4().simple()),
            customer_id: Some(request.customer_id),
            status: SubscriptionStatus::Active,
            current_period_end: Some(chrono::Utc::now().timestamp() + 30 * 24 * 60 * 60),
            cancel_at_period_end: false,
        };
        self.subscriptions
            .write()
            .await
            .insert(subscription.id.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<Subscription, PaymentError> {
        self.check_fail().await?;
        let mut subscriptions = self.subscriptions.write().await;
        let subscription = subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| PaymentError::not_found("Subscription"))?;
        if at_period_end {
            subscription.cancel_at_period_end = true;
        } else {
            subscription.status = SubscriptionStatus::Canceled;
        }
        Ok(subscription.clone())
    }

    async fn pause_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        self.update_subscription_status(subscription_id, SubscriptionStatus::Paused)
            .await
    }

    async fn resume_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        self.update_subscription_status(subscription_id, SubscriptionStatus::Active)
            .await
    }

    async fn create_checkout_session(
        &self,
        _request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.check_fail().await?;
        let id = format!("mock_cs_{}", Uuid::new_v4().simple());
        Ok(CheckoutSession {
            url: format!("https://checkout.mock.local/{}", id),
            id,
            expires_at: Some(chrono::Utc::now().timestamp() + 24 * 60 * 60),
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        _return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        self.check_fail().await?;
        Ok(PortalSession {
            id: format!("mock_ps_{}", Uuid::new_v4().simple()),
            url: format!("https://portal.mock.local/{}", customer_id),
        })
    }

    async fn verify_webhook(
        &self,
        _payload: &[u8],
        _signature: Option<&str>,
        _secret: Option<&str>,
        _headers: &WebhookHeaders,
    ) -> bool {
        // Development convenience, never a trust decision.
        true
    }

    fn normalize_webhook_event(&self, raw: &serde_json::Value) -> Option<ProviderEvent> {
        Some(ProviderEvent {
            event_type: raw.get("type")?.as_str()?.to_string(),
            id: raw.get("id").and_then(|v| v.as_str()).map(String::from),
            data: raw.get("data").cloned().unwrap_or(serde_json::Value::Null),
            occurred_at: raw.get("timestamp").and_then(|v| v.as_i64()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn charge_request() -> ChargeRequest {
        ChargeRequest {
            amount: 1999,
            currency: "usd".to_string(),
            customer_id: None,
            email: None,
            description: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn charge_records_and_succeeds() {
        let provider = MockProvider::new();
        let charge = provider.charge(charge_request()).await.unwrap();

        assert_eq!(charge.status, ChargeStatus::Succeeded);
        assert_eq!(charge.amount, 1999);
        assert_eq!(provider.charge_count().await, 1);
    }

    #[tokio::test]
    async fn subscription_lifecycle() {
        let provider = MockProvider::new();
        let subscription = provider
            .subscribe(SubscribeRequest {
                customer_id: "cus_1".to_string(),
                plan_id: "plan_pro".to_string(),
                metadata: None,
            })
            .await
            .unwrap();
        assert_eq!(subscription.status, SubscriptionStatus::Active);

        let paused = provider.pause_subscription(&subscription.id).await.unwrap();
        assert_eq!(paused.status, SubscriptionStatus::Paused);

        let resumed = provider.resume_subscription(&subscription.id).await.unwrap();
        assert_eq!(resumed.status, SubscriptionStatus::Active);

        let cancelled = provider
            .cancel_subscription(&subscription.id, false)
            .await
            .unwrap();
        assert_eq!(cancelled.status, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn cancel_at_period_end_keeps_subscription_active() {
        let provider = MockProvider::new();
        let subscription = provider
            .subscribe(SubscribeRequest {
                customer_id: "cus_1".to_string(),
                plan_id: "plan_pro".to_string(),
                metadata: None,
            })
            .await
            .unwrap();

        let updated = provider
            .cancel_subscription(&subscription.id, true)
            .await
            .unwrap();
        assert_eq!(updated.status, SubscriptionStatus::Active);
        assert!(updated.cancel_at_period_end);
    }

    #[tokio::test]
    async fn fail_next_fails_one_operation() {
        let provider = MockProvider::new();
        provider.set_fail_next(true).await;

        assert!(provider.charge(charge_request()).await.is_err());
        assert!(provider.charge(charge_request()).await.is_ok());
    }

    #[tokio::test]
    async fn verify_webhook_always_trusts() {
        let provider = MockProvider::new();
        assert!(
            provider
                .verify_webhook(b"anything", None, None, &WebhookHeaders::new())
                .await
        );
    }

    #[test]
    fn normalize_passes_canonical_vocabulary_through() {
        let provider = MockProvider::new();
        let raw = serde_json::json!({
            "id": "mock_evt_1",
            "type": "payment.success",
            "timestamp": 1704067200,
            "data": {"amount": 1999, "currency": "usd"}
        });

        let event = provider.normalize_webhook_event(&raw).unwrap();
        assert_eq!(event.event_type, "payment.success");
        assert_eq!(event.occurred_at, Some(1704067200));
    }

    #[tokio::test]
    async fn unknown_subscription_reports_not_found() {
        let provider = MockProvider::new();
        let result = provider.pause_subscription("missing").await;
        assert!(result.is_err());
    }
}
