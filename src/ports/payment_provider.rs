//! Payment provider port - the capability contract every variant implements.
//!
//! Defines the contract for payment processor integrations (Stripe, Paddle,
//! PayPal, Lemon Squeezy, Polar, Mock). Implementations handle payment and
//! subscription operations plus webhook verification and first-pass event
//! normalization.
//!
//! # Design
//!
//! - **Processor agnostic**: one call site works against any variant
//! - **Webhook trust boundary**: `verify_webhook` returns a bare boolean and
//!   must never fail; every internal error collapses to `false`
//! - **Uniform degradation**: operations a processor genuinely lacks return
//!   `PaymentErrorCode::Unsupported` rather than panicking or faking success

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::events::ProviderEvent;
use crate::domain::{ProviderKind, WebhookHeaders};

/// Port for payment provider integrations.
///
/// All operations must be invocable uniformly regardless of variant; webhook
/// verification is asynchronous because one variant (PayPal) requires a
/// remote round trip for its trust decision.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Which processor this variant talks to.
    fn kind(&self) -> ProviderKind;

    /// Create a one-time charge.
    async fn charge(&self, request: ChargeRequest) -> Result<Charge, PaymentError>;

    /// Create a subscription for an existing customer.
    async fn subscribe(&self, request: SubscribeRequest) -> Result<Subscription, PaymentError>;

    /// Cancel a subscription.
    ///
    /// If `at_period_end` is true the subscription stays active until the
    /// current billing period ends.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<Subscription, PaymentError>;

    /// Pause collection on a subscription.
    async fn pause_subscription(&self, subscription_id: &str)
        -> Result<Subscription, PaymentError>;

    /// Resume a paused subscription.
    async fn resume_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError>;

    /// Create a hosted checkout session.
    ///
    /// Returns a URL for the customer to complete payment.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Create a customer portal session for self-serve subscription management.
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError>;

    /// Authenticate a raw webhook payload against this provider's scheme.
    ///
    /// Must not fail: missing material, malformed signatures, stale
    /// timestamps, transport errors during remote verification and
    /// cryptographic mismatches all return `false`. There is no
    /// partial-trust state.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        secret: Option<&str>,
        headers: &WebhookHeaders,
    ) -> bool;

    /// First-pass extraction of this provider's webhook envelope.
    ///
    /// Pulls the native type/id/data/timestamp out of the raw JSON; the
    /// canonical mapping happens afterwards in the domain layer. Malformed
    /// envelopes yield `None`.
    fn normalize_webhook_event(&self, raw: &serde_json::Value) -> Option<ProviderEvent>;
}

/// Request to create a one-time charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// Amount in the currency's minor units.
    pub amount: i64,

    /// ISO currency code (lowercase).
    pub currency: String,

    /// Provider customer ID, when charging an existing customer.
    pub customer_id: Option<String>,

    /// Customer email for receipts.
    pub email: Option<String>,

    /// Free-form description shown on statements/receipts.
    pub description: Option<String>,

    /// Custom metadata attached to the charge.
    pub metadata: Option<serde_json::Value>,
}

/// A created charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    /// Provider's charge/payment identifier.
    pub id: String,

    /// Charge status.
    pub status: ChargeStatus,

    /// Amount in minor units.
    pub amount: i64,

    /// ISO currency code.
    pub currency: String,
}

/// Charge status from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    /// Funds captured.
    Succeeded,
    /// Awaiting confirmation or asynchronous capture.
    Pending,
    /// Charge failed.
    Failed,
}

/// Request to create a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Provider customer ID.
    pub customer_id: String,

    /// Provider price/plan identifier to subscribe to.
    pub plan_id: String,

    /// Custom metadata attached to the subscription.
    pub metadata: Option<serde_json::Value>,
}

/// Subscription in the payment system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Provider's subscription ID.
    pub id: String,

    /// Provider's customer ID.
    pub customer_id: Option<String>,

    /// Current subscription status.
    pub status: SubscriptionStatus,

    /// Current billing period end (Unix timestamp), when known.
    pub current_period_end: Option<i64>,

    /// Whether the subscription cancels at period end.
    pub cancel_at_period_end: bool,
}

/// Subscription status from the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Active and current.
    Active,
    /// Payment past due, grace period active.
    PastDue,
    /// Canceled (may remain active until period end).
    Canceled,
    /// In trial period.
    Trialing,
    /// Collection paused.
    Paused,
    /// Initial payment incomplete.
    Incomplete,
    /// Unrecognized status from the provider.
    Unknown,
}

impl SubscriptionStatus {
    /// Whether this status grants access to the paid product.
    pub fn has_access(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing | Self::PastDue)
    }

    /// Map a provider status string onto the shared set.
    pub fn from_provider_str(status: &str) -> Self {
        match status {
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" | "cancelled" => Self::Canceled,
            "trialing" | "on_trial" => Self::Trialing,
            "paused" => Self::Paused,
            "incomplete" => Self::Incomplete,
            _ => Self::Unknown,
        }
    }
}

/// Request to create a hosted checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Provider price/plan/product identifier being purchased.
    pub plan_id: String,

    /// Customer email for pre-fill, when known.
    pub email: Option<String>,

    /// URL to redirect to after successful checkout.
    pub success_url: String,

    /// URL to redirect to if checkout is abandoned.
    pub cancel_url: String,

    /// Custom metadata propagated to resulting webhook events.
    pub metadata: Option<serde_json::Value>,
}

/// Hosted checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session identifier.
    pub id: String,

    /// URL for the customer to complete checkout.
    pub url: String,

    /// When the session expires (Unix timestamp), when the provider says.
    pub expires_at: Option<i64>,
}

/// Customer portal session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalSession {
    /// Provider's session identifier.
    pub id: String,

    /// URL for the customer to manage their subscription.
    pub url: String,
}

/// Errors from payment provider operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's own error code, when available.
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    /// Create a new payment error.
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    /// Attach the provider's error code.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Network connectivity failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    /// Resource not found at the provider.
    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    /// Provider rejected the API call.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }

    /// The processor has no equivalent of the requested operation.
    pub fn unsupported(operation: &str, provider: ProviderKind) -> Self {
        Self::new(
            PaymentErrorCode::Unsupported,
            format!("{} does not support {}", provider, operation),
        )
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// API authentication failed.
    AuthenticationError,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Provider API error.
    ProviderError,

    /// Operation has no equivalent at this processor.
    Unsupported,

    /// Unknown error.
    Unknown,
}

impl PaymentErrorCode {
    /// Whether this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::RateLimitExceeded)
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NetworkError => "network_error",
            Self::AuthenticationError => "authentication_error",
            Self::NotFound => "not_found",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::ProviderError => "provider_error",
            Self::Unsupported => "unsupported",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Trait object safety test
    #[test]
    fn payment_provider_is_object_safe() {
        fn _accepts_dyn(_provider: &dyn PaymentProvider) {}
    }

    #[test]
    fn subscription_status_access_checks() {
        assert!(SubscriptionStatus::Active.has_access());
        assert!(SubscriptionStatus::Trialing.has_access());
        assert!(SubscriptionStatus::PastDue.has_access());

        assert!(!SubscriptionStatus::Canceled.has_access());
        assert!(!SubscriptionStatus::Paused.has_access());
        assert!(!SubscriptionStatus::Incomplete.has_access());
    }

    #[test]
    fn subscription_status_from_provider_strings() {
        assert_eq!(
            SubscriptionStatus::from_provider_str("active"),
            SubscriptionStatus::Active
        );
        assert_eq!(
            SubscriptionStatus::from_provider_str("cancelled"),
            SubscriptionStatus::Canceled
        );
        assert_eq!(
            SubscriptionStatus::from_provider_str("on_trial"),
            SubscriptionStatus::Trialing
        );
        assert_eq!(
            SubscriptionStatus::from_provider_str("something_new"),
            SubscriptionStatus::Unknown
        );
    }

    #[test]
    fn payment_error_retryable() {
        assert!(PaymentErrorCode::NetworkError.is_retryable());
        assert!(PaymentErrorCode::RateLimitExceeded.is_retryable());

        assert!(!PaymentErrorCode::NotFound.is_retryable());
        assert!(!PaymentErrorCode::Unsupported.is_retryable());
    }

    #[test]
    fn payment_error_display() {
        let err = PaymentError::unsupported("direct charges", ProviderKind::LemonSqueezy);
        assert!(err.to_string().contains("unsupported"));
        assert!(err.to_string().contains("lemonsqueezy"));
    }
}
