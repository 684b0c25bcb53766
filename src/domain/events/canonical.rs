//! Canonical event taxonomy.
//!
//! Every provider's webhook vocabulary is mapped onto this closed set of
//! event types. Handlers only ever observe [`NormalizedEvent`]; the
//! originating provider is carried along for logging and auditing but never
//! changes the shape of the event.

use serde::{Deserialize, Serialize};

use crate::domain::provider::ProviderKind;

/// The closed set of canonical event types.
///
/// Provider-native events with no mapping into this set are dropped before
/// dispatch; the set is never extended at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "payment.success")]
    PaymentSuccess,
    #[serde(rename = "payment.failed")]
    PaymentFailed,
    #[serde(rename = "subscription.created")]
    SubscriptionCreated,
    #[serde(rename = "subscription.cancelled")]
    SubscriptionCancelled,
    #[serde(rename = "subscription.updated")]
    SubscriptionUpdated,
    #[serde(rename = "subscription.deleted")]
    SubscriptionDeleted,
    #[serde(rename = "subscription.paused")]
    SubscriptionPaused,
    #[serde(rename = "subscription.resumed")]
    SubscriptionResumed,
}

impl EventType {
    /// Canonical wire name, e.g. `payment.success`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentSuccess => "payment.success",
            Self::PaymentFailed => "payment.failed",
            Self::SubscriptionCreated => "subscription.created",
            Self::SubscriptionCancelled => "subscription.cancelled",
            Self::SubscriptionUpdated => "subscription.updated",
            Self::SubscriptionDeleted => "subscription.deleted",
            Self::SubscriptionPaused => "subscription.paused",
            Self::SubscriptionResumed => "subscription.resumed",
        }
    }

    /// Parse a canonical wire name. Used by the Mock provider, whose events
    /// already speak the canonical vocabulary.
    pub fn from_canonical_name(name: &str) -> Option<Self> {
        match name {
            "payment.success" => Some(Self::PaymentSuccess),
            "payment.failed" => Some(Self::PaymentFailed),
            "subscription.created" => Some(Self::SubscriptionCreated),
            "subscription.cancelled" => Some(Self::SubscriptionCancelled),
            "subscription.updated" => Some(Self::SubscriptionUpdated),
            "subscription.deleted" => Some(Self::SubscriptionDeleted),
            "subscription.paused" => Some(Self::SubscriptionPaused),
            "subscription.resumed" => Some(Self::SubscriptionResumed),
            _ => None,
        }
    }

    /// All canonical types, in a stable order.
    pub fn all() -> [EventType; 8] {
        [
            Self::PaymentSuccess,
            Self::PaymentFailed,
            Self::SubscriptionCreated,
            Self::SubscriptionCancelled,
            Self::SubscriptionUpdated,
            Self::SubscriptionDeleted,
            Self::SubscriptionPaused,
            Self::SubscriptionResumed,
        ]
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-native event shape, extracted by each adapter's
/// `normalize_webhook_event` before canonical mapping.
///
/// Field names in the source envelopes vary per provider (Stripe
/// `type`/`created`, Paddle `event_type`/`occurred_at`, Lemon Squeezy
/// `meta.event_name`); this struct is the common denominator the second
/// normalization stage consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEvent {
    /// Provider-native event type string, e.g. `customer.subscription.updated`.
    pub event_type: String,
    /// Provider event identifier, when the envelope carries one.
    pub id: Option<String>,
    /// The object the event describes, as delivered.
    pub data: serde_json::Value,
    /// Unix timestamp of the event, when the envelope carries one.
    pub occurred_at: Option<i64>,
}

/// The canonical event all handlers observe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub provider: ProviderKind,
    /// Amount in the currency's minor units, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl NormalizedEvent {
    /// A bare event of the given type; extraction fills the optional fields.
    pub fn new(event_type: EventType, provider: ProviderKind) -> Self {
        Self {
            event_type,
            provider,
            amount: None,
            currency: None,
            email: None,
            subscription_id: None,
            payment_id: None,
            metadata: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for event_type in EventType::all() {
            assert_eq!(
                EventType::from_canonical_name(event_type.as_str()),
                Some(event_type)
            );
        }
    }

    #[test]
    fn unknown_wire_name_is_rejected() {
        assert_eq!(EventType::from_canonical_name("payment.refunded"), None);
        assert_eq!(EventType::from_canonical_name(""), None);
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&EventType::PaymentSuccess).unwrap();
        assert_eq!(json, "\"payment.success\"");

        let parsed: EventType = serde_json::from_str("\"subscription.paused\"").unwrap();
        assert_eq!(parsed, EventType::SubscriptionPaused);
    }

    #[test]
    fn normalized_event_serializes_sparse_fields() {
        let event = NormalizedEvent::new(EventType::PaymentSuccess, ProviderKind::Stripe);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "payment.success");
        assert_eq!(value["provider"], "stripe");
        assert!(value.get("amount").is_none());
        assert!(value.get("email").is_none());
    }
}
