//! Second-stage normalization: provider vocabularies to canonical events.
//!
//! Each adapter's `normalize_webhook_event` produces a [`ProviderEvent`] with
//! the provider's own `type` string; this module maps that vocabulary onto
//! the closed canonical set and lifts amount/currency/email/subscription/
//! payment identifiers out of the native `data` object where present.
//!
//! A native type with no canonical mapping yields `None` — the event is
//! dropped, no handlers fire, no error is raised.

use serde_json::Value;

use crate::domain::events::{EventType, NormalizedEvent, ProviderEvent};
use crate::domain::provider::ProviderKind;

/// Map a provider-native event onto the canonical taxonomy.
pub fn to_canonical(kind: ProviderKind, event: &ProviderEvent) -> Option<NormalizedEvent> {
    let event_type = match kind {
        ProviderKind::Stripe => map_stripe_type(&event.event_type),
        ProviderKind::Paddle => map_paddle_type(&event.event_type),
        ProviderKind::PayPal => map_paypal_type(&event.event_type),
        ProviderKind::LemonSqueezy => map_lemonsqueezy_type(&event.event_type),
        ProviderKind::Polar => map_polar_type(&event.event_type),
        ProviderKind::Mock => EventType::from_canonical_name(&event.event_type),
    }?;

    let mut normalized = NormalizedEvent::new(event_type, kind);
    match kind {
        ProviderKind::Stripe => extract_stripe(&mut normalized, event),
        ProviderKind::Paddle => extract_paddle(&mut normalized, event),
        ProviderKind::PayPal => extract_paypal(&mut normalized, event),
        ProviderKind::LemonSqueezy => extract_lemonsqueezy(&mut normalized, event),
        ProviderKind::Polar => extract_polar(&mut normalized, event),
        ProviderKind::Mock => extract_mock(&mut normalized, event),
    }
    Some(normalized)
}

// ════════════════════════════════════════════════════════════════════════════════
// Type vocabulary tables
// ════════════════════════════════════════════════════════════════════════════════

fn map_stripe_type(native: &str) -> Option<EventType> {
    match native {
        "payment_intent.succeeded" | "invoice.paid" | "invoice.payment_succeeded" => {
            Some(EventType::PaymentSuccess)
        }
        "payment_intent.payment_failed" | "invoice.payment_failed" => {
            Some(EventType::PaymentFailed)
        }
        "customer.subscription.created" => Some(EventType::SubscriptionCreated),
        "customer.subscription.updated" => Some(EventType::SubscriptionUpdated),
        "customer.subscription.deleted" => Some(EventType::SubscriptionDeleted),
        "customer.subscription.paused" => Some(EventType::SubscriptionPaused),
        "customer.subscription.resumed" => Some(EventType::SubscriptionResumed),
        _ => None,
    }
}

fn map_paddle_type(native: &str) -> Option<EventType> {
    match native {
        "transaction.completed" | "transaction.paid" => Some(EventType::PaymentSuccess),
        "transaction.payment_failed" => Some(EventType::PaymentFailed),
        "subscription.created" => Some(EventType::SubscriptionCreated),
        "subscription.updated" => Some(EventType::SubscriptionUpdated),
        "subscription.canceled" => Some(EventType::SubscriptionCancelled),
        "subscription.paused" => Some(EventType::SubscriptionPaused),
        "subscription.resumed" => Some(EventType::SubscriptionResumed),
        _ => None,
    }
}

fn map_paypal_type(native: &str) -> Option<EventType> {
    match native {
        "PAYMENT.CAPTURE.COMPLETED" | "PAYMENT.SALE.COMPLETED" => Some(EventType::PaymentSuccess),
        "PAYMENT.CAPTURE.DENIED" | "PAYMENT.SALE.DENIED" => Some(EventType::PaymentFailed),
        "BILLING.SUBSCRIPTION.CREATED" => Some(EventType::SubscriptionCreated),
        "BILLING.SUBSCRIPTION.UPDATED" => Some(EventType::SubscriptionUpdated),
        "BILLING.SUBSCRIPTION.CANCELLED" => Some(EventType::SubscriptionCancelled),
        "BILLING.SUBSCRIPTION.EXPIRED" => Some(EventType::SubscriptionDeleted),
        "BILLING.SUBSCRIPTION.SUSPENDED" => Some(EventType::SubscriptionPaused),
        "BILLING.SUBSCRIPTION.ACTIVATED" => Some(EventType::SubscriptionResumed),
        _ => None,
    }
}

fn map_lemonsqueezy_type(native: &str) -> Option<EventType> {
    match native {
        "order_created" | "subscription_payment_success" => Some(EventType::PaymentSuccess),
        "subscription_payment_failed" => Some(EventType::PaymentFailed),
        "subscription_created" => Some(EventType::SubscriptionCreated),
        "subscription_updated" => Some(EventType::SubscriptionUpdated),
        "subscription_cancelled" => Some(EventType::SubscriptionCancelled),
        "subscription_expired" => Some(EventType::SubscriptionDeleted),
        "subscription_paused" => Some(EventType::SubscriptionPaused),
        "subscription_unpaused" | "subscription_resumed" => Some(EventType::SubscriptionResumed),
        _ => None,
    }
}

fn map_polar_type(native: &str) -> Option<EventType> {
    match native {
        "order.paid" => Some(EventType::PaymentSuccess),
        "subscription.created" => Some(EventType::SubscriptionCreated),
        "subscription.updated" => Some(EventType::SubscriptionUpdated),
        "subscription.canceled" => Some(EventType::SubscriptionCancelled),
        "subscription.revoked" => Some(EventType::SubscriptionDeleted),
        _ => None,
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Field extraction
// ════════════════════════════════════════════════════════════════════════════════

fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(String::from)
}

fn i64_field(data: &Value, key: &str) -> Option<i64> {
    data.get(key).and_then(Value::as_i64)
}

fn extract_stripe(normalized: &mut NormalizedEvent, event: &ProviderEvent) {
    let data = &event.data;

    normalized.amount = i64_field(data, "amount_received")
        .or_else(|| i64_field(data, "amount"))
        .or_else(|| i64_field(data, "amount_paid"));
    normalized.currency = str_field(data, "currency");
    normalized.email = str_field(data, "receipt_email")
        .or_else(|| str_field(data, "customer_email"))
        .or_else(|| {
            data.get("customer_details")
                .and_then(|d| d.get("email"))
                .and_then(Value::as_str)
                .map(String::from)
        });

    if event.event_type.starts_with("customer.subscription.") {
        normalized.subscription_id = str_field(data, "id");
    } else {
        normalized.subscription_id = str_field(data, "subscription");
        normalized.payment_id = str_field(data, "id");
    }

    normalized.metadata = data
        .get("metadata")
        .filter(|m| m.as_object().is_some_and(|o| !o.is_empty()))
        .cloned();
}

fn extract_paddle(normalized: &mut NormalizedEvent, event: &ProviderEvent) {
    let data = &event.data;

    // Paddle totals arrive as decimal strings of minor units.
    normalized.amount = data
        .get("details")
        .and_then(|d| d.get("totals"))
        .and_then(|t| t.get("total").or_else(|| t.get("grand_total")))
        .and_then(|v| match v {
            Value::String(s) => s.parse().ok(),
            other => other.as_i64(),
        });
    normalized.currency = str_field(data, "currency_code");
    normalized.email = data
        .get("custom_data")
        .and_then(|c| c.get("email"))
        .and_then(Value::as_str)
        .map(String::from);

    if event.event_type.starts_with("subscription.") {
        normalized.subscription_id = str_field(data, "id");
    } else {
        normalized.subscription_id = str_field(data, "subscription_id");
        normalized.payment_id = str_field(data, "id");
    }

    normalized.metadata = data.get("custom_data").filter(|v| !v.is_null()).cloned();
}

fn extract_paypal(normalized: &mut NormalizedEvent, event: &ProviderEvent) {
    let data = &event.data;

    // Capture amounts use {value, currency_code}; legacy sale events {total, currency}.
    if let Some(amount) = data.get("amount") {
        normalized.amount = amount
            .get("value")
            .or_else(|| amount.get("total"))
            .and_then(Value::as_str)
            .and_then(parse_decimal_minor_units);
        normalized.currency = str_field(amount, "currency_code")
            .or_else(|| str_field(amount, "currency"))
            .map(|c| c.to_ascii_lowercase());
    }
    normalized.email = data
        .get("subscriber")
        .and_then(|s| s.get("email_address"))
        .or_else(|| data.get("payer").and_then(|p| p.get("email_address")))
        .and_then(Value::as_str)
        .map(String::from);

    if event.event_type.starts_with("BILLING.SUBSCRIPTION.") {
        normalized.subscription_id = str_field(data, "id");
    } else {
        normalized.subscription_id = str_field(data, "billing_agreement_id");
        normalized.payment_id = str_field(data, "id");
    }

    normalized.metadata = data.get("custom_id").filter(|v| !v.is_null()).cloned();
}

fn extract_lemonsqueezy(normalized: &mut NormalizedEvent, event: &ProviderEvent) {
    // Lemon Squeezy resources are JSON:API shaped: {type, id, attributes}.
    let data = &event.data;
    let attributes = data.get("attributes").cloned().unwrap_or(Value::Null);

    normalized.amount = i64_field(&attributes, "total");
    normalized.currency = str_field(&attributes, "currency").map(|c| c.to_ascii_lowercase());
    normalized.email = str_field(&attributes, "user_email");

    if event.event_type.starts_with("subscription_payment") {
        normalized.subscription_id = attributes
            .get("subscription_id")
            .map(json_id_to_string)
            .filter(|s| !s.is_empty());
        normalized.payment_id = str_field(data, "id");
    } else if event.event_type.starts_with("subscription") {
        normalized.subscription_id = str_field(data, "id");
    } else {
        normalized.payment_id = str_field(data, "id");
    }
}

fn extract_polar(normalized: &mut NormalizedEvent, event: &ProviderEvent) {
    let data = &event.data;

    normalized.amount = i64_field(data, "amount").or_else(|| i64_field(data, "net_amount"));
    normalized.currency = str_field(data, "currency");
    normalized.email = data
        .get("customer")
        .and_then(|c| c.get("email"))
        .or_else(|| data.get("user").and_then(|u| u.get("email")))
        .and_then(Value::as_str)
        .map(String::from);

    if event.event_type.starts_with("subscription.") {
        normalized.subscription_id = str_field(data, "id");
    } else {
        normalized.subscription_id = str_field(data, "subscription_id");
        normalized.payment_id = str_field(data, "id");
    }

    normalized.metadata = data
        .get("metadata")
        .filter(|m| m.as_object().is_some_and(|o| !o.is_empty()))
        .cloned();
}

fn extract_mock(normalized: &mut NormalizedEvent, event: &ProviderEvent) {
    let data = &event.data;
    normalized.amount = i64_field(data, "amount");
    normalized.currency = str_field(data, "currency");
    normalized.email = str_field(data, "email");
    normalized.subscription_id = str_field(data, "subscription_id");
    normalized.payment_id = str_field(data, "payment_id");
    normalized.metadata = data.get("metadata").filter(|v| !v.is_null()).cloned();
}

/// Parse a decimal money string ("12.34") into minor units (1234).
///
/// PayPal is the only provider that sends decimal-point amounts; everything
/// else already speaks minor units.
fn parse_decimal_minor_units(value: &str) -> Option<i64> {
    let value = value.trim();
    match value.split_once('.') {
        Some((whole, frac)) => {
            let whole: i64 = whole.parse().ok()?;
            let frac = if frac.len() >= 2 { &frac[..2] } else { frac };
            let mut cents: i64 = frac.parse().ok()?;
            if frac.len() == 1 {
                cents *= 10;
            }
            Some(whole * 100 + if whole < 0 { -cents } else { cents })
        }
        None => value.parse::<i64>().ok().map(|v| v * 100),
    }
}

/// Lemon Squeezy numeric identifiers arrive as either numbers or strings.
fn json_id_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn native(event_type: &str, data: Value) -> ProviderEvent {
        ProviderEvent {
            event_type: event_type.to_string(),
            id: Some("evt_test".to_string()),
            data,
            occurred_at: Some(1_704_067_200),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Vocabulary mapping
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn stripe_vocabulary_maps_to_canonical() {
        assert_eq!(
            map_stripe_type("payment_intent.succeeded"),
            Some(EventType::PaymentSuccess)
        );
        assert_eq!(
            map_stripe_type("invoice.payment_failed"),
            Some(EventType::PaymentFailed)
        );
        assert_eq!(
            map_stripe_type("customer.subscription.deleted"),
            Some(EventType::SubscriptionDeleted)
        );
        assert_eq!(
            map_stripe_type("customer.subscription.paused"),
            Some(EventType::SubscriptionPaused)
        );
    }

    #[test]
    fn paddle_vocabulary_maps_to_canonical() {
        assert_eq!(
            map_paddle_type("transaction.completed"),
            Some(EventType::PaymentSuccess)
        );
        assert_eq!(
            map_paddle_type("subscription.canceled"),
            Some(EventType::SubscriptionCancelled)
        );
        assert_eq!(
            map_paddle_type("subscription.resumed"),
            Some(EventType::SubscriptionResumed)
        );
    }

    #[test]
    fn paypal_vocabulary_maps_to_canonical() {
        assert_eq!(
            map_paypal_type("PAYMENT.CAPTURE.COMPLETED"),
            Some(EventType::PaymentSuccess)
        );
        assert_eq!(
            map_paypal_type("BILLING.SUBSCRIPTION.SUSPENDED"),
            Some(EventType::SubscriptionPaused)
        );
        assert_eq!(
            map_paypal_type("BILLING.SUBSCRIPTION.EXPIRED"),
            Some(EventType::SubscriptionDeleted)
        );
    }

    #[test]
    fn lemonsqueezy_vocabulary_maps_to_canonical() {
        assert_eq!(
            map_lemonsqueezy_type("order_created"),
            Some(EventType::PaymentSuccess)
        );
        assert_eq!(
            map_lemonsqueezy_type("subscription_expired"),
            Some(EventType::SubscriptionDeleted)
        );
        assert_eq!(
            map_lemonsqueezy_type("subscription_unpaused"),
            Some(EventType::SubscriptionResumed)
        );
    }

    #[test]
    fn polar_vocabulary_maps_to_canonical() {
        assert_eq!(map_polar_type("order.paid"), Some(EventType::PaymentSuccess));
        assert_eq!(
            map_polar_type("subscription.revoked"),
            Some(EventType::SubscriptionDeleted)
        );
    }

    #[test]
    fn unmapped_native_types_produce_no_event() {
        let event = native("charge.refunded", json!({}));
        assert!(to_canonical(ProviderKind::Stripe, &event).is_none());

        let event = native("adjustment.created", json!({}));
        assert!(to_canonical(ProviderKind::Paddle, &event).is_none());

        let event = native("CUSTOMER.DISPUTE.CREATED", json!({}));
        assert!(to_canonical(ProviderKind::PayPal, &event).is_none());
    }

    #[test]
    fn mock_passes_canonical_names_through() {
        let event = native("payment.success", json!({"amount": 1999}));
        let normalized = to_canonical(ProviderKind::Mock, &event).unwrap();
        assert_eq!(normalized.event_type, EventType::PaymentSuccess);
        assert_eq!(normalized.amount, Some(1999));
    }

    #[test]
    fn mock_rejects_non_canonical_names() {
        let event = native("something.else", json!({}));
        assert!(to_canonical(ProviderKind::Mock, &event).is_none());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Field extraction
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn stripe_invoice_extraction() {
        let event = native(
            "invoice.paid",
            json!({
                "id": "in_123",
                "amount_paid": 1999,
                "currency": "usd",
                "customer_email": "jo@example.com",
                "subscription": "sub_123",
                "metadata": {"plan": "pro"}
            }),
        );
        let normalized = to_canonical(ProviderKind::Stripe, &event).unwrap();

        assert_eq!(normalized.event_type, EventType::PaymentSuccess);
        assert_eq!(normalized.amount, Some(1999));
        assert_eq!(normalized.currency.as_deref(), Some("usd"));
        assert_eq!(normalized.email.as_deref(), Some("jo@example.com"));
        assert_eq!(normalized.subscription_id.as_deref(), Some("sub_123"));
        assert_eq!(normalized.payment_id.as_deref(), Some("in_123"));
        assert_eq!(normalized.metadata, Some(json!({"plan": "pro"})));
    }

    #[test]
    fn stripe_subscription_event_uses_object_id() {
        let event = native(
            "customer.subscription.updated",
            json!({"id": "sub_987", "status": "active", "metadata": {}}),
        );
        let normalized = to_canonical(ProviderKind::Stripe, &event).unwrap();
        assert_eq!(normalized.subscription_id.as_deref(), Some("sub_987"));
        assert!(normalized.payment_id.is_none());
        // Empty metadata objects are not propagated.
        assert!(normalized.metadata.is_none());
    }

    #[test]
    fn paddle_transaction_extraction_parses_string_totals() {
        let event = native(
            "transaction.completed",
            json!({
                "id": "txn_01",
                "subscription_id": "sub_01",
                "currency_code": "USD",
                "details": {"totals": {"total": "2499"}},
                "custom_data": {"email": "pat@example.com"}
            }),
        );
        let normalized = to_canonical(ProviderKind::Paddle, &event).unwrap();

        assert_eq!(normalized.amount, Some(2499));
        assert_eq!(normalized.currency.as_deref(), Some("USD"));
        assert_eq!(normalized.email.as_deref(), Some("pat@example.com"));
        assert_eq!(normalized.subscription_id.as_deref(), Some("sub_01"));
        assert_eq!(normalized.payment_id.as_deref(), Some("txn_01"));
    }

    #[test]
    fn paypal_capture_extraction_converts_decimal_amounts() {
        let event = native(
            "PAYMENT.CAPTURE.COMPLETED",
            json!({
                "id": "8XY12345",
                "amount": {"value": "19.99", "currency_code": "USD"},
                "payer": {"email_address": "sam@example.com"}
            }),
        );
        let normalized = to_canonical(ProviderKind::PayPal, &event).unwrap();

        assert_eq!(normalized.amount, Some(1999));
        assert_eq!(normalized.currency.as_deref(), Some("usd"));
        assert_eq!(normalized.email.as_deref(), Some("sam@example.com"));
        assert_eq!(normalized.payment_id.as_deref(), Some("8XY12345"));
    }

    #[test]
    fn paypal_subscription_extraction() {
        let event = native(
            "BILLING.SUBSCRIPTION.CANCELLED",
            json!({
                "id": "I-ABC123",
                "subscriber": {"email_address": "kim@example.com"}
            }),
        );
        let normalized = to_canonical(ProviderKind::PayPal, &event).unwrap();
        assert_eq!(normalized.event_type, EventType::SubscriptionCancelled);
        assert_eq!(normalized.subscription_id.as_deref(), Some("I-ABC123"));
        assert_eq!(normalized.email.as_deref(), Some("kim@example.com"));
    }

    #[test]
    fn lemonsqueezy_order_extraction() {
        let event = native(
            "order_created",
            json!({
                "type": "orders",
                "id": "112233",
                "attributes": {
                    "total": 999,
                    "currency": "USD",
                    "user_email": "lee@example.com"
                }
            }),
        );
        let normalized = to_canonical(ProviderKind::LemonSqueezy, &event).unwrap();

        assert_eq!(normalized.amount, Some(999));
        assert_eq!(normalized.currency.as_deref(), Some("usd"));
        assert_eq!(normalized.email.as_deref(), Some("lee@example.com"));
        assert_eq!(normalized.payment_id.as_deref(), Some("112233"));
    }

    #[test]
    fn lemonsqueezy_subscription_payment_links_numeric_subscription_id() {
        let event = native(
            "subscription_payment_success",
            json!({
                "type": "subscription-invoices",
                "id": "445566",
                "attributes": {"subscription_id": 778899, "total": 999, "currency": "USD"}
            }),
        );
        let normalized = to_canonical(ProviderKind::LemonSqueezy, &event).unwrap();
        assert_eq!(normalized.subscription_id.as_deref(), Some("778899"));
        assert_eq!(normalized.payment_id.as_deref(), Some("445566"));
    }

    #[test]
    fn polar_order_extraction() {
        let event = native(
            "order.paid",
            json!({
                "id": "ord_1",
                "amount": 4900,
                "currency": "usd",
                "subscription_id": "polar_sub_1",
                "customer": {"email": "rio@example.com"}
            }),
        );
        let normalized = to_canonical(ProviderKind::Polar, &event).unwrap();

        assert_eq!(normalized.amount, Some(4900));
        assert_eq!(normalized.subscription_id.as_deref(), Some("polar_sub_1"));
        assert_eq!(normalized.email.as_deref(), Some("rio@example.com"));
    }

    #[test]
    fn decimal_minor_units_parsing() {
        assert_eq!(parse_decimal_minor_units("19.99"), Some(1999));
        assert_eq!(parse_decimal_minor_units("19.9"), Some(1990));
        assert_eq!(parse_decimal_minor_units("19"), Some(1900));
        assert_eq!(parse_decimal_minor_units("0.05"), Some(5));
        assert_eq!(parse_decimal_minor_units("-2.50"), Some(-250));
        assert_eq!(parse_decimal_minor_units("abc"), None);
    }
}
