//! Provider resolver - determines which processor issued an inbound webhook.
//!
//! Precedence: an explicit configuration override always wins; otherwise the
//! presence of provider-specific signature headers decides, in a fixed
//! priority order; with no signal at all the webhook is attributed to Mock.

use crate::domain::{ProviderKind, WebhookHeaders};

/// Header inspection order. Lemon Squeezy's generic `x-signature` is checked
/// after the provider-branded headers so it cannot shadow them.
const DETECTION_ORDER: &[(&str, ProviderKind)] = &[
    ("stripe-signature", ProviderKind::Stripe),
    ("paddle-signature", ProviderKind::Paddle),
    ("paypal-transmission-sig", ProviderKind::PayPal),
    ("paypal-transmission-id", ProviderKind::PayPal),
    ("x-signature", ProviderKind::LemonSqueezy),
    ("x-polar-signature", ProviderKind::Polar),
];

/// Resolve the originating provider for an inbound webhook.
///
/// `override_name` is the configured provider name; when it resolves to a
/// known kind it wins unconditionally (this decides which verification
/// scheme runs, so the precedence is load-bearing). An unrecognizable
/// override falls through to header detection.
pub fn resolve_provider(override_name: Option<&str>, headers: &WebhookHeaders) -> ProviderKind {
    if let Some(kind) = override_name.and_then(ProviderKind::from_name) {
        return kind;
    }
    detect_from_headers(headers)
}

/// Detect the provider from header presence alone.
pub fn detect_from_headers(headers: &WebhookHeaders) -> ProviderKind {
    for (header, kind) in DETECTION_ORDER {
        if headers.contains(header) {
            return *kind;
        }
    }
    ProviderKind::Mock
}
