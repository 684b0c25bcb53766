//! Provider kinds and name resolution.

use serde::{Deserialize, Serialize};

/// Supported payment processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Stripe
    Stripe,
    /// Paddle Billing
    Paddle,
    /// PayPal
    PayPal,
    /// Lemon Squeezy
    LemonSqueezy,
    /// Polar
    Polar,
    /// In-memory mock for local development and tests
    Mock,
}

impl ProviderKind {
    /// Resolve a configured provider name to a kind.
    ///
    /// Matching is case-insensitive and accepts the common synonyms
    /// (`lemon-squeezy`, `lemon_squeezy`, `polar.sh`, `pay-pal`). Unknown or
    /// empty names resolve to `None`; callers fall back to [`ProviderKind::Mock`]
    /// so a typo never selects a real processor by accident.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "stripe" => Some(Self::Stripe),
            "paddle" => Some(Self::Paddle),
            "paypal" | "pay-pal" | "pay_pal" => Some(Self::PayPal),
            "lemonsqueezy" | "lemon-squeezy" | "lemon_squeezy" | "lemon" => {
                Some(Self::LemonSqueezy)
            }
            "polar" | "polar.sh" | "polarsh" => Some(Self::Polar),
            "mock" | "test" => Some(Self::Mock),
            _ => None,
        }
    }

    /// The header carrying this provider's webhook signature.
    ///
    /// PayPal spreads verification material over several headers; the
    /// transmission signature is the one treated as "the signature" by the
    /// generic pipeline.
    pub fn signature_header(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe-signature",
            Self::Paddle => "paddle-signature",
            Self::PayPal => "paypal-transmission-sig",
            Self::LemonSqueezy => "x-signature",
            Self::Polar => "x-polar-signature",
            Self::Mock => "x-mock-signature",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stripe => write!(f, "stripe"),
            Self::Paddle => write!(f, "paddle"),
            Self::PayPal => write!(f, "paypal"),
            Self::LemonSqueezy => write!(f, "lemonsqueezy"),
            Self::Polar => write!(f, "polar"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_resolves_plain_names() {
        assert_eq!(ProviderKind::from_name("stripe"), Some(ProviderKind::Stripe));
        assert_eq!(ProviderKind::from_name("paddle"), Some(ProviderKind::Paddle));
        assert_eq!(ProviderKind::from_name("paypal"), Some(ProviderKind::PayPal));
        assert_eq!(ProviderKind::from_name("polar"), Some(ProviderKind::Polar));
        assert_eq!(ProviderKind::from_name("mock"), Some(ProviderKind::Mock));
    }

    #[test]
    fn from_name_is_case_insensitive() {
        assert_eq!(ProviderKind::from_name("Stripe"), Some(ProviderKind::Stripe));
        assert_eq!(ProviderKind::from_name("PADDLE"), Some(ProviderKind::Paddle));
        assert_eq!(
            ProviderKind::from_name("LemonSqueezy"),
            Some(ProviderKind::LemonSqueezy)
        );
    }

    #[test]
    fn from_name_accepts_synonyms() {
        assert_eq!(
            ProviderKind::from_name("lemon-squeezy"),
            Some(ProviderKind::LemonSqueezy)
        );
        assert_eq!(
            ProviderKind::from_name("lemon_squeezy"),
            Some(ProviderKind::LemonSqueezy)
        );
        assert_eq!(ProviderKind::from_name("polar.sh"), Some(ProviderKind::Polar));
        assert_eq!(ProviderKind::from_name("pay-pal"), Some(ProviderKind::PayPal));
    }

    #[test]
    fn from_name_rejects_unknown() {
        assert_eq!(ProviderKind::from_name("square"), None);
        assert_eq!(ProviderKind::from_name(""), None);
        assert_eq!(ProviderKind::from_name("   "), None);
    }

    #[test]
    fn from_name_trims_whitespace() {
        assert_eq!(
            ProviderKind::from_name("  stripe  "),
            Some(ProviderKind::Stripe)
        );
    }

    #[test]
    fn display_round_trips_through_from_name() {
        for kind in [
            ProviderKind::Stripe,
            ProviderKind::Paddle,
            ProviderKind::PayPal,
            ProviderKind::LemonSqueezy,
            ProviderKind::Polar,
            ProviderKind::Mock,
        ] {
            assert_eq!(ProviderKind::from_name(&kind.to_string()), Some(kind));
        }
    }
}
