//! Payment configuration
//!
//! Selects the active provider by name and carries per-provider credentials.
//! Credentials are validated when the provider variant is constructed, not at
//! call time; a missing required credential is a fatal configuration error.

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::ProviderKind;

/// Payment configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentConfig {
    /// Active provider name. Case-insensitive, synonyms accepted
    /// (`lemon-squeezy`, `polar.sh`). Empty or unrecognized selects Mock.
    #[serde(default)]
    pub provider: String,

    /// Fail closed when a webhook arrives without a configured secret or a
    /// signature header. Off by default: local/mock setups skip verification
    /// and treat such events as authenticated.
    #[serde(default)]
    pub require_signature: bool,

    /// Stripe credentials
    #[serde(default)]
    pub stripe: StripeSettings,

    /// Paddle credentials
    #[serde(default)]
    pub paddle: PaddleSettings,

    /// PayPal credentials
    #[serde(default)]
    pub paypal: PayPalSettings,

    /// Lemon Squeezy credentials
    #[serde(default)]
    pub lemonsqueezy: LemonSqueezySettings,

    /// Polar credentials
    #[serde(default)]
    pub polar: PolarSettings,
}

impl PaymentConfig {
    /// The configured provider kind. Unknown or absent names resolve to Mock
    /// so a typo never selects a real processor by accident.
    pub fn active_kind(&self) -> ProviderKind {
        ProviderKind::from_name(&self.provider).unwrap_or(ProviderKind::Mock)
    }

    /// The webhook shared secret for a provider, when configured.
    ///
    /// For PayPal this is the provider-issued webhook identifier; there is no
    /// local shared secret in its scheme.
    pub fn webhook_secret_for(&self, kind: ProviderKind) -> Option<String> {
        let secret = match kind {
            ProviderKind::Stripe => &self.stripe.webhook_secret,
            ProviderKind::Paddle => &self.paddle.webhook_secret,
            ProviderKind::PayPal => &self.paypal.webhook_id,
            ProviderKind::LemonSqueezy => &self.lemonsqueezy.webhook_secret,
            ProviderKind::Polar => &self.polar.webhook_secret,
            ProviderKind::Mock => return None,
        };
        if secret.is_empty() {
            None
        } else {
            Some(secret.clone())
        }
    }

    /// Validate the active provider's credential section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_for(self.active_kind())
    }

    /// Validate the credential section for one provider kind.
    pub fn validate_for(&self, kind: ProviderKind) -> Result<(), ValidationError> {
        match kind {
            ProviderKind::Stripe => self.stripe.validate(),
            ProviderKind::Paddle => self.paddle.validate(),
            ProviderKind::PayPal => self.paypal.validate(),
            ProviderKind::LemonSqueezy => self.lemonsqueezy.validate(),
            ProviderKind::Polar => self.polar.validate(),
            ProviderKind::Mock => Ok(()),
        }
    }
}

/// Stripe credentials
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeSettings {
    /// Secret API key (sk_live_... or sk_test_...)
    #[serde(default)]
    pub api_key: String,

    /// Webhook signing secret (whsec_...)
    #[serde(default)]
    pub webhook_secret: String,

    /// Base URL override (testing)
    pub api_base_url: Option<String>,
}

impl StripeSettings {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.api_key.starts_with("sk_test_")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        // Verify key prefixes for safety
        if !self.api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.webhook_secret.is_empty() && !self.webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        Ok(())
    }
}

/// Paddle credentials
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaddleSettings {
    /// API key
    #[serde(default)]
    pub api_key: String,

    /// Webhook signing secret
    #[serde(default)]
    pub webhook_secret: String,

    /// Base URL override (testing)
    pub api_base_url: Option<String>,

    /// Use the sandbox environment
    #[serde(default)]
    pub sandbox: bool,
}

impl PaddleSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_key.is_empty() {
            return Err(ValidationError::MissingRequired("PADDLE_API_KEY"));
        }
        Ok(())
    }
}

/// PayPal credentials
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayPalSettings {
    /// OAuth client ID
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret
    #[serde(default)]
    pub client_secret: String,

    /// Provider-issued webhook identifier used for remote verification
    #[serde(default)]
    pub webhook_id: String,

    /// Base URL override (testing)
    pub api_base_url: Option<String>,

    /// Use the sandbox environment
    #[serde(default)]
    pub sandbox: bool,
}

impl PayPalSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.client_id.is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAL_CLIENT_ID"));
        }
        if self.client_secret.is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAL_CLIENT_SECRET"));
        }
        Ok(())
    }
}

/// Lemon Squeezy credentials
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LemonSqueezySettings {
    /// API key
    #[serde(default)]
    pub api_key: String,

    /// Webhook signing secret
    #[serde(default)]
    pub webhook_secret: String,

    /// Store identifier for checkouts
    pub store_id: Option<String>,

    /// Base URL override (testing)
    pub api_base_url: Option<String>,
}

impl LemonSqueezySettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_key.is_empty() {
            return Err(ValidationError::MissingRequired("LEMONSQUEEZY_API_KEY"));
        }
        Ok(())
    }
}

/// Polar credentials
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolarSettings {
    /// Organization access token
    #[serde(default)]
    pub access_token: String,

    /// Webhook signing secret (raw or base64, Standard-Webhooks style)
    #[serde(default)]
    pub webhook_secret: String,

    /// Base URL override (testing)
    pub api_base_url: Option<String>,

    /// Use the sandbox environment
    #[serde(default)]
    pub sandbox: bool,
}

impl PolarSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.access_token.is_empty() {
            return Err(ValidationError::MissingRequired("POLAR_ACCESS_TOKEN"));
        }
        Ok(())
    }
}
