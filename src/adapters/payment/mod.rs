//! Payment provider adapters.
//!
//! One adapter per processor, all implementing the `PaymentProvider` port:
//! - Stripe, Paddle, PayPal, Lemon Squeezy, Polar
//! - Mock (in-memory, local development and tests)
//!
//! Plus the registry (configuration -> cached variant), the resolver
//! (inbound webhook -> originating provider) and shared HMAC signature
//! helpers.
//!
//! # Security
//!
//! - Local schemes use HMAC-SHA256 with constant-time digest comparison
//! - PayPal verification is delegated to PayPal's own endpoint and fails
//!   closed when headers or the webhook id are missing
//! - All credentials are held in `secrecy::SecretString`

mod lemonsqueezy_provider;
mod mock_provider;
mod paddle_provider;
mod paypal_provider;
mod polar_provider;
mod registry;
mod resolver;
pub mod signature;
mod stripe_provider;

pub use lemonsqueezy_provider::{LemonSqueezyConfig, LemonSqueezyProvider};
pub use mock_provider::MockProvider;
pub use paddle_provider::{PaddleConfig, PaddleProvider};
pub use paypal_provider::{PayPalConfig, PayPalProvider};
pub use polar_provider::{PolarConfig, PolarProvider};
pub use registry::ProviderRegistry;
pub use resolver::{detect_from_headers, resolve_provider};
pub use stripe_provider::{StripeConfig, StripeProvider};
