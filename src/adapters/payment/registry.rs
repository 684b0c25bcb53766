//! Provider registry - resolves configuration to a cached provider variant.
//!
//! The registry is an explicitly constructed, dependency-injected object (no
//! process-global state) holding a single-slot cache: the most recently
//! requested variant stays alive for reuse, and `reset()` is the only way to
//! invalidate it. The write lock is held across construction so concurrent
//! first access builds exactly one instance per slot generation.

use std::sync::{Arc, RwLock};

use crate::adapters::payment::{
    LemonSqueezyProvider, MockProvider, PaddleProvider, PayPalProvider, PolarProvider,
    StripeProvider,
};
use crate::config::{PaymentConfig, ValidationError};
use crate::domain::ProviderKind;
use crate::ports::PaymentProvider;

type Slot = Option<(ProviderKind, Arc<dyn PaymentProvider>)>;

/// Factory plus single-slot cache for provider variants.
pub struct ProviderRegistry {
    config: PaymentConfig,
    slot: RwLock<Slot>,
}

impl ProviderRegistry {
    pub fn new(config: PaymentConfig) -> Self {
        Self {
            config,
            slot: RwLock::new(None),
        }
    }

    /// The payment configuration this registry builds from.
    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    /// The configured provider kind (Mock for unknown or absent names).
    pub fn active_kind(&self) -> ProviderKind {
        self.config.active_kind()
    }

    /// The configured provider instance, built lazily and cached.
    ///
    /// # Errors
    ///
    /// Fails permanently when the provider's required credentials are absent.
    /// Construction is never retried; the error propagates to the caller.
    pub fn active(&self) -> Result<Arc<dyn PaymentProvider>, ValidationError> {
        self.provider_for(self.active_kind())
    }

    /// The provider instance for a resolver-detected kind.
    ///
    /// Reuses the cached slot when the kind matches; otherwise constructs the
    /// variant and re-points the slot at it.
    pub fn provider_for(
        &self,
        kind: ProviderKind,
    ) -> Result<Arc<dyn PaymentProvider>, ValidationError> {
        {
            let slot = self.slot.read().expect("ProviderRegistry: slot lock poisoned");
            if let Some((cached_kind, provider)) = slot.as_ref() {
                if *cached_kind == kind {
                    return Ok(Arc::clone(provider));
                }
            }
        }

        let mut slot = self.slot.write().expect("ProviderRegistry: slot lock poisoned");
        // Re-check under the write lock; another thread may have won the race.
        if let Some((cached_kind, provider)) = slot.as_ref() {
            if *cached_kind == kind {
                return Ok(Arc::clone(provider));
            }
        }

        let provider = self.build(kind)?;
        *slot = Some((kind, Arc::clone(&provider)));
        Ok(provider)
    }

    /// Clear the cached instance. Intended exclusively for test isolation;
    /// the next access reconstructs the variant from configuration.
    pub fn reset(&self) {
        *self.slot.write().expect("ProviderRegistry: slot lock poisoned") = None;
    }

    fn build(&self, kind: ProviderKind) -> Result<Arc<dyn PaymentProvider>, ValidationError> {
        let provider: Arc<dyn PaymentProvider> = match kind {
            ProviderKind::Stripe => Arc::new(StripeProvider::from_settings(&self.config.stripe)?),
            ProviderKind::Paddle => Arc::new(PaddleProvider::from_settings(&self.config.paddle)?),
            ProviderKind::PayPal => Arc::new(PayPalProvider::from_settings(&self.config.paypal)?),
            ProviderKind::LemonSqueezy => {
                Arc::new(LemonSqueezyProvider::from_settings(&self.config.lemonsqueezy)?)
            }
            ProviderKind::Polar => Arc::new(PolarProvider::from_settings(&self.config.polar)?),
            ProviderKind::Mock => Arc::new(MockProvider::new()),
        };
        tracing::debug!(provider = %kind, "Constructed payment provider");
        Ok(provider)
    }
}
