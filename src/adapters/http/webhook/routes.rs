//! Axum router configuration for webhook endpoints.
//!
//! Webhook routes are separate from any authenticated API surface: callers
//! are payment processors, authenticated by signature rather than session.

use axum::{routing::post, Router};

use super::handlers::{handle_payment_webhook, WebhookAppState};

/// Create the webhook router.
///
/// # Routes
/// - `POST /payments` - unified endpoint for all supported providers; the
///   originating provider is detected from configuration or headers
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new().route("/payments", post(handle_payment_webhook))
}

/// Create the complete webhook module router, mounted at `/webhooks`.
///
/// # Example
///
/// ```ignore
/// let state = WebhookAppState { pipeline };
/// let app = Router::new()
///     .nest("/webhooks", webhook_router())
///     .with_state(state);
/// ```
pub fn webhook_router() -> Router<WebhookAppState> {
    Router::new().nest("/webhooks", webhook_routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::payment::ProviderRegistry;
    use crate::application::{HandlerRegistry, WebhookPipeline};
    use crate::config::PaymentConfig;
    use std::sync::Arc;

    fn test_state() -> WebhookAppState {
        WebhookAppState {
            pipeline: Arc::new(WebhookPipeline::new(
                Arc::new(ProviderRegistry::new(PaymentConfig::default())),
                Arc::new(HandlerRegistry::new()),
            )),
        }
    }

    #[test]
    fn webhook_routes_creates_router() {
        let router = webhook_routes();
        let _: Router<()> = router.with_state(test_state());
    }

    #[test]
    fn webhook_router_creates_nested_router() {
        let router = webhook_router();
        let _: Router<()> = router.with_state(test_state());
    }
}
