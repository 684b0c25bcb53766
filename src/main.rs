//! Payrail webhook listener.
//!
//! Loads configuration from the environment, wires the provider registry and
//! handler registry into the webhook pipeline, and serves the webhook
//! endpoint.

use std::sync::Arc;

use tower_http::trace::TraceLayer;

use payrail::adapters::http::webhook::{webhook_router, WebhookAppState};
use payrail::adapters::payment::ProviderRegistry;
use payrail::application::{HandlerRegistry, WebhookPipeline};
use payrail::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .init();

    let registry = Arc::new(ProviderRegistry::new(config.payment.clone()));
    let handlers = Arc::new(HandlerRegistry::new());

    // Application wiring point: register business handlers here, e.g.
    // handlers.on_payment_success(|event| async move { ... });

    let pipeline = Arc::new(WebhookPipeline::new(registry.clone(), handlers));
    let app = webhook_router()
        .with_state(WebhookAppState { pipeline })
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr();
    tracing::info!(
        %addr,
        provider = %registry.active_kind(),
        "Payrail webhook listener starting"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
