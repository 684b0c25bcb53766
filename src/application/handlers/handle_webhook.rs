//! Webhook pipeline - resolve, verify, normalize, dispatch, acknowledge.
//!
//! The single entry point for inbound webhooks. Ordering is strict:
//! verification precedes normalization, which precedes dispatch, and the
//! acknowledgment is returned without waiting for handlers.

use std::sync::Arc;

use crate::adapters::payment::{resolve_provider, ProviderRegistry};
use crate::application::dispatch::HandlerRegistry;
use crate::domain::events::mapping;
use crate::domain::{DomainError, ErrorCode, WebhookAck, WebhookRequest};

/// Per-call options for the webhook pipeline.
#[derive(Debug, Clone, Default)]
pub struct WebhookOptions {
    /// Force a provider, bypassing configuration and header detection.
    pub provider_override: Option<String>,

    /// Use this secret instead of the configured one. Always wins.
    pub secret_override: Option<String>,
}

/// Orchestrates the webhook trust boundary and event dispatch.
pub struct WebhookPipeline {
    registry: Arc<ProviderRegistry>,
    handlers: Arc<HandlerRegistry>,
}

impl WebhookPipeline {
    pub fn new(registry: Arc<ProviderRegistry>, handlers: Arc<HandlerRegistry>) -> Self {
        Self { registry, handlers }
    }

    /// The handler registry events are dispatched through.
    pub fn handlers(&self) -> &Arc<HandlerRegistry> {
        &self.handlers
    }

    /// Process an inbound webhook with default options.
    pub async fn handle(&self, request: &WebhookRequest) -> Result<WebhookAck, DomainError> {
        self.handle_with(request, WebhookOptions::default()).await
    }

    /// Process an inbound webhook.
    ///
    /// Returns `WebhookAck { 200, received: true }` for verified (or
    /// verification-skipped) events and `{ 401, received: false }` for failed
    /// verification. Handler outcomes never influence the result.
    ///
    /// # Errors
    ///
    /// `ErrorCode::MalformedRequest` when the request carries neither a body
    /// nor any headers - the only hard usage error. `ErrorCode::Configuration`
    /// when the resolved provider cannot be constructed (missing credentials);
    /// that failure is fatal and never retried here.
    pub async fn handle_with(
        &self,
        request: &WebhookRequest,
        options: WebhookOptions,
    ) -> Result<WebhookAck, DomainError> {
        if request.body.is_empty() && request.headers.is_empty() {
            return Err(DomainError::malformed_request(
                "webhook request has neither a body nor headers",
            ));
        }

        let config = self.registry.config();

        // Explicit override wins over the configured name, which wins over
        // header detection; this decides which verification scheme runs.
        let configured_name = Some(config.provider.as_str()).filter(|name| !name.trim().is_empty());
        let override_name = options.provider_override.as_deref().or(configured_name);
        let kind = resolve_provider(override_name, &request.headers);

        let provider = self.registry.provider_for(kind).map_err(|e| {
            DomainError::new(
                ErrorCode::Configuration,
                format!("cannot construct provider {}: {}", kind, e),
            )
        })?;

        // Explicitly passed secret always overrides the configured value.
        let secret = options
            .secret_override
            .clone()
            .or_else(|| config.webhook_secret_for(kind));
        let signature = request.headers.get(kind.signature_header());

        match (secret.as_deref(), signature) {
            (Some(secret), Some(signature)) => {
                let verified = provider
                    .verify_webhook(&request.body, Some(signature), Some(secret), &request.headers)
                    .await;
                if !verified {
                    tracing::warn!(provider = %kind, "Webhook signature verification failed");
                    return Ok(WebhookAck::rejected());
                }
            }
            _ => {
                // No secret configured or no signature present.
                if config.require_signature {
                    tracing::warn!(
                        provider = %kind,
                        "Webhook rejected: signature required but secret or signature missing"
                    );
                    return Ok(WebhookAck::rejected());
                }
                tracing::warn!(
                    provider = %kind,
                    "Webhook verification skipped: no secret or signature configured"
                );
            }
        }

        // Verification is settled; everything past this point acknowledges.
        let Ok(raw) = serde_json::from_slice::<serde_json::Value>(&request.body) else {
            tracing::warn!(provider = %kind, "Accepted webhook body is not valid JSON");
            return Ok(WebhookAck::accepted());
        };

        let Some(native) = provider.normalize_webhook_event(&raw) else {
            tracing::debug!(provider = %kind, "Webhook envelope not recognized, dropped");
            return Ok(WebhookAck::accepted());
        };

        let Some(event) = mapping::to_canonical(kind, &native) else {
            tracing::debug!(
                provider = %kind,
                native_type = %native.event_type,
                "No canonical mapping for provider event, dropped"
            );
            return Ok(WebhookAck::accepted());
        };

        let spawned = self.handlers.dispatch(event.clone());
        tracing::info!(
            provider = %kind,
            event_type = %event.event_type,
            handlers = spawned,
            "Webhook accepted and dispatched"
        );

        Ok(WebhookAck::accepted())
    }
}
