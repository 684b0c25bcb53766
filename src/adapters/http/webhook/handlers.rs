//! Axum handlers for the webhook endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use super::dto::AckBody;
use crate::application::WebhookPipeline;
use crate::domain::{ErrorCode, WebhookHeaders, WebhookRequest};

/// Shared state for the webhook router.
#[derive(Clone)]
pub struct WebhookAppState {
    pub pipeline: Arc<WebhookPipeline>,
}

/// POST /webhooks/payments
///
/// Accepts a raw payload from any supported provider, verifies its signature
/// and dispatches the canonical event. The body must reach the pipeline
/// byte-exact: signatures are computed over the wire bytes.
///
/// Responses:
/// - `200 {"received": true}` - verified and dispatched, or verification
///   skipped because no secret/signature was configured
/// - `401 {"received": false}` - signature verification failed
/// - `400` - neither a body nor headers were supplied
pub async fn handle_payment_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<AckBody>) {
    let request = WebhookRequest::new(body.to_vec(), WebhookHeaders::from(&headers));

    match state.pipeline.handle(&request).await {
        Ok(ack) => (
            StatusCode::from_u16(ack.status).unwrap_or(StatusCode::OK),
            Json(AckBody::from(ack)),
        ),
        Err(e) if e.code == ErrorCode::MalformedRequest => {
            tracing::warn!(error = %e, "Malformed webhook request");
            (StatusCode::BAD_REQUEST, Json(AckBody { received: false }))
        }
        Err(e) => {
            tracing::error!(error = %e, "Webhook pipeline failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AckBody { received: false }),
            )
        }
    }
}
