//! Webhook HTTP surface.

mod dto;
mod handlers;
mod routes;

pub use dto::AckBody;
pub use handlers::{handle_payment_webhook, WebhookAppState};
pub use routes::{webhook_router, webhook_routes};
