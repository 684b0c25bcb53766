//! Command handlers.

mod handle_webhook;

pub use handle_webhook::{WebhookOptions, WebhookPipeline};
