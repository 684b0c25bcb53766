//! Application layer - webhook orchestration and event dispatch.

pub mod dispatch;
pub mod handlers;

pub use dispatch::HandlerRegistry;
pub use handlers::{WebhookOptions, WebhookPipeline};
