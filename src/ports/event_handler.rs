//! EventHandler port - callbacks invoked for canonical webhook events.
//!
//! Handlers receive already-verified, already-normalized events. Errors are
//! captured and logged by the dispatcher; a failing handler never affects
//! sibling handlers or the webhook acknowledgment.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::domain::events::NormalizedEvent;
use crate::domain::DomainError;

/// Handler that processes canonical payment events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process one event. Invoked at-least-once per accepted webhook.
    async fn handle(&self, event: NormalizedEvent) -> Result<(), DomainError>;

    /// Stable name used in log lines when the handler fails.
    fn name(&self) -> &str;
}

/// Adapter turning an async closure into an [`EventHandler`].
///
/// Lets callers register plain `async` closures without writing a struct per
/// handler:
///
/// ```ignore
/// registry.subscribe(
///     EventType::PaymentSuccess,
///     Arc::new(FnHandler::new("grant-access", |event| async move {
///         grant_access(&event).await
///     })),
/// );
/// ```
pub struct FnHandler {
    name: String,
    func: Box<dyn Fn(NormalizedEvent) -> BoxFuture<'static, Result<(), DomainError>> + Send + Sync>,
}

impl FnHandler {
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(NormalizedEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(move |event| Box::pin(func(event))),
        }
    }
}

#[async_trait]
impl EventHandler for FnHandler {
    async fn handle(&self, event: NormalizedEvent) -> Result<(), DomainError> {
        (self.func)(event).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::EventType;
    use crate::domain::ProviderKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // Compile-time check that the trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EventHandler) {}

    #[tokio::test]
    async fn fn_handler_invokes_closure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let handler = FnHandler::new("counter", move |_event| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let event = NormalizedEvent::new(EventType::PaymentSuccess, ProviderKind::Mock);
        handler.handle(event).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handler.name(), "counter");
    }

    #[tokio::test]
    async fn fn_handler_propagates_errors() {
        let handler = FnHandler::new("failing", |_event| async {
            Err(DomainError::internal("boom"))
        });

        let event = NormalizedEvent::new(EventType::PaymentFailed, ProviderKind::Mock);
        let result = handler.handle(event).await;

        assert!(result.is_err());
    }
}
