//! Handler registry and fire-and-forget dispatcher.
//!
//! State is a mapping from canonical event type to an ordered list of
//! handlers. Registration only ever appends; there is no deduplication and no
//! unregister primitive. Insertion order is preserved for deterministic test
//! expectations but carries no correctness meaning, since handlers run
//! concurrently.
//!
//! Dispatch spawns one independent task per handler and joins none of them:
//! acknowledgment latency is bounded by verification and normalization cost,
//! never by handler execution time. Each task captures and logs its handler's
//! error; there is no cancellation primitive for in-flight handlers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use crate::domain::events::{EventType, NormalizedEvent};
use crate::domain::DomainError;
use crate::ports::{EventHandler, FnHandler};

/// Per-event-type handler lists with concurrent dispatch.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<EventType, Vec<Arc<dyn EventHandler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for one canonical event type.
    pub fn subscribe(&self, event_type: EventType, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .expect("HandlerRegistry: handlers lock poisoned")
            .entry(event_type)
            .or_default()
            .push(handler);
    }

    /// Number of handlers registered for an event type.
    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.handlers
            .read()
            .expect("HandlerRegistry: handlers lock poisoned")
            .get(&event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn handlers_for(&self, event_type: EventType) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .read()
            .expect("HandlerRegistry: handlers lock poisoned")
            .get(&event_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Fire all handlers registered for the event's type.
    ///
    /// Spawns one task per handler and returns immediately with the number of
    /// tasks spawned. Handler failures are logged and isolated.
    pub fn dispatch(&self, event: NormalizedEvent) -> usize {
        let handlers = self.handlers_for(event.event_type);
        let spawned = handlers.len();

        for handler in handlers {
            let event = event.clone();
            tokio::spawn(async move {
                if let Err(e) = handler.handle(event).await {
                    tracing::error!(
                        handler = handler.name(),
                        error = %e,
                        "Webhook handler failed"
                    );
                }
            });
        }

        spawned
    }

    fn on<F, Fut>(&self, name: &'static str, event_type: EventType, handler: F)
    where
        F: Fn(NormalizedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        self.subscribe(event_type, Arc::new(FnHandler::new(name, handler)));
    }

    // One registration function per canonical event type.

    pub fn on_payment_success<F, Fut>(&self, handler: F)
    where
        F: Fn(NormalizedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        self.on("on_payment_success", EventType::PaymentSuccess, handler);
    }

    pub fn on_payment_failed<F, Fut>(&self, handler: F)
    where
        F: Fn(NormalizedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        self.on("on_payment_failed", EventType::PaymentFailed, handler);
    }

    pub fn on_subscription_created<F, Fut>(&self, handler: F)
    where
        F: Fn(NormalizedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        self.on(
            "on_subscription_created",
            EventType::SubscriptionCreated,
            handler,
        );
    }

    pub fn on_subscription_cancelled<F, Fut>(&self, handler: F)
    where
        F: Fn(NormalizedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        self.on(
            "on_subscription_cancelled",
            EventType::SubscriptionCancelled,
            handler,
        );
    }

    pub fn on_subscription_updated<F, Fut>(&self, handler: F)
    where
        F: Fn(NormalizedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        self.on(
            "on_subscription_updated",
            EventType::SubscriptionUpdated,
            handler,
        );
    }

    pub fn on_subscription_deleted<F, Fut>(&self, handler: F)
    where
        F: Fn(NormalizedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        self.on(
            "on_subscription_deleted",
            EventType::SubscriptionDeleted,
            handler,
        );
    }

    pub fn on_subscription_paused<F, Fut>(&self, handler: F)
    where
        F: Fn(NormalizedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        self.on(
            "on_subscription_paused",
            EventType::SubscriptionPaused,
            handler,
        );
    }

    pub fn on_subscription_resumed<F, Fut>(&self, handler: F)
    where
        F: Fn(NormalizedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        self.on(
            "on_subscription_resumed",
            EventType::SubscriptionResumed,
            handler,
        );
    }
}
