//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between the
//! domain and the outside world. Adapters implement these ports.
//!
//! - `PaymentProvider` - the capability contract every processor variant
//!   implements (charges, subscriptions, checkout/portal sessions, webhook
//!   verification, first-pass event normalization)
//! - `EventHandler` - callback contract for canonical event dispatch

mod event_handler;
mod payment_provider;

pub use event_handler::{EventHandler, FnHandler};
pub use payment_provider::{
    Charge, ChargeRequest, ChargeStatus, CheckoutSession, CreateCheckoutRequest, PaymentError,
    PaymentErrorCode, PaymentProvider, PortalSession, SubscribeRequest, Subscription,
    SubscriptionStatus,
};
