//! Canonical event model and provider vocabulary mapping.

mod canonical;
pub mod mapping;

pub use canonical::{EventType, NormalizedEvent, ProviderEvent};
