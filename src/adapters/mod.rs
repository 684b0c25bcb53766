//! Adapters - implementations of ports against the outside world.

pub mod http;
pub mod payment;
