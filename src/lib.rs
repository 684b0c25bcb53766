//! Payrail - Unified Payment Provider Core
//!
//! Accept payments and manage subscriptions through interchangeable payment
//! processors behind one capability contract, with webhook signature
//! verification and canonical event dispatch.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
