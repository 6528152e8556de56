//! BlipBus Subscriber module.
//!
//! Provides the `Subscriber` registration entry and the process-unique
//! `SubscriptionId` used to revoke it.

#[allow(clippy::module_inception)]
pub mod subscriber;

pub use subscriber::{Handler, Subscriber, Subscription, SubscriptionId};
