//! # Broker Module
//!
//! This module provides the top-level [`Router`] handle that ties the core
//! engine together: queue registry, subscription table, dispatch and the
//! durable store.

pub mod router;

pub use self::router::Router;
