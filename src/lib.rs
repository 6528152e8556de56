//! BlipBus – an in-process message router written in Rust.
//!
//! This crate exports
//!  * `core`    – route matching, subscription groups, durable store, dispatch
//!  * `broker`  – the [`Router`] handle tying the core together
//!  * `config`  – TOML-driven queue declarations
//!  * `logging` – tracing subscriber setup
//!
//! ```no_run
//! use blipbus::{QueueConfig, Router};
//!
//! # fn main() -> Result<(), blipbus::RouterError> {
//! let router: Router<String> = Router::new();
//! router.declare("events", QueueConfig::topic())?;
//! router.subscribe(
//!     "events",
//!     "orders.*",
//!     |delivery| {
//!         println!("{} -> {}", delivery.route(), delivery.payload());
//!         Ok(())
//!     },
//!     None,
//! )?;
//! router.publish("events", "orders.created", "order 42".to_string())?;
//! # Ok(())
//! # }
//! ```

// ───────────────────────────────────────────────────────────
// Public modules
// ───────────────────────────────────────────────────────────
pub mod broker;
pub mod config;
pub mod core;
pub mod logging;

// ───────────────────────────────────────────────────────────
// Re-exports
// ───────────────────────────────────────────────────────────
pub use broker::Router;
pub use config::{load_config, Config, QueueConfig};
pub use crate::core::error::{DispatchError, RouterError};
pub use crate::core::matcher::{matches, ExchangeType};
pub use crate::core::message::{ChainResult, Delivery, PendingMessage, PublishOptions, Reply};
pub use crate::core::queue::QueueInfo;
pub use crate::core::route::Route;
pub use crate::core::subscriber::{Subscription, SubscriptionId};
