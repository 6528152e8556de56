//! BlipBus queue module.
//!
//! A queue owns its subscription groups (one per distinct pattern, kept in
//! first-subscribe order) and, when durable, the messages nothing matched.
//!
//! Supports:
//! - `direct` and `topic` exchanges
//! - bounded redelivery of stored messages

pub mod group;
pub mod pending;
pub mod registry;

pub use group::SubscriptionGroup;
pub use pending::{Admission, PendingStore};
pub use registry::{QueueRegistry, SubscriptionLocation};

use crate::config::QueueConfig;
use crate::core::error::RouterError;
use crate::core::matcher::RoutePattern;
use crate::core::subscriber::Subscriber;

/// A declared queue and all of its state.
#[derive(Debug)]
pub struct Queue<P> {
    name: String,
    config: QueueConfig,
    groups: Vec<SubscriptionGroup<P>>,
    pending: PendingStore<P>,
}

impl<P> Queue<P> {
    pub fn new(name: impl Into<String>, config: QueueConfig) -> Self {
        Self {
            name: name.into(),
            config,
            groups: Vec::new(),
            pending: PendingStore::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn groups(&self) -> &[SubscriptionGroup<P>] {
        &self.groups
    }

    pub fn pending(&self) -> &PendingStore<P> {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut PendingStore<P> {
        &mut self.pending
    }

    pub fn group_mut(&mut self, pattern: &str) -> Option<&mut SubscriptionGroup<P>> {
        self.groups.iter_mut().find(|g| g.pattern() == pattern)
    }

    /// Creates groups for every pattern not seen before.
    ///
    /// All new patterns are compiled first, so an invalid one leaves the
    /// queue untouched.
    pub fn ensure_groups<'a>(
        &mut self,
        patterns: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), RouterError> {
        let mut fresh: Vec<RoutePattern> = Vec::new();
        for pattern in patterns {
            let known = self.groups.iter().any(|g| g.pattern() == pattern)
                || fresh.iter().any(|p| p.as_str() == pattern);
            if !known {
                fresh.push(RoutePattern::compile(
                    pattern,
                    self.config.exchange,
                    self.config.case_insensitive,
                )?);
            }
        }

        self.groups
            .extend(fresh.into_iter().map(SubscriptionGroup::new));
        Ok(())
    }

    /// Dispatch-ordered snapshots of every non-empty group matching `route`,
    /// in group creation order.
    pub fn matching_subscribers(&self, route: &str) -> Vec<Vec<Subscriber<P>>> {
        self.groups
            .iter()
            .filter(|g| !g.is_empty() && g.matches(route))
            .map(SubscriptionGroup::dispatch_order)
            .collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.groups.iter().map(SubscriptionGroup::len).sum()
    }

    pub fn info(&self) -> QueueInfo {
        QueueInfo {
            name: self.name.clone(),
            config: self.config.clone(),
            patterns: self.groups.iter().map(|g| g.pattern().to_owned()).collect(),
            subscribers: self.subscriber_count(),
            pending: self.pending.len(),
        }
    }
}

/// Read-only snapshot of a queue, for introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueInfo {
    pub name: String,
    pub config: QueueConfig,
    /// Registered patterns in first-subscribe order, including emptied ones.
    pub patterns: Vec<String>,
    pub subscribers: usize,
    pub pending: usize,
}
