use crate::core::error::RouterError;
use crate::core::matcher::RoutePattern;
use crate::core::subscriber::{Subscriber, SubscriptionId};

/// All subscribers registered on one pattern of a queue.
#[derive(Debug)]
pub struct SubscriptionGroup<P> {
    pattern: RoutePattern,
    subscribers: Vec<Subscriber<P>>,
}

impl<P> SubscriptionGroup<P> {
    pub fn new(pattern: RoutePattern) -> Self {
        Self {
            pattern,
            subscribers: Vec::new(),
        }
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, route: &str) -> bool {
        self.pattern.is_match(route)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Effective order for a new subscriber.
    ///
    /// A requested order is kept unless another subscriber already holds it;
    /// otherwise the new subscriber goes after the current maximum (or gets
    /// `1` in an empty group). Fails once the maximum is `i64::MAX`.
    pub fn resolve_order(&self, requested: Option<i64>) -> Result<i64, RouterError> {
        match requested {
            Some(order) if !self.subscribers.iter().any(|s| s.order() == order) => Ok(order),
            _ => match self.subscribers.iter().map(Subscriber::order).max() {
                None => Ok(1),
                Some(max) => max.checked_add(1).ok_or_else(|| {
                    RouterError::invalid_config(format!(
                        "no order left after {max} in group '{}'",
                        self.pattern()
                    ))
                }),
            },
        }
    }

    pub fn insert(&mut self, subscriber: Subscriber<P>) {
        self.subscribers.push(subscriber);
    }

    pub fn remove(&mut self, id: &SubscriptionId) -> Option<Subscriber<P>> {
        let position = self.subscribers.iter().position(|s| s.id() == id)?;
        Some(self.subscribers.remove(position))
    }

    pub fn ids(&self) -> impl Iterator<Item = &SubscriptionId> {
        self.subscribers.iter().map(Subscriber::id)
    }

    /// Copy of the subscribers in dispatch order (ascending `order`).
    pub fn dispatch_order(&self) -> Vec<Subscriber<P>> {
        let mut snapshot = self.subscribers.clone();
        snapshot.sort_by_key(Subscriber::order);
        snapshot
    }
}
