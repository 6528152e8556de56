use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::config::QueueConfig;
use crate::core::error::RouterError;
use crate::core::queue::{Queue, QueueInfo};
use crate::core::subscriber::{Handler, Subscriber, SubscriptionId};

pub type SharedQueue<P> = Arc<Mutex<Queue<P>>>;

/// Where a subscription lives; the value side of the reverse index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionLocation {
    pub queue: String,
    pub pattern: String,
}

/// [`QueueRegistry`] owns every declared queue plus the reverse index from
/// subscription id to its group.
///
/// Index entries are only written while the owning queue is locked, so the
/// index and the groups never disagree from the point of view of another
/// caller.
#[derive(Debug)]
pub struct QueueRegistry<P> {
    queues: DashMap<String, SharedQueue<P>>,
    index: DashMap<SubscriptionId, SubscriptionLocation>,
}

impl<P> Default for QueueRegistry<P> {
    fn default() -> Self {
        Self {
            queues: DashMap::new(),
            index: DashMap::new(),
        }
    }
}

impl<P> QueueRegistry<P> {
    /// Creates a new empty [`QueueRegistry`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&self, name: &str, config: QueueConfig) -> Result<(), RouterError> {
        if name.is_empty() {
            return Err(RouterError::invalid_config("queue name must not be empty"));
        }
        config.validate()?;

        match self.queues.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(RouterError::AlreadyExists(name.to_owned())),
            Entry::Vacant(slot) => {
                debug!(queue = %name, ?config, "queue declared");
                slot.insert(Arc::new(Mutex::new(Queue::new(name, config))));
                Ok(())
            }
        }
    }

    /// Removes a queue with its groups, pending messages and index entries.
    ///
    /// Returns `false` if no such queue was declared.
    pub fn destroy(&self, name: &str) -> bool {
        let Some((_, queue)) = self.queues.remove(name) else {
            return false;
        };

        let queue = queue.lock();
        for group in queue.groups() {
            for id in group.ids() {
                self.index.remove(id);
            }
        }
        debug!(queue = %name, pending = queue.pending().len(), "queue destroyed");
        true
    }

    pub fn get(&self, name: &str) -> Result<SharedQueue<P>, RouterError> {
        self.queues
            .get(name)
            .map(|entry| Arc::clone(&*entry))
            .ok_or_else(|| RouterError::QueueNotFound(name.to_owned()))
    }

    /// Whether `queue` is still the one declared under `name`.
    ///
    /// Callers holding a queue they looked up earlier check this after
    /// locking it, since a `destroy` may have run in between.
    pub fn is_current(&self, name: &str, queue: &SharedQueue<P>) -> bool {
        self.queues
            .get(name)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), queue))
    }

    /// Runs `f` on the locked queue.
    ///
    /// Fails with `QueueNotFound` if `name` is not declared, including when
    /// it was destroyed while this call waited for the lock.
    pub fn with_queue<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Queue<P>) -> R,
    ) -> Result<R, RouterError> {
        let shared = self.get(name)?;
        let mut queue = shared.lock();
        if !self.is_current(name, &shared) {
            return Err(RouterError::QueueNotFound(name.to_owned()));
        }
        Ok(f(&mut queue))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.queues.contains_key(name)
    }

    /// Lists all queue names currently declared.
    pub fn names(&self) -> Vec<String> {
        self.queues.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn list(&self) -> Vec<QueueInfo> {
        let queues: Vec<SharedQueue<P>> =
            self.queues.iter().map(|entry| Arc::clone(entry.value())).collect();
        let mut infos: Vec<QueueInfo> = queues.iter().map(|q| q.lock().info()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Registers one subscriber per pattern, in pattern order.
    ///
    /// `make_handler` is called with each freshly issued id. Either every
    /// pattern is registered or none is: a pattern that fails to compile or a
    /// group with no order left undoes the whole call.
    pub fn subscribe<F>(
        &self,
        queue_name: &str,
        patterns: &[&str],
        order: Option<i64>,
        mut make_handler: F,
    ) -> Result<Vec<SubscriptionId>, RouterError>
    where
        F: FnMut(&SubscriptionId) -> Handler<P>,
    {
        let shared = self.get(queue_name)?;
        let mut queue = shared.lock();
        if !self.is_current(queue_name, &shared) {
            return Err(RouterError::QueueNotFound(queue_name.to_owned()));
        }
        queue.ensure_groups(patterns.iter().copied())?;

        let mut ids: Vec<SubscriptionId> = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let group = queue
                .group_mut(pattern)
                .ok_or_else(|| RouterError::invalid_pattern(*pattern, "group missing"))?;
            let effective = match group.resolve_order(order) {
                Ok(effective) => effective,
                Err(err) => {
                    for (id, pattern) in ids.iter().zip(patterns) {
                        if let Some(group) = queue.group_mut(pattern) {
                            group.remove(id);
                        }
                        self.index.remove(id);
                    }
                    return Err(err);
                }
            };

            let id = SubscriptionId::generate(pattern);
            group.insert(Subscriber::new(id.clone(), effective, make_handler(&id)));
            self.index.insert(
                id.clone(),
                SubscriptionLocation {
                    queue: queue_name.to_owned(),
                    pattern: (*pattern).to_owned(),
                },
            );
            debug!(queue = %queue_name, pattern = %pattern, id = %id, order = effective, "subscribed");
            ids.push(id);
        }

        Ok(ids)
    }

    /// Removes a subscriber by id. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        let Some(location) = self.index.get(id).map(|entry| entry.value().clone()) else {
            return false;
        };

        let Ok(queue) = self.get(&location.queue) else {
            self.index.remove(id);
            return false;
        };

        let mut queue = queue.lock();
        let removed = queue
            .group_mut(&location.pattern)
            .and_then(|group| group.remove(id))
            .is_some();
        self.index.remove(id);

        if removed {
            debug!(queue = %location.queue, pattern = %location.pattern, id = %id, "unsubscribed");
        }
        removed
    }

    pub fn locate(&self, id: &SubscriptionId) -> Option<SubscriptionLocation> {
        self.index.get(id).map(|entry| entry.value().clone())
    }

    /// Number of live subscriptions across all queues.
    pub fn subscription_count(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Delivery;

    fn noop(_: &SubscriptionId) -> Handler<()> {
        Arc::new(|_: Delivery<()>| -> anyhow::Result<()> { Ok(()) })
    }

    #[test]
    fn declare_rejects_duplicates_and_bad_config() {
        let registry: QueueRegistry<()> = QueueRegistry::new();
        registry.declare("q", QueueConfig::default()).unwrap();
        assert!(matches!(
            registry.declare("q", QueueConfig::default()),
            Err(RouterError::AlreadyExists(_))
        ));
        assert!(matches!(
            registry.declare("", QueueConfig::default()),
            Err(RouterError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            registry.declare("r", QueueConfig::direct().durable(true).max_retries(0)),
            Err(RouterError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn index_tracks_group_membership() {
        let registry: QueueRegistry<()> = QueueRegistry::new();
        registry.declare("q", QueueConfig::default()).unwrap();

        let ids = registry.subscribe("q", &["a", "b"], None, noop).unwrap();
        assert_eq!(registry.subscription_count(), 2);
        assert_eq!(
            registry.locate(&ids[1]),
            Some(SubscriptionLocation {
                queue: "q".into(),
                pattern: "b".into()
            })
        );

        assert!(registry.unsubscribe(&ids[0]));
        assert!(!registry.unsubscribe(&ids[0]));
        assert_eq!(registry.locate(&ids[0]), None);
        assert_eq!(registry.subscription_count(), 1);
    }

    #[test]
    fn destroy_drops_index_entries() {
        let registry: QueueRegistry<()> = QueueRegistry::new();
        registry.declare("q", QueueConfig::default()).unwrap();
        let ids = registry.subscribe("q", &["a"], None, noop).unwrap();

        assert!(registry.destroy("q"));
        assert!(!registry.destroy("q"));
        assert_eq!(registry.locate(&ids[0]), None);
        assert!(matches!(registry.get("q"), Err(RouterError::QueueNotFound(_))));
        assert!(matches!(
            registry.subscribe("q", &["a"], None, noop),
            Err(RouterError::QueueNotFound(_))
        ));
    }

    #[test]
    fn stale_handle_is_not_current_after_destroy() {
        let registry: QueueRegistry<()> = QueueRegistry::new();
        registry.declare("q", QueueConfig::default()).unwrap();
        let stale = registry.get("q").unwrap();
        assert!(registry.is_current("q", &stale));

        registry.destroy("q");
        assert!(!registry.is_current("q", &stale));

        registry.declare("q", QueueConfig::default()).unwrap();
        assert!(!registry.is_current("q", &stale));
        assert!(registry.is_current("q", &registry.get("q").unwrap()));
    }

    #[test]
    fn exhausted_order_rolls_back_the_whole_subscribe() {
        let registry: QueueRegistry<()> = QueueRegistry::new();
        registry.declare("q", QueueConfig::default()).unwrap();
        registry.subscribe("q", &["b"], Some(i64::MAX), noop).unwrap();

        assert!(matches!(
            registry.subscribe("q", &["a", "b"], None, noop),
            Err(RouterError::InvalidConfiguration(_))
        ));
        assert_eq!(registry.subscription_count(), 1);
        let info = registry.list().remove(0);
        assert_eq!(info.subscribers, 1);
    }

    #[test]
    fn with_queue_refuses_destroyed_queues() {
        let registry: QueueRegistry<()> = QueueRegistry::new();
        registry.declare("q", QueueConfig::default()).unwrap();
        assert_eq!(registry.with_queue("q", |q| q.name().to_owned()).unwrap(), "q");

        registry.destroy("q");
        assert!(matches!(
            registry.with_queue("q", |q| q.pending().len()),
            Err(RouterError::QueueNotFound(_))
        ));
    }
}
