//! The router handle: queue lifecycle, subscriptions, publishing and
//! redelivery, wired together over the core engine.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::{Config, QueueConfig};
use crate::core::dispatch;
use crate::core::error::{Result, RouterError};
use crate::core::message::{Delivery, PendingMessage, PublishOptions};
use crate::core::queue::{Admission, QueueInfo, QueueRegistry};
use crate::core::route::Route;
use crate::core::scheduler;
use crate::core::subscriber::{Handler, Subscription, SubscriptionId};

/// Where a dispatch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Publish,
    /// Re-publish of a stored message; `retries` already counts this attempt.
    Redelivery { retries: u32 },
}

impl Origin {
    fn retries(self) -> u32 {
        match self {
            Origin::Publish => 0,
            Origin::Redelivery { retries } => retries,
        }
    }
}

struct RouterInner<P> {
    registry: QueueRegistry<P>,
    reply_timeout: Option<Duration>,
}

/// An in-process message router.
///
/// Cloning is cheap and every clone drives the same engine; separately
/// constructed routers share nothing.
///
/// Reply-chain publishes and redelivery run as tokio tasks, so those paths
/// need an ambient runtime.
pub struct Router<P> {
    inner: Arc<RouterInner<P>>,
}

impl<P> Clone for Router<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for Router<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("queues", &self.inner.registry.names())
            .field("subscriptions", &self.inner.registry.subscription_count())
            .field("reply_timeout", &self.inner.reply_timeout)
            .finish()
    }
}

impl<P: Clone + Send + 'static> Default for Router<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Clone + Send + 'static> Router<P> {
    pub fn new() -> Self {
        Self::with_reply_timeout(None)
    }

    /// Router whose reply chains give each subscriber at most `timeout` to
    /// reply, unless a publish sets its own bound.
    pub fn with_reply_timeout(timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                registry: QueueRegistry::new(),
                reply_timeout: timeout,
            }),
        }
    }

    /// Builds a router and declares every queue listed in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let router = Self::with_reply_timeout(config.router.reply_timeout());
        for decl in &config.queues {
            router.declare(&decl.name, decl.config.clone())?;
        }
        info!(queues = config.queues.len(), "router configured");
        Ok(router)
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        self.inner.reply_timeout
    }

    // ───────────────────────────────────────────────────────────
    // Queue lifecycle
    // ───────────────────────────────────────────────────────────

    /// Fails with `AlreadyExists` if the name is taken.
    pub fn declare(&self, name: &str, config: QueueConfig) -> Result<()> {
        self.inner.registry.declare(name, config)
    }

    /// Drops the queue with all of its subscriptions and pending messages.
    /// Returns `false` when there was nothing to destroy.
    pub fn destroy(&self, name: &str) -> bool {
        self.inner.registry.destroy(name)
    }

    pub fn queues(&self) -> Vec<QueueInfo> {
        self.inner.registry.list()
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.inner.registry.contains(name)
    }

    pub fn pending_len(&self, queue: &str) -> Result<usize> {
        self.inner.registry.with_queue(queue, |q| q.pending().len())
    }

    // ───────────────────────────────────────────────────────────
    // Subscriptions
    // ───────────────────────────────────────────────────────────

    /// Registers `handler` on each pattern of `route`.
    ///
    /// Without an explicit `order` (or when it is already taken in the
    /// group) the subscriber is placed after the current last one. Pending
    /// messages on the queue are redelivered on the next tick.
    pub fn subscribe<F>(
        &self,
        queue: &str,
        route: impl Into<Route>,
        handler: F,
        order: Option<i64>,
    ) -> Result<Subscription>
    where
        F: Fn(Delivery<P>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Handler<P> = Arc::new(handler);
        self.register(queue, route.into(), order, |_| Arc::clone(&handler))
    }

    /// Like [`subscribe`](Self::subscribe), removed after its first delivery.
    pub fn subscribe_once<F>(
        &self,
        queue: &str,
        route: impl Into<Route>,
        handler: F,
        order: Option<i64>,
    ) -> Result<Subscription>
    where
        F: Fn(Delivery<P>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_times(queue, route, handler, order, 1)
    }

    /// Like [`subscribe`](Self::subscribe), removed after `times` deliveries.
    ///
    /// Each pattern of a multi-pattern route keeps its own count.
    pub fn subscribe_times<F>(
        &self,
        queue: &str,
        route: impl Into<Route>,
        handler: F,
        order: Option<i64>,
        times: usize,
    ) -> Result<Subscription>
    where
        F: Fn(Delivery<P>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        if times == 0 {
            return Err(RouterError::invalid_config("subscribe_times needs times >= 1"));
        }

        let handler: Handler<P> = Arc::new(handler);
        let router = Arc::downgrade(&self.inner);
        self.register(queue, route.into(), order, |id| {
            limited(Arc::clone(&handler), times, id.clone(), router.clone())
        })
    }

    /// Unknown ids are ignored. Returns whether a subscriber was removed.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        self.inner.registry.unsubscribe(id)
    }

    fn register<F>(
        &self,
        queue: &str,
        route: Route,
        order: Option<i64>,
        make_handler: F,
    ) -> Result<Subscription>
    where
        F: FnMut(&SubscriptionId) -> Handler<P>,
    {
        let patterns: Vec<&str> = route.keys().collect();
        let mut ids = self
            .inner
            .registry
            .subscribe(queue, &patterns, order, make_handler)?;

        self.schedule_redelivery(queue);

        Ok(match route {
            Route::Single(_) if ids.len() == 1 => Subscription::Single(ids.remove(0)),
            _ => Subscription::Multiple(ids),
        })
    }

    // ───────────────────────────────────────────────────────────
    // Publishing
    // ───────────────────────────────────────────────────────────

    /// Fire-and-forget publish.
    pub fn publish(&self, queue: &str, route: impl Into<Route>, payload: P) -> Result<()> {
        self.publish_with(queue, route, payload, PublishOptions::new())
    }

    /// Publishes with delivery options.
    ///
    /// With a callback, every matching group runs a reply chain and the
    /// callback fires once per group. A multi-key route is published once
    /// per key.
    pub fn publish_with(
        &self,
        queue: &str,
        route: impl Into<Route>,
        payload: P,
        options: PublishOptions<P>,
    ) -> Result<()> {
        let route = route.into();
        self.inner.registry.get(queue)?;
        if options.callback().is_some() {
            scheduler::current()?;
        }

        let options = options.or_timeout(self.inner.reply_timeout);
        for key in route.keys() {
            self.dispatch(queue, key, payload.clone(), options.clone(), Origin::Publish)?;
        }
        Ok(())
    }

    fn dispatch(
        &self,
        queue_name: &str,
        route: &str,
        payload: P,
        options: PublishOptions<P>,
        origin: Origin,
    ) -> Result<()> {
        let shared = self.inner.registry.get(queue_name)?;
        let mut queue = shared.lock();
        if !self.inner.registry.is_current(queue_name, &shared) {
            return Err(RouterError::QueueNotFound(queue_name.to_owned()));
        }
        let groups = queue.matching_subscribers(route);

        if groups.is_empty() {
            let config = queue.config().clone();
            if config.durable {
                let retries = origin.retries();
                let admission = queue.pending_mut().admit(
                    PendingMessage::new(route, payload, options, retries),
                    config.max_retries,
                );
                drop(queue);

                match admission {
                    Admission::Stored => {
                        debug!(queue = %queue_name, route = %route, retries, "no subscriber matched; message stored")
                    }
                    Admission::Discarded => {
                        warn!(queue = %queue_name, route = %route, retries, "message discarded after reaching max retries")
                    }
                }
                return Ok(());
            }
            drop(queue);

            match options.callback() {
                Some(callback) if !options.waits() && origin == Origin::Publish => {
                    debug!(queue = %queue_name, route = %route, "no subscriber matched; acknowledging immediately");
                    callback(Ok(payload));
                }
                _ => debug!(queue = %queue_name, route = %route, "no subscriber matched; message dropped"),
            }
            return Ok(());
        }
        drop(queue);

        debug!(queue = %queue_name, route = %route, groups = groups.len(), ?origin, "dispatching");
        match options.callback().cloned() {
            None => {
                for subscribers in &groups {
                    dispatch::broadcast(subscribers, route, &payload);
                }
            }
            Some(callback) => {
                let handle = scheduler::current()?;
                let route = route.to_owned();
                let timeout = options.timeout();
                handle.spawn(async move {
                    let chains = groups.into_iter().map(|subscribers| {
                        let callback = Arc::clone(&callback);
                        let chain = dispatch::reply_chain(subscribers, route.clone(), payload.clone(), timeout);
                        async move { callback(chain.await) }
                    });
                    join_all(chains).await;
                });
            }
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────
    // Durable store
    // ───────────────────────────────────────────────────────────

    /// Removes and returns up to `n` pending messages published on `route`
    /// (any route when `None`), oldest first.
    pub fn fetch(&self, queue: &str, route: Option<&str>, n: usize) -> Result<Vec<PendingMessage<P>>> {
        self.inner
            .registry
            .with_queue(queue, |q| q.pending_mut().take(route, n))
    }

    /// Takes every pending message in scope off the queue and re-publishes
    /// each one on its own task. Returns how many were scheduled.
    pub fn redeliver(&self, queue: &str, route: Option<&str>) -> Result<usize> {
        self.inner.registry.get(queue)?;
        let handle = scheduler::current()?;
        let messages = self
            .inner
            .registry
            .with_queue(queue, |q| q.pending_mut().drain(route))?;
        let count = messages.len();

        for message in messages {
            let router = self.clone();
            let queue = queue.to_owned();
            handle.spawn(async move { router.redeliver_one(&queue, message) });
        }

        if count > 0 {
            debug!(queue = %queue, count, "redelivery scheduled");
        }
        Ok(count)
    }

    fn redeliver_one(&self, queue: &str, message: PendingMessage<P>) {
        let (route, payload, options, retries) = message.into_parts();
        let origin = Origin::Redelivery {
            retries: retries.saturating_add(1),
        };
        if let Err(err) = self.dispatch(queue, &route, payload, options, origin) {
            debug!(queue = %queue, route = %route, error = %err, "redelivery abandoned");
        }
    }

    fn schedule_redelivery(&self, queue: &str) {
        let router = self.clone();
        let name = queue.to_owned();
        let check = async move {
            if let Err(err) = router.redeliver(&name, None) {
                debug!(queue = %name, error = %err, "redelivery check skipped");
            }
        };

        // without a runtime, an empty pending list is not worth a warning
        if scheduler::defer(check).is_err() && self.pending_len(queue).unwrap_or(0) > 0 {
            warn!(queue = %queue, "no tokio runtime; pending messages left in place");
        }
    }
}

/// Wraps `handler` so it unsubscribes itself on its `times`-th call and
/// ignores anything delivered after that.
fn limited<P: Send + 'static>(
    handler: Handler<P>,
    times: usize,
    id: SubscriptionId,
    router: Weak<RouterInner<P>>,
) -> Handler<P> {
    let calls = AtomicUsize::new(0);
    Arc::new(move |delivery: Delivery<P>| -> anyhow::Result<()> {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call > times {
            // delivered from a snapshot taken before the last call removed us
            delivery.forward();
            return Ok(());
        }
        if call == times {
            if let Some(inner) = router.upgrade() {
                inner.registry.unsubscribe(&id);
            }
        }
        handler(delivery)
    })
}
