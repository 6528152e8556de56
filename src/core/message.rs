//! Message envelopes exchanged between publishers, the dispatch engine and
//! subscribers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::core::error::DispatchError;

/// Outcome of a reply chain, handed to the publisher's callback once per
/// matching subscription group.
pub type ChainResult<P> = Result<P, DispatchError>;

/// Publisher-side callback. Invoked once per matching group in reply-chain
/// mode, or once with the original payload on the `wait = false` fast path.
pub type DeliveryCallback<P> = Arc<dyn Fn(ChainResult<P>) + Send + Sync>;

pub(crate) type ReplyReceiver<P> = oneshot::Receiver<anyhow::Result<P>>;

/// Handle a reply-chain subscriber uses to hand its output to the next
/// subscriber.
///
/// Consumed on use, so a subscriber can reply at most once. It may be moved
/// into a spawned task to reply asynchronously. Dropping it without replying
/// ends the chain with [`DispatchError::ReplyDropped`].
pub struct Reply<P> {
    tx: Option<oneshot::Sender<anyhow::Result<P>>>,
}

impl<P> Reply<P> {
    /// Reply handle for broadcast deliveries; replying is a no-op.
    pub(crate) fn detached() -> Self {
        Self { tx: None }
    }

    pub(crate) fn channel() -> (Self, ReplyReceiver<P>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// True when the publisher is waiting on this reply.
    pub fn is_expected(&self) -> bool {
        self.tx.is_some()
    }

    /// Supplies this subscriber's output and advances the chain.
    pub fn send(mut self, value: P) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Ok(value));
        }
    }

    /// Ends the chain with an error the publisher's callback will observe.
    pub fn fail(mut self, error: impl Into<anyhow::Error>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(error.into()));
        }
    }
}

impl<P> fmt::Debug for Reply<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("expected", &self.is_expected())
            .finish()
    }
}

/// What a subscriber receives: the payload, the concrete route it was
/// published on, and the reply handle.
///
/// In reply-chain mode `payload` is the running accumulator.
#[derive(Debug)]
pub struct Delivery<P> {
    route: String,
    payload: P,
    reply: Reply<P>,
}

impl<P> Delivery<P> {
    pub(crate) fn new(route: impl Into<String>, payload: P, reply: Reply<P>) -> Self {
        Self {
            route: route.into(),
            payload,
            reply,
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut P {
        &mut self.payload
    }

    pub fn expects_reply(&self) -> bool {
        self.reply.is_expected()
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    /// Splits the delivery so the payload and reply handle can travel
    /// separately, e.g. into an async task.
    pub fn into_parts(self) -> (String, P, Reply<P>) {
        (self.route, self.payload, self.reply)
    }

    /// Replies with `value`.
    pub fn reply(self, value: P) {
        self.reply.send(value);
    }

    /// Replies with the (possibly modified) payload this delivery carries.
    pub fn forward(self) {
        self.reply.send(self.payload);
    }

    pub fn fail(self, error: impl Into<anyhow::Error>) {
        self.reply.fail(error);
    }
}

/// Per-publish delivery options.
pub struct PublishOptions<P> {
    callback: Option<DeliveryCallback<P>>,
    wait: Option<bool>,
    reply_timeout: Option<Duration>,
}

impl<P> Default for PublishOptions<P> {
    fn default() -> Self {
        Self {
            callback: None,
            wait: None,
            reply_timeout: None,
        }
    }
}

impl<P> Clone for PublishOptions<P> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
            wait: self.wait,
            reply_timeout: self.reply_timeout,
        }
    }
}

impl<P> fmt::Debug for PublishOptions<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishOptions")
            .field("callback", &self.callback.is_some())
            .field("wait", &self.wait)
            .field("reply_timeout", &self.reply_timeout)
            .finish()
    }
}

impl<P> PublishOptions<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches the publish into reply-chain mode.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(ChainResult<P>) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// When `false` and nothing matches on a non-durable queue, the callback
    /// fires immediately with the original payload.
    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = Some(wait);
        self
    }

    /// Bounds how long each reply-chain step may take.
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }

    pub fn callback(&self) -> Option<&DeliveryCallback<P>> {
        self.callback.as_ref()
    }

    /// Effective `wait` flag; defaults to `true` only when a callback is set.
    pub fn waits(&self) -> bool {
        self.wait.unwrap_or(self.callback.is_some())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.reply_timeout
    }

    pub(crate) fn or_timeout(mut self, fallback: Option<Duration>) -> Self {
        if self.reply_timeout.is_none() {
            self.reply_timeout = fallback;
        }
        self
    }
}

/// A message stored by a durable queue because nothing matched it.
pub struct PendingMessage<P> {
    route: String,
    payload: P,
    options: PublishOptions<P>,
    retries: u32,
}

impl<P: Clone> Clone for PendingMessage<P> {
    fn clone(&self) -> Self {
        Self {
            route: self.route.clone(),
            payload: self.payload.clone(),
            options: self.options.clone(),
            retries: self.retries,
        }
    }
}

impl<P: fmt::Debug> fmt::Debug for PendingMessage<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingMessage")
            .field("route", &self.route)
            .field("payload", &self.payload)
            .field("options", &self.options)
            .field("retries", &self.retries)
            .finish()
    }
}

impl<P> PendingMessage<P> {
    pub(crate) fn new(
        route: impl Into<String>,
        payload: P,
        options: PublishOptions<P>,
        retries: u32,
    ) -> Self {
        Self {
            route: route.into(),
            payload,
            options,
            retries,
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn options(&self) -> &PublishOptions<P> {
        &self.options
    }

    /// Redelivery attempts made so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn into_parts(self) -> (String, P, PublishOptions<P>, u32) {
        (self.route, self.payload, self.options, self.retries)
    }
}
