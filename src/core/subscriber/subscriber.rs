use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use uuid::Uuid;

use crate::core::message::Delivery;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl SubscriptionId {
    /// Generates a fresh id, prefixed with the pattern it was issued for.
    pub fn generate(pattern: &str) -> Self {
        SubscriptionId(format!("{pattern}#{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionId {
    fn from(s: &str) -> Self {
        SubscriptionId(s.to_owned())
    }
}

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        SubscriptionId(s)
    }
}

impl From<SubscriptionId> for String {
    fn from(id: SubscriptionId) -> Self {
        id.0
    }
}

impl AsRef<str> for SubscriptionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for SubscriptionId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Ids issued by one `subscribe` call, shaped like the route it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    Single(SubscriptionId),
    Multiple(Vec<SubscriptionId>),
}

impl Subscription {
    pub fn ids(&self) -> &[SubscriptionId] {
        match self {
            Subscription::Single(id) => std::slice::from_ref(id),
            Subscription::Multiple(ids) => ids,
        }
    }

    /// The id of a single-route subscription.
    pub fn id(&self) -> Option<&SubscriptionId> {
        match self {
            Subscription::Single(id) => Some(id),
            Subscription::Multiple(_) => None,
        }
    }
}

/// Callback invoked for every delivery routed to a subscription.
///
/// Returning `Err` is logged in broadcast mode and ends the chain in
/// reply-chain mode.
pub type Handler<P> = Arc<dyn Fn(Delivery<P>) -> anyhow::Result<()> + Send + Sync>;

/// One registration inside a subscription group.
pub struct Subscriber<P> {
    id: SubscriptionId,
    order: i64,
    handler: Handler<P>,
}

impl<P> Clone for Subscriber<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            order: self.order,
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<P> fmt::Debug for Subscriber<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

impl<P> Subscriber<P> {
    pub fn new(id: SubscriptionId, order: i64, handler: Handler<P>) -> Self {
        Self { id, order, handler }
    }

    #[inline(always)]
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    #[inline(always)]
    pub fn order(&self) -> i64 {
        self.order
    }

    #[inline(always)]
    pub fn handler(&self) -> &Handler<P> {
        &self.handler
    }
}
