use std::collections::VecDeque;

use crate::core::message::PendingMessage;

/// Result of offering a message to the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Stored,
    /// The message used up its redelivery budget.
    Discarded,
}

/// Messages a durable queue is holding until a subscriber can take them.
#[derive(Debug)]
pub struct PendingStore<P> {
    messages: VecDeque<PendingMessage<P>>,
}

impl<P> Default for PendingStore<P> {
    fn default() -> Self {
        Self {
            messages: VecDeque::new(),
        }
    }
}

impl<P> PendingStore<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Appends `message` unless its retry counter has reached `max_retries`.
    pub fn admit(&mut self, message: PendingMessage<P>, max_retries: Option<u32>) -> Admission {
        match max_retries {
            Some(max) if message.retries() >= max => Admission::Discarded,
            _ => {
                self.messages.push_back(message);
                Admission::Stored
            }
        }
    }

    /// Removes up to `n` messages published on exactly `route` (any route
    /// when `None`), oldest first.
    pub fn take(&mut self, route: Option<&str>, n: usize) -> Vec<PendingMessage<P>> {
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(self.messages.len());

        for message in self.messages.drain(..) {
            if taken.len() < n && in_scope(&message, route) {
                taken.push(message);
            } else {
                kept.push_back(message);
            }
        }

        self.messages = kept;
        taken
    }

    /// Removes every message in scope, oldest first.
    pub fn drain(&mut self, route: Option<&str>) -> Vec<PendingMessage<P>> {
        self.take(route, usize::MAX)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingMessage<P>> {
        self.messages.iter()
    }
}

fn in_scope<P>(message: &PendingMessage<P>, route: Option<&str>) -> bool {
    route.is_none_or(|route| message.route() == route)
}
