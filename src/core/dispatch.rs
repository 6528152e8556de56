//! Delivery of one published message to one subscription group.
//!
//! Both modes work on a snapshot of the group taken when the message was
//! published; later subscribe/unsubscribe calls do not affect a dispatch that
//! is already under way.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tracing::{debug, warn};

use crate::core::error::DispatchError;
use crate::core::message::{ChainResult, Delivery, Reply};
use crate::core::subscriber::Subscriber;

/// Fire-and-forget delivery to every subscriber, in ascending order.
///
/// A subscriber that returns an error or panics is logged and skipped.
/// Returns how many subscribers handled the message without failing.
pub fn broadcast<P: Clone>(subscribers: &[Subscriber<P>], route: &str, payload: &P) -> usize {
    let mut delivered = 0;

    for subscriber in subscribers {
        let delivery = Delivery::new(route, payload.clone(), Reply::detached());
        match invoke(subscriber, delivery) {
            Ok(()) => delivered += 1,
            Err(err) => warn!(
                target: "blipbus::dispatch",
                route = %route,
                error = %err,
                "subscriber failed; continuing with the rest of the group"
            ),
        }
    }

    delivered
}

/// Sequential fold over the group: each subscriber receives the running
/// accumulator and replies with the next one.
///
/// The chain stops at the first failure, which is returned in place of the
/// accumulated value. A subscriber that holds on to its reply handle without
/// answering stalls the chain unless `timeout` is set.
pub async fn reply_chain<P>(
    subscribers: Vec<Subscriber<P>>,
    route: String,
    payload: P,
    timeout: Option<Duration>,
) -> ChainResult<P> {
    let mut acc = payload;

    for subscriber in &subscribers {
        let (reply, rx) = Reply::channel();
        invoke(subscriber, Delivery::new(route.as_str(), acc, reply))?;

        let answer = match timeout {
            Some(after) => tokio::time::timeout(after, rx).await.map_err(|_| {
                DispatchError::TimedOut {
                    id: subscriber.id().clone(),
                    after,
                }
            })?,
            None => rx.await,
        };

        acc = match answer {
            Ok(Ok(value)) => value,
            Ok(Err(source)) => {
                return Err(DispatchError::Subscriber {
                    id: subscriber.id().clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(DispatchError::ReplyDropped {
                    id: subscriber.id().clone(),
                })
            }
        };
    }

    debug!(target: "blipbus::dispatch", route = %route, steps = subscribers.len(), "reply chain complete");
    Ok(acc)
}

fn invoke<P>(subscriber: &Subscriber<P>, delivery: Delivery<P>) -> Result<(), DispatchError> {
    let handler = subscriber.handler();
    match catch_unwind(AssertUnwindSafe(|| handler(delivery))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(DispatchError::Subscriber {
            id: subscriber.id().clone(),
            source,
        }),
        Err(_) => Err(DispatchError::Panicked {
            id: subscriber.id().clone(),
        }),
    }
}
