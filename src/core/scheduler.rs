//! Deferred execution on the ambient tokio runtime.
//!
//! "Next tick" work (redelivery checks, redelivery publishes, reply-chain
//! folds) is spawned as a task so it never runs on the caller's stack.

use std::future::Future;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::core::error::RouterError;

/// Returns the current runtime handle, or `RuntimeUnavailable`.
pub fn current() -> Result<Handle, RouterError> {
    Handle::try_current().map_err(|_| RouterError::RuntimeUnavailable)
}

/// Schedules `task` for a later tick.
pub fn defer<F>(task: F) -> Result<JoinHandle<()>, RouterError>
where
    F: Future<Output = ()> + Send + 'static,
{
    current().map(|handle| handle.spawn(task))
}
