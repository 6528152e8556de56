#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use blipbus::{Delivery, Router};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        blipbus::logging::init_logging();
    });
}

/// Lets every task spawned so far (and whatever those spawn) run to
/// completion before the test continues.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Shared log that handlers append to.
pub type Seen<T> = Arc<Mutex<Vec<T>>>;

pub fn seen<T>() -> Seen<T> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn snapshot<T: Clone>(seen: &Seen<T>) -> Vec<T> {
    seen.lock().unwrap().clone()
}

/// Handler that records `label` for every delivery.
pub fn record<P>(
    seen: &Seen<i64>,
    label: i64,
) -> impl Fn(Delivery<P>) -> anyhow::Result<()> + Send + Sync + 'static {
    let seen = Arc::clone(seen);
    move |_delivery: Delivery<P>| {
        seen.lock().unwrap().push(label);
        Ok(())
    }
}

/// Reply-chain handler that appends `label` to the accumulator.
pub fn append<T: Clone + Send + Sync + 'static>(
    label: T,
) -> impl Fn(Delivery<Vec<T>>) -> anyhow::Result<()> + Send + Sync + 'static {
    move |mut delivery: Delivery<Vec<T>>| {
        delivery.payload_mut().push(label.clone());
        delivery.forward();
        Ok(())
    }
}

pub fn router<P: Clone + Send + 'static>() -> Router<P> {
    init_logging();
    Router::new()
}
