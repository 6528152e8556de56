#[path = "common.rs"]
mod common;

use std::time::Duration;

use tokio::sync::mpsc;

use blipbus::{ChainResult, Delivery, DispatchError, PublishOptions, QueueConfig, RouterError};

fn collector<P: Send + 'static>() -> (
    PublishOptions<P>,
    mpsc::UnboundedReceiver<ChainResult<P>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let options = PublishOptions::new().with_callback(move |result| {
        let _ = tx.send(result);
    });
    (options, rx)
}

#[tokio::test]
async fn subscribers_fold_the_payload_in_order() {
    let router = common::router::<Vec<String>>();
    router.declare("test", QueueConfig::default()).unwrap();
    for label in ["subscriber 1", "subscriber 2", "subscriber 3"] {
        router
            .subscribe("test", "test_key", common::append(label.to_string()), None)
            .unwrap();
    }

    let (options, mut rx) = collector();
    router
        .publish_with("test", "test_key", vec!["initial message".to_string()], options)
        .unwrap();

    let result = rx.recv().await.unwrap().unwrap();
    assert_eq!(
        result,
        ["initial message", "subscriber 1", "subscriber 2", "subscriber 3"]
    );
}

#[tokio::test]
async fn each_matching_group_calls_back_once() {
    let router = common::router::<Vec<&str>>();
    router.declare("test", QueueConfig::topic()).unwrap();
    router.subscribe("test", "a.*", common::append("star"), None).unwrap();
    router.subscribe("test", "a.b", common::append("exact"), None).unwrap();
    router.subscribe("test", "a.b", common::append("exact again"), None).unwrap();

    let (options, mut rx) = collector();
    router.publish_with("test", "a.b", Vec::new(), options).unwrap();
    common::settle().await;

    let mut results = Vec::new();
    while let Ok(result) = rx.try_recv() {
        results.push(result.unwrap());
    }
    results.sort();
    assert_eq!(results, [vec!["exact", "exact again"], vec!["star"]]);
}

#[tokio::test]
async fn async_reply_is_awaited() {
    let router = common::router::<u64>();
    router.declare("test", QueueConfig::default()).unwrap();
    router
        .subscribe(
            "test",
            "k",
            |delivery: Delivery<u64>| -> anyhow::Result<()> {
                let (_, value, reply) = delivery.into_parts();
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    reply.send(value * 10);
                });
                Ok(())
            },
            None,
        )
        .unwrap();
    router
        .subscribe(
            "test",
            "k",
            |delivery: Delivery<u64>| -> anyhow::Result<()> {
                let next = delivery.payload() + 1;
                delivery.reply(next);
                Ok(())
            },
            None,
        )
        .unwrap();

    let (options, mut rx) = collector();
    router.publish_with("test", "k", 4, options).unwrap();
    assert_eq!(rx.recv().await.unwrap().unwrap(), 41);
}

#[tokio::test]
async fn failing_subscriber_stops_the_chain() {
    let router = common::router::<Vec<&str>>();
    let seen = common::seen();
    router.declare("test", QueueConfig::default()).unwrap();
    router.subscribe("test", "k", common::append("first"), None).unwrap();
    let failing = router
        .subscribe(
            "test",
            "k",
            |delivery: Delivery<Vec<&str>>| -> anyhow::Result<()> {
                delivery.fail(anyhow::anyhow!("rejected"));
                Ok(())
            },
            None,
        )
        .unwrap();
    router.subscribe("test", "k", common::record(&seen, 3), None).unwrap();

    let (options, mut rx) = collector();
    router.publish_with("test", "k", Vec::new(), options).unwrap();

    let err = rx.recv().await.unwrap().unwrap_err();
    assert!(matches!(err, DispatchError::Subscriber { .. }));
    assert_eq!(err.subscription_id(), failing.id().unwrap());
    assert!(common::snapshot(&seen).is_empty());
}

#[tokio::test]
async fn dropped_reply_is_reported() {
    let router = common::router::<u8>();
    router.declare("test", QueueConfig::default()).unwrap();
    router
        .subscribe("test", "k", |_: Delivery<u8>| -> anyhow::Result<()> { Ok(()) }, None)
        .unwrap();

    let (options, mut rx) = collector();
    router.publish_with("test", "k", 1, options).unwrap();
    assert!(matches!(
        rx.recv().await.unwrap(),
        Err(DispatchError::ReplyDropped { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn stalled_chain_times_out() {
    let router = common::router::<u8>();
    let (park, _keep) = mpsc::unbounded_channel();
    router.declare("test", QueueConfig::default()).unwrap();
    router
        .subscribe(
            "test",
            "k",
            move |delivery: Delivery<u8>| -> anyhow::Result<()> {
                let _ = park.send(delivery);
                Ok(())
            },
            None,
        )
        .unwrap();

    let (options, mut rx) = collector();
    router
        .publish_with("test", "k", 1, options.reply_timeout(Duration::from_millis(50)))
        .unwrap();

    match rx.recv().await.unwrap() {
        Err(DispatchError::TimedOut { after, .. }) => assert_eq!(after, Duration::from_millis(50)),
        other => panic!("expected a timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn multi_route_publish_dispatches_each_key() {
    let router = common::router::<Vec<&str>>();
    router.declare("test", QueueConfig::default()).unwrap();
    router.subscribe("test", "a", common::append("a"), None).unwrap();
    router.subscribe("test", "b", common::append("b"), None).unwrap();

    let (options, mut rx) = collector();
    router.publish_with("test", ["a", "b", "c"], Vec::new(), options).unwrap();
    common::settle().await;

    let mut results = Vec::new();
    while let Ok(result) = rx.try_recv() {
        results.extend(result.unwrap());
    }
    results.sort();
    assert_eq!(results, ["a", "b"]);
}

#[test]
fn reply_chain_needs_a_runtime() {
    let router = common::router::<u8>();
    router.declare("test", QueueConfig::default()).unwrap();
    let options = PublishOptions::new().with_callback(|_| {});
    assert!(matches!(
        router.publish_with("test", "k", 1, options),
        Err(RouterError::RuntimeUnavailable)
    ));
}
