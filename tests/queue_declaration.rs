#[path = "common.rs"]
mod common;

use blipbus::{QueueConfig, RouterError};

#[test]
fn publish_requires_a_declared_queue() {
    let router = common::router::<&str>();
    assert!(matches!(
        router.publish("test", "test_key", "hey"),
        Err(RouterError::QueueNotFound(name)) if name == "test"
    ));

    router.declare("test", QueueConfig::default()).unwrap();
    router.publish("test", "test_key", "hey").unwrap();
}

#[test]
fn subscribe_requires_a_declared_queue() {
    let router = common::router::<&str>();
    let seen = common::seen();
    assert!(matches!(
        router.subscribe("test", "test_key", common::record(&seen, 1), None),
        Err(RouterError::QueueNotFound(_))
    ));

    router.declare("test", QueueConfig::default()).unwrap();
    router
        .subscribe("test", "test_key", common::record(&seen, 1), None)
        .unwrap();
}

#[test]
fn destroyed_queue_rejects_publishes() {
    let router = common::router::<&str>();
    router.declare("test", QueueConfig::default()).unwrap();
    assert!(router.destroy("test"));
    assert!(!router.is_declared("test"));
    assert!(router.publish("test", "test_key", "hey").is_err());

    // destroying again is a no-op
    assert!(!router.destroy("test"));
}

#[test]
fn duplicate_names_are_rejected() {
    let router = common::router::<&str>();
    router.declare("test", QueueConfig::default()).unwrap();
    assert!(matches!(
        router.declare("test", QueueConfig::topic()),
        Err(RouterError::AlreadyExists(_))
    ));
}

#[test]
fn invalid_configuration_is_rejected() {
    let router = common::router::<&str>();
    assert!(matches!(
        router.declare("test", QueueConfig::default().durable(true).max_retries(0)),
        Err(RouterError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        router.declare("", QueueConfig::default()),
        Err(RouterError::InvalidConfiguration(_))
    ));
    assert!(!router.is_declared("test"));
}

#[test]
fn destroy_drops_subscriptions_and_allows_redeclare() {
    let router = common::router::<&str>();
    let seen = common::seen();
    router.declare("test", QueueConfig::default()).unwrap();
    let sub = router
        .subscribe("test", "test_key", common::record(&seen, 1), None)
        .unwrap();

    router.destroy("test");
    assert!(!router.unsubscribe(sub.id().unwrap()));

    router.declare("test", QueueConfig::topic()).unwrap();
    router.publish("test", "test_key", "hey").unwrap();
    assert!(common::snapshot(&seen).is_empty());
}

#[test]
fn queues_lists_a_snapshot() {
    let router = common::router::<&str>();
    let seen = common::seen();
    router.declare("b", QueueConfig::topic()).unwrap();
    router.declare("a", QueueConfig::default().durable(true)).unwrap();
    router.subscribe("b", vec!["x.*", "#"], common::record(&seen, 1), None).unwrap();
    router.publish("a", "nobody", "hey").unwrap();

    let infos = router.queues();
    let names: Vec<&str> = infos.iter().map(|q| q.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(infos[0].pending, 1);
    assert_eq!(infos[1].patterns, ["x.*", "#"]);
    assert_eq!(infos[1].subscribers, 2);
}

#[test]
fn routers_are_isolated() {
    let one = common::router::<&str>();
    let two = common::router::<&str>();
    one.declare("test", QueueConfig::default()).unwrap();
    assert!(!two.is_declared("test"));
    two.declare("test", QueueConfig::default()).unwrap();
}
