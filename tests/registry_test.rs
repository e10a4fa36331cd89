//! Integration tests for the filter registry.
//!
//! These exercise instance sharing, concurrent attachment and the
//! unregistration guarantees around shutdown.

use logbeat_filter::{
    Endpoint, Event, FilterError, FilterRegistry, FilterStageConfig, FilterTaskConfig, RuleCondition,
    RuleGroup,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn channel_factory(config: &FilterTaskConfig) -> anyhow::Result<Endpoint> {
    Ok(Endpoint::channel(config.processor_id.clone(), 16).0)
}

fn consumer(filter_id: &str, processor_id: &str, column: i64) -> FilterTaskConfig {
    FilterTaskConfig::new(filter_id, processor_id)
        .with_delimiter(",")
        .with_group(RuleGroup::new(vec![RuleCondition::new(column, "eq", "x")]))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_get_or_create_shares_one_instance() {
    init_tracing();
    let registry = FilterRegistry::new();
    let consumers = 32;

    let tasks: Vec<_> = (0..consumers)
        .map(|i| {
            let registry = registry.clone();
            tokio::spawn(async move {
                let config = consumer("shared", &format!("proc-{}", i), (i % 7 + 1) as i64);
                registry.get_or_create(&config, &channel_factory).unwrap()
            })
        })
        .collect();

    let mut instances = Vec::new();
    for task in tasks {
        instances.push(task.await.unwrap());
    }

    let first = &instances[0];
    assert!(instances.iter().all(|instance| Arc::ptr_eq(instance, first)));
    assert_eq!(registry.len(), 1);
    assert_eq!(first.consumer_ids().len(), consumers);
    assert_eq!(first.endpoint_count(), consumers);
    assert_eq!(first.max_column_index(), 7);
    assert_eq!(registry.metrics().live_instances(), 1);

    registry.shutdown_and_wait().await;
}

#[tokio::test]
async fn test_distinct_filter_ids_get_distinct_instances() {
    let registry = FilterRegistry::new();
    let a = registry
        .get_or_create(&consumer("a", "p", 1), &channel_factory)
        .unwrap();
    let b = registry
        .get_or_create(&consumer("b", "p", 1), &channel_factory)
        .unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_ne!(a.generation(), b.generation());
    assert_eq!(registry.filter_ids(), vec!["a", "b"]);
    assert_eq!(registry.metrics().live_instances(), 2);

    registry.shutdown_and_wait().await;
    assert_eq!(registry.metrics().live_instances(), 0);
}

#[tokio::test]
async fn test_first_delimiter_wins() {
    let registry = FilterRegistry::new();
    let instance = registry
        .get_or_create(&consumer("f", "p1", 1), &channel_factory)
        .unwrap();
    registry
        .get_or_create(
            &FilterTaskConfig::new("f", "p2").with_delimiter("|"),
            &channel_factory,
        )
        .unwrap();

    assert_eq!(instance.delimiter(), ",");
    assert_eq!(instance.consumer_ids(), vec!["p1", "p2"]);
}

#[tokio::test]
async fn test_construction_failure_is_propagated() {
    let registry = FilterRegistry::new();
    let failing = |config: &FilterTaskConfig| -> anyhow::Result<Endpoint> {
        anyhow::bail!("output for {} is not configured", config.processor_id)
    };

    let err = registry
        .get_or_create(&consumer("f", "proc-1", 1), &failing)
        .unwrap_err();

    match &err {
        FilterError::Construction { consumer_id, source } => {
            assert_eq!(consumer_id, "proc-1");
            assert!(source.to_string().contains("not configured"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(registry.lookup("f").is_none());
    assert_eq!(registry.metrics().live_instances(), 0);
}

#[tokio::test]
async fn test_invalid_regex_key_is_rejected() {
    let registry = FilterRegistry::new();
    let config = FilterTaskConfig::new("f", "p")
        .with_delimiter(",")
        .with_group(RuleGroup::new(vec![RuleCondition::new(1, "regex", "(unclosed")]));

    let err = registry.get_or_create(&config, &channel_factory).unwrap_err();
    assert!(matches!(err, FilterError::InvalidRegex(_)));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_remerge_replaces_consumer_rules() {
    let registry = FilterRegistry::new();
    let instance = registry
        .get_or_create(&consumer("f", "p1", 4), &channel_factory)
        .unwrap();
    registry
        .get_or_create(&consumer("f", "p1", 1), &channel_factory)
        .unwrap();

    assert_eq!(instance.consumer_ids(), vec!["p1"]);
    assert_eq!(instance.endpoint_count(), 1);
    assert_eq!(instance.rule_set("p1").unwrap().max_column_index, 1);
    // The shared split width never shrinks.
    assert_eq!(instance.max_column_index(), 4);
    // Both owners stay accounted for.
    assert_eq!(instance.routes().owners["p1"].len(), 2);
}

#[tokio::test]
async fn test_shutdown_removes_instance() {
    init_tracing();
    let registry = FilterRegistry::new();
    let instance = registry
        .get_or_create(&consumer("f", "p1", 1), &channel_factory)
        .unwrap();

    instance.shutdown();
    timeout(Duration::from_secs(5), instance.stopped())
        .await
        .expect("dispatch loop did not stop");

    assert!(!instance.is_running());
    assert!(registry.lookup("f").is_none());
    assert_eq!(registry.metrics().live_instances(), 0);
}

#[tokio::test]
async fn test_recreate_after_shutdown() {
    let registry = FilterRegistry::new();
    let old = registry
        .get_or_create(&consumer("f", "p1", 1), &channel_factory)
        .unwrap();
    old.shutdown();
    old.stopped().await;

    let new = registry
        .get_or_create(&consumer("f", "p2", 2), &channel_factory)
        .unwrap();
    assert!(!Arc::ptr_eq(&old, &new));
    assert!(new.is_running());
    assert_eq!(new.consumer_ids(), vec!["p2"]);
    assert_eq!(registry.metrics().live_instances(), 1);
}

#[tokio::test]
async fn test_dying_instance_does_not_unregister_successor() {
    let registry = FilterRegistry::new();
    let old = registry
        .get_or_create(&consumer("f", "p1", 1), &channel_factory)
        .unwrap();

    // Ask the old loop to stop, but register again before it has exited.
    old.shutdown();
    let new = registry
        .get_or_create(&consumer("f", "p1", 1), &channel_factory)
        .unwrap();

    old.stopped().await;
    let current = registry.lookup("f").expect("successor must stay registered");
    assert!(Arc::ptr_eq(&current, &new));
    assert!(new.is_running());
    // Only the old loop's count went away.
    assert_eq!(registry.metrics().live_instances(), 1);
}

#[test]
fn test_dropped_runtime_unregisters_instance() {
    init_tracing();
    let registry = FilterRegistry::new();

    let first = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let orphaned = {
        let _enter = first.enter();
        registry
            .get_or_create(&consumer("f", "p1", 1), &channel_factory)
            .unwrap()
    };
    assert_eq!(registry.metrics().live_instances(), 1);

    // The dispatch task is dropped with its runtime without ever finishing.
    drop(first);
    assert!(registry.lookup("f").is_none());
    assert_eq!(registry.metrics().live_instances(), 0);
    assert!(!orphaned.is_running());

    let second = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    second.block_on(async {
        let (endpoint, mut rx) = Endpoint::channel("task-2", 4);
        let factory =
            move |_: &FilterTaskConfig| -> anyhow::Result<Endpoint> { Ok(endpoint.clone()) };
        let config = FilterTaskConfig::new("f", "p1").with_delimiter(",");
        let instance = registry.get_or_create(&config, &factory).unwrap();
        assert!(!Arc::ptr_eq(&instance, &orphaned));

        instance
            .input()
            .send(Event::from_line("data", "a,b"))
            .await
            .unwrap();
        let delivered = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event");
        assert!(delivered.is_some());

        registry.shutdown_and_wait().await;
    });
    assert_eq!(registry.metrics().live_instances(), 0);
}

#[tokio::test]
async fn test_shutdown_and_wait_covers_instances_created_after_shutdown() {
    let registry = FilterRegistry::new();
    registry
        .get_or_create(&consumer("a", "p", 1), &channel_factory)
        .unwrap();
    registry.shutdown();
    let late = registry
        .get_or_create(&consumer("b", "p", 1), &channel_factory)
        .unwrap();
    assert!(late.is_shutting_down());

    timeout(Duration::from_secs(5), registry.shutdown_and_wait())
        .await
        .expect("shutdown_and_wait did not return");
    assert!(registry.is_empty());
    assert!(!late.is_running());
    assert_eq!(registry.metrics().live_instances(), 0);
}

#[tokio::test]
async fn test_dropping_registry_stops_instances() {
    let registry = FilterRegistry::new();
    let instance = registry
        .get_or_create(&consumer("f", "p1", 1), &channel_factory)
        .unwrap();
    let metrics = registry.metrics().clone();

    drop(registry);
    timeout(Duration::from_secs(5), instance.stopped())
        .await
        .expect("dispatch loop did not stop");
    assert_eq!(metrics.live_instances(), 0);
}

#[tokio::test]
async fn test_stage_config_applies_to_instances() {
    let config = FilterStageConfig::default().with_raw_field("message");
    let registry = FilterRegistry::with_config(config).unwrap();
    let instance = registry
        .get_or_create(&consumer("f", "p1", 1), &channel_factory)
        .unwrap();

    assert_eq!(instance.raw_field(), "message");
}
