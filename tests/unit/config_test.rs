//! Tests for configuration validation and loading

use prometheus_batch_scheduler::config::SchedulerConfig;
use prometheus_batch_scheduler::core::SchedulerError;
use serde_json::json;
use std::time::Duration;

#[test]
fn test_scheduler_config_validation() {
    let valid = SchedulerConfig::new()
        .with_worker_count(4)
        .with_max_batch_size(8);
    assert!(valid.validate().is_ok());
}

#[test]
fn test_scheduler_config_invalid_worker_count() {
    let invalid = SchedulerConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_batch_size() {
    let invalid = SchedulerConfig::new().with_max_batch_size(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_builder_sets_every_field() {
    let cfg = SchedulerConfig::new()
        .with_worker_count(3)
        .with_max_batch_size(10)
        .with_total_expected_items(500)
        .with_description("scoring")
        .with_per_item_timeout_ms(250)
        .with_extra_argument(json!({"model": "small"}))
        .with_progress(true);

    assert_eq!(cfg.worker_count, 3);
    assert_eq!(cfg.max_batch_size, 10);
    assert_eq!(cfg.total_expected_items, Some(500));
    assert_eq!(cfg.description, "scoring");
    assert_eq!(cfg.per_item_timeout(), Some(Duration::from_millis(250)));
    assert_eq!(cfg.extra_argument, Some(json!({"model": "small"})));
    assert!(cfg.progress_enabled);
}

#[test]
fn test_config_from_json() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{
            "worker_count": 2,
            "max_batch_size": 16,
            "per_item_timeout_ms": 1000,
            "description": "resize images"
        }"#,
    )
    .unwrap();

    assert_eq!(cfg.worker_count, 2);
    assert_eq!(cfg.max_batch_size, 16);
    assert_eq!(cfg.per_item_timeout(), Some(Duration::from_secs(1)));
    assert_eq!(cfg.description, "resize images");
    assert!(!cfg.progress_enabled);
}

#[test]
fn test_config_from_json_rejects_invalid() {
    let err = SchedulerConfig::from_json_str(r#"{"worker_count": 0}"#).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));

    let err = SchedulerConfig::from_json_str("not json").unwrap_err();
    assert!(matches!(err, SchedulerError::Parse(_)));
}

#[test]
fn test_config_json_roundtrip_keeps_extra_argument() {
    let cfg = SchedulerConfig::new()
        .with_worker_count(1)
        .with_extra_argument(json!([1, 2, 3]));
    let text = serde_json::to_string(&cfg).unwrap();
    assert_eq!(SchedulerConfig::from_json_str(&text).unwrap(), cfg);
}
