//! Tests for error types

use prometheus_batch_scheduler::core::{ItemError, SchedulerError};
use std::time::Duration;

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("worker_count must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: worker_count must be greater than 0"
    );
}

#[test]
fn test_parse_error() {
    let err = SchedulerError::Parse("expected value".to_string());
    assert_eq!(format!("{}", err), "parse error: expected value");
}

#[test]
fn test_worker_spawn_error_has_source() {
    let io = std::io::Error::new(std::io::ErrorKind::Other, "no threads left");
    let err = SchedulerError::WorkerSpawn(io);
    assert_eq!(format!("{}", err), "failed to spawn worker thread: no threads left");
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_item_errors() {
    assert_eq!(
        format!("{}", ItemError::Panicked("index out of bounds".into())),
        "panicked: index out of bounds"
    );
    assert_eq!(format!("{}", ItemError::Cancelled), "cancelled by runtime");
    assert!(ItemError::TimedOut(Duration::from_millis(5)).is_timeout());
    assert!(!ItemError::UnknownFunction("f".into()).is_timeout());
}
