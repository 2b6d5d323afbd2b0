//! Tests for the process-wide scheduler registry

use prometheus_batch_scheduler::config::SchedulerConfig;
use prometheus_batch_scheduler::core::{FunctionTable, Scheduler, SchedulerRegistry};

#[test]
fn test_scheduler_lifetime_brackets_registration() {
    let functions = FunctionTable::<u32>::new();
    let scheduler = Scheduler::new(SchedulerConfig::new().with_worker_count(1), functions).unwrap();
    let id = scheduler.id();

    assert!(SchedulerRegistry::global().contains(id));
    assert!(scheduler.wait().is_empty());
    assert!(!SchedulerRegistry::global().contains(id));
}

#[test]
fn test_distinct_schedulers_get_distinct_ids() {
    let a = Scheduler::new(SchedulerConfig::new().with_worker_count(1), FunctionTable::<u32>::new()).unwrap();
    let b = Scheduler::new(SchedulerConfig::new().with_worker_count(1), FunctionTable::<u32>::new()).unwrap();
    assert_ne!(a.id(), b.id());
}
