//! Tests for progress sinks

use prometheus_batch_scheduler::core::{CountingProgress, LogProgress, NoProgress, ProgressSink};

#[test]
fn test_sinks_are_object_safe() {
    let counting = CountingProgress::new();
    let mut sinks: Vec<Box<dyn ProgressSink>> = vec![
        Box::new(NoProgress),
        Box::new(LogProgress::new("batch", Some(10))),
        Box::new(counting.clone()),
    ];

    for sink in &mut sinks {
        sink.advance(4);
        sink.advance(6);
        sink.close();
    }

    assert_eq!(counting.advanced(), 10);
    assert!(counting.is_closed());
}
