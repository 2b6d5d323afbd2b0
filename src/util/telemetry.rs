//! Telemetry helpers for structured logging and tracing.

/// Initialize tracing. Callers can install their own subscriber; this helper
/// installs a default env-filtered fmt subscriber if none is set, so dropped
/// work items show up under `RUST_LOG=prometheus_batch_scheduler=warn`.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_thread_names(true)
        .try_init();
}
