//! Process-wide bootstrap tests.
//!
//! Bootstrap mutates process globals, so everything runs in one test inside
//! its own test binary.

use agent_observe::telemetry::global_telemetry;
use agent_observe::{console_handler_count, Attributes, Observability, ObservabilityConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn config(service_name: &str) -> ObservabilityConfig {
    ObservabilityConfig::new(service_name)
        // Nothing listens here; exports fail quietly in the background.
        .with_endpoint("http://127.0.0.1:1/")
        .with_instance_id("bootstrap-test")
        .with_shutdown_timeout(Duration::from_millis(500))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bootstrap_is_idempotent() {
    assert!(global_telemetry().is_none());

    let first = Observability::from_config(&config("crewai-agent"));
    let second = Observability::from_config(&config("langgraph-agent"));

    // Providers and the console handler are created once.
    assert!(Arc::ptr_eq(first.telemetry(), second.telemetry()));
    assert_eq!(console_handler_count(), 1);

    // The first bootstrap fixes the resource identity.
    let telemetry = global_telemetry().expect("bootstrap did not register telemetry");
    assert_eq!(telemetry.identity().service_name(), "crewai-agent");
    assert_eq!(telemetry.identity().instance_id(), "bootstrap-test");
    assert!(!telemetry.metrics_enabled());
    assert!(!telemetry.logs_enabled());

    // Clients still tag their own log lines.
    assert_eq!(second.service_name(), "langgraph-agent");

    first.in_span("crew.run", &Attributes::new(), |handle| {
        first.annotate("crew_start", &Attributes::new().with("prompt", "hi"));
        assert!(!handle.is_ended());
    });

    // Shutdown is bounded even with an unreachable collector.
    let started = Instant::now();
    tokio::task::spawn_blocking(agent_observe::shutdown)
        .await
        .expect("shutdown panicked");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(telemetry.is_shut_down());

    // A second shutdown is a no-op.
    agent_observe::shutdown();
    second.shutdown();
    assert!(telemetry.is_shut_down());
}
