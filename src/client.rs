//! The observability client used around each agent invocation.

use opentelemetry::trace::get_active_span;
use opentelemetry_sdk::trace::Tracer;
use std::future::Future;
use std::sync::Arc;

use crate::attributes::Attributes;
use crate::config::ObservabilityConfig;
use crate::observability::logs::LogEmitter;
use crate::observability::metrics::RunMetrics;
use crate::run::RunRecord;
use crate::span::{self, SpanHandle, SpanScope};
use crate::telemetry::{bootstrap, Telemetry};
use crate::timer::{self, Timed};

/// Span, timer, annotation and run-record helpers for one service.
///
/// Cheap to clone; clones share the same providers.
#[derive(Clone)]
pub struct Observability {
    service_name: String,
    telemetry: Arc<Telemetry>,
    tracer: Tracer,
    metrics: Option<RunMetrics>,
    logs: Option<Arc<LogEmitter>>,
}

impl Observability {
    /// Bootstrap process telemetry from the environment and build a client.
    ///
    /// Must be called inside a Tokio runtime for spans to be exported.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self::from_config(&ObservabilityConfig::from_env(service_name))
    }

    /// Bootstrap process telemetry from `config` and build a client.
    pub fn from_config(config: &ObservabilityConfig) -> Self {
        let telemetry = bootstrap(config);
        Self::with_telemetry(config.service_name.clone(), telemetry)
    }

    /// Build a client over existing telemetry without touching process globals.
    pub fn with_telemetry(service_name: impl Into<String>, telemetry: Arc<Telemetry>) -> Self {
        let mut service_name = service_name.into();
        if service_name.trim().is_empty() {
            service_name = telemetry.identity().service_name().to_string();
        }

        Self {
            tracer: telemetry.tracer(&service_name),
            metrics: telemetry.run_metrics(),
            logs: telemetry.log_emitter(&service_name).map(Arc::new),
            service_name,
            telemetry,
        }
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    #[must_use]
    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }

    /// Open a span as a child of the active one and make it current.
    ///
    /// The span ends when the returned scope is dropped.
    pub fn span(&self, name: impl Into<String>, attributes: &Attributes) -> SpanScope {
        SpanScope::enter(span::start_span(&self.tracer, name.into(), attributes))
    }

    /// Run `f` inside a span that ends when `f` returns or unwinds.
    pub fn in_span<T>(
        &self,
        name: impl Into<String>,
        attributes: &Attributes,
        f: impl FnOnce(&SpanHandle) -> T,
    ) -> T {
        let scope = self.span(name, attributes);
        let handle = scope.handle();
        f(&handle)
    }

    /// Async form of [`in_span`](Self::in_span).
    ///
    /// The span's context is attached on every poll of the returned future, so
    /// concurrent invocations on the same thread keep separate parents. The
    /// span also ends if the future is dropped before completion.
    pub async fn in_span_async<F, Fut>(
        &self,
        name: impl Into<String>,
        attributes: &Attributes,
        f: F,
    ) -> Fut::Output
    where
        F: FnOnce(SpanHandle) -> Fut,
        Fut: Future,
    {
        let cx = span::start_span(&self.tracer, name.into(), attributes);
        span::run_in_span(cx, f).await
    }

    /// Time a block with a monotonic clock.
    pub fn timed<T>(&self, f: impl FnOnce() -> T) -> Timed<T> {
        timer::timed(f)
    }

    /// Time a future with a monotonic clock.
    pub async fn timed_async<F: Future>(&self, fut: F) -> Timed<F::Output> {
        timer::timed_async(fut).await
    }

    /// Add an event to the active span and write the same message as a log line.
    ///
    /// The log line is written even when no span is active or recording.
    pub fn annotate(&self, message: &str, attributes: &Attributes) {
        get_active_span(|span| {
            if span.is_recording() {
                span.add_event(message.to_string(), attributes.to_key_values());
            }
        });

        tracing::info!(
            service = %self.service_name,
            attributes = %attributes,
            "{message}"
        );

        if let Some(logs) = &self.logs {
            logs.emit(message, attributes);
        }
    }

    /// Log (and, when enabled, meter) one finished invocation.
    ///
    /// Never fails; export problems stay inside the batching exporters.
    pub fn record_run(&self, run: &RunRecord) {
        let attributes = run.merged_attributes();

        if let Some(metrics) = &self.metrics {
            metrics.record(run.latency_ms, run.tokens, &attributes.to_key_values());
        }

        tracing::info!(
            service = %self.service_name,
            latency_ms = run.latency_ms,
            tokens = run.tokens,
            success = run.success,
            attributes = %attributes,
            "agent_run_complete"
        );

        if let Some(logs) = &self.logs {
            let mut fields = attributes;
            fields.insert("latency_ms", run.latency_ms);
            if let Some(tokens) = run.tokens {
                fields.insert("tokens", tokens);
            }
            logs.emit("agent_run_complete", &fields);
        }
    }

    /// Flush buffered telemetry and shut the providers down.
    pub fn shutdown(&self) {
        self.telemetry.shutdown();
    }
}

impl std::fmt::Debug for Observability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observability")
            .field("service_name", &self.service_name)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}
