//! OTLP metrics for agent runs.
//!
//! Key metrics:
//! - agent_runs_total: Counter of agent invocations
//! - agent_latency_ms: Histogram of end-to-end latency
//! - agent_tokens_total: Counter of tokens consumed
//!
//! All three are tagged with the run's merged attributes so they aggregate
//! by framework, model and error type.

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;
use opentelemetry_otlp::{HttpExporterBuilder, WithExportConfig};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::runtime::{self, Runtime};
use opentelemetry_sdk::Resource;
use std::time::Duration;

use super::BatchRuntime;
use crate::config::{ExporterConfig, Signal};
use crate::error::ObservabilityError;

/// Instruments updated once per recorded run.
#[derive(Debug, Clone)]
pub struct RunMetrics {
    /// Total number of agent invocations.
    pub runs_total: Counter<u64>,
    /// End-to-end invocation latency in milliseconds.
    pub latency_ms: Histogram<f64>,
    /// Total tokens reported by invocations.
    pub tokens_total: Counter<u64>,
}

impl RunMetrics {
    /// Create the run instruments from a meter.
    pub fn new(meter: &Meter) -> Self {
        Self {
            runs_total: meter
                .u64_counter("agent_runs_total")
                .with_description("Count of agent invocations")
                .with_unit("1")
                .init(),
            latency_ms: meter
                .f64_histogram("agent_latency_ms")
                .with_description("End-to-end latency (ms)")
                .with_unit("ms")
                .init(),
            tokens_total: meter
                .u64_counter("agent_tokens_total")
                .with_description("Total tokens consumed")
                .with_unit("1")
                .init(),
        }
    }

    /// Record one run.
    pub fn record(&self, latency_ms: f64, tokens: Option<u64>, attributes: &[KeyValue]) {
        self.runs_total.add(1, attributes);
        self.latency_ms.record(latency_ms, attributes);
        if let Some(tokens) = tokens {
            self.tokens_total.add(tokens, attributes);
        }
    }
}

/// Build a meter provider that periodically pushes to `{endpoint}/v1/metrics`.
///
/// # Arguments
///
/// * `exporter` - Endpoint and headers
/// * `resource` - Service identity resource
/// * `interval` - Export period
/// * `batch_runtime` - Where the periodic reader runs
pub fn build_meter_provider(
    exporter: &ExporterConfig,
    resource: Resource,
    interval: Duration,
    batch_runtime: BatchRuntime,
) -> Result<SdkMeterProvider, ObservabilityError> {
    let metrics_exporter = opentelemetry_otlp::new_exporter()
        .http()
        .with_endpoint(exporter.signal_url(Signal::Metrics))
        .with_headers(exporter.headers().clone());

    match batch_runtime {
        BatchRuntime::MultiThread => {
            periodic_pipeline(runtime::Tokio, metrics_exporter, resource, interval)
        }
        BatchRuntime::CurrentThread => {
            periodic_pipeline(runtime::TokioCurrentThread, metrics_exporter, resource, interval)
        }
    }
}

fn periodic_pipeline<R: Runtime>(
    rt: R,
    metrics_exporter: HttpExporterBuilder,
    resource: Resource,
    interval: Duration,
) -> Result<SdkMeterProvider, ObservabilityError> {
    opentelemetry_otlp::new_pipeline()
        .metrics(rt)
        .with_exporter(metrics_exporter)
        .with_resource(resource)
        .with_period(interval)
        .build()
        .map_err(|e| ObservabilityError::exporter(Signal::Metrics.as_str(), e))
}
