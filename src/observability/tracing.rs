//! OpenTelemetry tracing setup.
//!
//! Configures:
//! - OTLP/HTTP span export through the batch span processor
//! - Console logging with structured format, installed once per process
//! - A `tracing-opentelemetry` bridge so `tracing` spans join the same traces

use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{self as sdktrace, Tracer, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use super::BatchRuntime;
use crate::config::{ExporterConfig, LogFormat, Signal};
use crate::error::ObservabilityError;

/// Whether this process installed the console handler.
static CONSOLE_HANDLER: OnceLock<bool> = OnceLock::new();

/// Build a tracer provider exporting batches to `{endpoint}/v1/traces`.
///
/// The batch processor's flush loop runs wherever `batch_runtime` says.
pub fn build_tracer_provider(
    exporter: &ExporterConfig,
    resource: Resource,
    batch_runtime: BatchRuntime,
) -> Result<TracerProvider, ObservabilityError> {
    let span_exporter = opentelemetry_otlp::new_exporter()
        .http()
        .with_endpoint(exporter.signal_url(Signal::Traces))
        .with_headers(exporter.headers().clone())
        .build_span_exporter()
        .map_err(|e| ObservabilityError::exporter(Signal::Traces.as_str(), e))?;

    let builder =
        TracerProvider::builder().with_config(sdktrace::Config::default().with_resource(resource));
    let builder = match batch_runtime {
        BatchRuntime::MultiThread => builder.with_batch_exporter(span_exporter, runtime::Tokio),
        BatchRuntime::CurrentThread => {
            builder.with_batch_exporter(span_exporter, runtime::TokioCurrentThread)
        }
    };
    Ok(builder.build())
}

/// Tracer provider with no exporter; spans are created but never shipped.
pub fn local_tracer_provider(resource: Resource) -> TracerProvider {
    TracerProvider::builder()
        .with_config(sdktrace::Config::default().with_resource(resource))
        .build()
}

/// Install the console log handler as the global `tracing` subscriber.
///
/// Only the first call in a process installs anything. Returns `false` when
/// another subscriber was already installed by the host application.
///
/// # Arguments
///
/// * `log_level` - `EnvFilter` directive, e.g. `info` or `info,agent_observe=debug`
/// * `format` - Text or JSON lines
/// * `tracer` - Tracer for the `tracing` bridge layer
pub fn init_console_logging(log_level: &str, format: LogFormat, tracer: Option<Tracer>) -> bool {
    *CONSOLE_HANDLER.get_or_init(|| {
        let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

        let fmt_layer = match format {
            LogFormat::Text => tracing_subscriber::fmt::layer().with_target(true).boxed(),
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .boxed(),
        };

        let otel_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .with(otel_layer)
            .try_init()
            .is_ok()
    })
}

/// Number of console handlers this crate has installed (0 or 1).
#[must_use]
pub fn console_handler_count() -> usize {
    usize::from(CONSOLE_HANDLER.get().copied().unwrap_or(false))
}
