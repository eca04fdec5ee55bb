//! OTLP log records.
//!
//! When log export is enabled, every annotation and run record is also
//! emitted as an OpenTelemetry log record. The SDK logger stamps the active
//! span's trace context onto each record.

use opentelemetry::logs::{AnyValue, LogRecord as _, Logger as _, LoggerProvider as _, Severity};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::logs::{Logger, LoggerProvider};
use opentelemetry_sdk::{runtime, Resource};
use std::time::SystemTime;

use super::BatchRuntime;
use crate::attributes::Attributes;
use crate::config::{ExporterConfig, Signal};
use crate::error::ObservabilityError;

/// Build a logger provider exporting batches to `{endpoint}/v1/logs`.
pub fn build_logger_provider(
    exporter: &ExporterConfig,
    resource: Resource,
    batch_runtime: BatchRuntime,
) -> Result<LoggerProvider, ObservabilityError> {
    let log_exporter = opentelemetry_otlp::new_exporter()
        .http()
        .with_endpoint(exporter.signal_url(Signal::Logs))
        .with_headers(exporter.headers().clone());

    let pipeline = opentelemetry_otlp::new_pipeline()
        .logging()
        .with_resource(resource)
        .with_exporter(log_exporter);

    let provider = match batch_runtime {
        BatchRuntime::MultiThread => pipeline.install_batch(runtime::Tokio),
        BatchRuntime::CurrentThread => pipeline.install_batch(runtime::TokioCurrentThread),
    };
    provider.map_err(|e| ObservabilityError::exporter(Signal::Logs.as_str(), e))
}

/// Emits INFO log records on behalf of one service.
pub struct LogEmitter {
    logger: Logger,
}

impl LogEmitter {
    pub fn new(provider: &LoggerProvider, service_name: &str) -> Self {
        Self {
            logger: provider.logger(service_name.to_string()),
        }
    }

    /// Emit `message` with `attributes` as an INFO record.
    pub fn emit(&self, message: &str, attributes: &Attributes) {
        let mut record = self.logger.create_log_record();
        record.set_timestamp(SystemTime::now());
        record.set_severity_number(Severity::Info);
        record.set_body(AnyValue::from(message.to_string()));
        for (key, value) in attributes.to_log_attributes() {
            record.add_attribute(key, value);
        }
        self.logger.emit(record);
    }
}
