//! Process-wide telemetry state.
//!
//! [`bootstrap`] builds the providers once per process and hands out a shared
//! [`Telemetry`] handle; later calls return the same handle. [`shutdown`]
//! flushes whatever was built and is a no-op before bootstrap.

use opentelemetry::global;
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::logs::LoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{Tracer, TracerProvider};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::config::ObservabilityConfig;
use crate::error::ObservabilityError;
use crate::observability::logs::{build_logger_provider, LogEmitter};
use crate::observability::metrics::{build_meter_provider, RunMetrics};
use crate::observability::BatchRuntime;
use crate::observability::tracing::{
    build_tracer_provider, init_console_logging, local_tracer_provider,
};
use crate::resource::ServiceIdentity;

/// Global telemetry instance.
static TELEMETRY: OnceLock<Arc<Telemetry>> = OnceLock::new();

/// Default bound on shutdown flushing.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Tracer, meter and logger providers for one process.
pub struct Telemetry {
    identity: ServiceIdentity,
    tracer_provider: TracerProvider,
    meter_provider: Option<SdkMeterProvider>,
    logger_provider: Option<LoggerProvider>,
    shutdown_timeout: Duration,
    shut_down: AtomicBool,
}

impl Telemetry {
    /// Wrap caller-built providers. Nothing is registered globally.
    pub fn new(identity: ServiceIdentity, tracer_provider: TracerProvider) -> Self {
        Self {
            identity,
            tracer_provider,
            meter_provider: None,
            logger_provider: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Enable run metrics through `provider`.
    pub fn with_meter_provider(mut self, provider: SdkMeterProvider) -> Self {
        self.meter_provider = Some(provider);
        self
    }

    /// Enable OTLP log records through `provider`.
    pub fn with_logger_provider(mut self, provider: LoggerProvider) -> Self {
        self.logger_provider = Some(provider);
        self
    }

    /// Bound how long [`shutdown`](Self::shutdown) waits for the flush.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Build providers from configuration, degrading instead of failing.
    ///
    /// Returns the problems met along the way so they can be logged once a
    /// subscriber is installed.
    fn from_config(config: &ObservabilityConfig) -> (Self, Vec<ObservabilityError>) {
        let identity = config.identity();
        let exporter = config.exporter_config();
        let resource = identity.resource();
        let mut problems: Vec<ObservabilityError> = config
            .env_problems()
            .iter()
            .map(|problem| ObservabilityError::Config(problem.clone()))
            .collect();

        let batch_runtime = BatchRuntime::detect();

        let tracer_provider = match batch_runtime {
            Some(rt) => build_tracer_provider(&exporter, resource.clone(), rt).unwrap_or_else(|e| {
                problems.push(e);
                local_tracer_provider(resource.clone())
            }),
            None => {
                problems.push(ObservabilityError::Config(
                    "no Tokio runtime running; spans will not be exported".into(),
                ));
                local_tracer_provider(resource.clone())
            }
        };

        let mut telemetry = Self::new(identity, tracer_provider)
            .with_shutdown_timeout(config.shutdown_timeout());

        let Some(rt) = batch_runtime else {
            return (telemetry, problems);
        };

        if config.metrics_exporter.is_enabled() {
            match build_meter_provider(&exporter, resource.clone(), config.metric_export_interval(), rt) {
                Ok(provider) => telemetry.meter_provider = Some(provider),
                Err(e) => problems.push(e),
            }
        }

        if config.logs_exporter.is_enabled() {
            match build_logger_provider(&exporter, resource, rt) {
                Ok(provider) => telemetry.logger_provider = Some(provider),
                Err(e) => problems.push(e),
            }
        }

        (telemetry, problems)
    }

    #[must_use]
    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    #[must_use]
    pub fn tracer_provider(&self) -> &TracerProvider {
        &self.tracer_provider
    }

    /// Tracer scoped to `name`.
    #[must_use]
    pub fn tracer(&self, name: &str) -> Tracer {
        self.tracer_provider.tracer(name.to_string())
    }

    #[must_use]
    pub fn metrics_enabled(&self) -> bool {
        self.meter_provider.is_some()
    }

    #[must_use]
    pub fn logs_enabled(&self) -> bool {
        self.logger_provider.is_some()
    }

    /// Run instruments, when metrics are enabled.
    pub(crate) fn run_metrics(&self) -> Option<RunMetrics> {
        self.meter_provider
            .as_ref()
            .map(|provider| RunMetrics::new(&provider.meter("agent_observe")))
    }

    /// Log record emitter, when log export is enabled.
    pub(crate) fn log_emitter(&self, service_name: &str) -> Option<LogEmitter> {
        self.logger_provider
            .as_ref()
            .map(|provider| LogEmitter::new(provider, service_name))
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Flush and shut down every provider.
    ///
    /// Work runs on a helper thread and is abandoned after the configured
    /// timeout, so this never blocks indefinitely and is safe to call from
    /// inside a Tokio runtime. Only the first call does anything.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            tracing::debug!("Telemetry already shut down");
            return;
        }

        let tracer_provider = self.tracer_provider.clone();
        let meter_provider = self.meter_provider.clone();
        let logger_provider = self.logger_provider.clone();
        let (tx, rx) = mpsc::channel();

        let spawned = std::thread::Builder::new()
            .name("telemetry-shutdown".into())
            .spawn(move || {
                let problems = flush_and_shutdown(
                    &tracer_provider,
                    meter_provider.as_ref(),
                    logger_provider.as_ref(),
                );
                let _ = tx.send(problems);
            });

        if let Err(e) = spawned {
            tracing::warn!(error = %e, "Failed to spawn telemetry shutdown thread");
            return;
        }

        match rx.recv_timeout(self.shutdown_timeout) {
            Ok(problems) => {
                for problem in problems {
                    tracing::warn!(error = %problem, "Telemetry shutdown problem");
                }
                tracing::debug!("Telemetry flushed and shut down");
            }
            Err(_) => {
                // The helper thread is detached, not joined; it exits once the
                // exporters give up.
                tracing::warn!(
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    helper_thread = "telemetry-shutdown",
                    "Telemetry shutdown timed out; buffered signals may be lost and the flush thread is left running"
                );
            }
        }
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("identity", &self.identity)
            .field("metrics_enabled", &self.metrics_enabled())
            .field("logs_enabled", &self.logs_enabled())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

fn flush_and_shutdown(
    tracer_provider: &TracerProvider,
    meter_provider: Option<&SdkMeterProvider>,
    logger_provider: Option<&LoggerProvider>,
) -> Vec<ObservabilityError> {
    let mut problems = Vec::new();
    let mut note = |what: &str, err: &dyn std::fmt::Display| {
        problems.push(ObservabilityError::Shutdown(format!("{what}: {err}")));
    };

    for result in tracer_provider.force_flush() {
        if let Err(e) = result {
            note("trace flush", &e);
        }
    }
    if let Err(e) = tracer_provider.shutdown() {
        note("trace shutdown", &e);
    }

    if let Some(provider) = meter_provider {
        if let Err(e) = provider.force_flush() {
            note("metrics flush", &e);
        }
        if let Err(e) = provider.shutdown() {
            note("metrics shutdown", &e);
        }
    }

    if let Some(provider) = logger_provider {
        for result in provider.force_flush() {
            if let Err(e) = result {
                note("logs flush", &e);
            }
        }
        if let Err(e) = provider.shutdown() {
            note("logs shutdown", &e);
        }
    }

    problems
}

/// Initialize process-wide telemetry.
///
/// The first call builds the providers, registers them as the OpenTelemetry
/// globals and installs the console log handler. Later calls skip all of that
/// and return the existing handle, so exporters and handlers are never
/// duplicated. Never fails: problems are logged and the affected signal is
/// left local.
pub fn bootstrap(config: &ObservabilityConfig) -> Arc<Telemetry> {
    let mut problems = None;
    let telemetry = TELEMETRY
        .get_or_init(|| {
            let (telemetry, found) = Telemetry::from_config(config);
            problems = Some(found);
            Arc::new(telemetry)
        })
        .clone();

    let Some(problems) = problems else {
        tracing::debug!(
            service.name = %config.service_name,
            "Telemetry already initialized, reusing providers"
        );
        return telemetry;
    };

    global::set_tracer_provider(telemetry.tracer_provider.clone());
    if let Some(provider) = &telemetry.meter_provider {
        global::set_meter_provider(provider.clone());
    }

    let service_name = telemetry.identity.service_name().to_string();
    let installed = init_console_logging(
        &config.log_level,
        config.log_format,
        Some(telemetry.tracer(&service_name)),
    );
    if !installed {
        tracing::debug!("A tracing subscriber was already installed; console handler skipped");
    }

    for problem in problems {
        tracing::warn!(error = %problem, "Telemetry degraded");
    }

    let exporter = config.exporter_config();
    tracing::info!(
        service.name = %service_name,
        service.instance.id = %telemetry.identity.instance_id(),
        otlp.endpoint = %exporter.endpoint(),
        metrics = telemetry.metrics_enabled(),
        logs = telemetry.logs_enabled(),
        "Telemetry initialized"
    );

    telemetry
}

/// The process-wide telemetry, if [`bootstrap`] has run.
#[must_use]
pub fn global_telemetry() -> Option<Arc<Telemetry>> {
    TELEMETRY.get().cloned()
}

/// Flush and shut down the process-wide telemetry.
///
/// Safe to call without a prior bootstrap and more than once.
pub fn shutdown() {
    match TELEMETRY.get() {
        Some(telemetry) => telemetry.shutdown(),
        None => tracing::debug!("No telemetry to shut down"),
    }
}
