//! Configuration for the observability client.
//!
//! Supports:
//! - Standard `OTEL_*` environment variables
//! - CLI arguments via clap (flatten into a driver's own parser)
//! - Builder methods for programmatic setup

use clap::{Parser, ValueEnum};
use std::collections::HashMap;
use std::time::Duration;

use crate::resource::ServiceIdentity;

/// Collector base URL used when `OTEL_EXPORTER_OTLP_ENDPOINT` is unset.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:6006";

const ENV_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const ENV_HEADERS: &str = "OTEL_EXPORTER_OTLP_HEADERS";
const ENV_INSTANCE_ID: &str = "SERVICE_INSTANCE_ID";
const ENV_METRICS_EXPORTER: &str = "OTEL_METRICS_EXPORTER";
const ENV_LOGS_EXPORTER: &str = "OTEL_LOGS_EXPORTER";
const ENV_METRIC_EXPORT_INTERVAL: &str = "OTEL_METRIC_EXPORT_INTERVAL";
const ENV_LOG_LEVEL: &str = "RUST_LOG";
const ENV_LOG_FORMAT: &str = "AGENT_OBSERVE_LOG_FORMAT";
const ENV_SHUTDOWN_TIMEOUT: &str = "AGENT_OBSERVE_SHUTDOWN_TIMEOUT_MS";

/// Service name used when a caller passes an empty one.
pub const UNKNOWN_SERVICE: &str = "unknown_service";

/// Whether an optional signal is exported.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExporterKind {
    /// Signal is not exported.
    #[default]
    #[value(name = "none")]
    Disabled,
    /// Signal is exported over OTLP/HTTP.
    Otlp,
}

impl ExporterKind {
    #[must_use]
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Otlp)
    }
}

/// Console log line format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// OTLP signal types and their HTTP paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Traces,
    Metrics,
    Logs,
}

impl Signal {
    /// Path appended to the base endpoint.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Traces => "/v1/traces",
            Self::Metrics => "/v1/metrics",
            Self::Logs => "/v1/logs",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Traces => "traces",
            Self::Metrics => "metrics",
            Self::Logs => "logs",
        }
    }
}

/// Observability settings for one process.
#[derive(Parser, Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name reported as `service.name`; supplied by the caller
    #[arg(skip)]
    pub service_name: String,

    /// OTLP collector base URL (signal paths are appended)
    #[arg(long = "otlp-endpoint", env = "OTEL_EXPORTER_OTLP_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Extra export headers as comma-separated key=value pairs
    #[arg(
        long = "otlp-headers",
        env = "OTEL_EXPORTER_OTLP_HEADERS",
        default_value = "",
        value_parser = parse_header_arg
    )]
    pub headers: HashMap<String, String>,

    /// Fixed service instance id (random UUID when unset)
    #[arg(long, env = "SERVICE_INSTANCE_ID")]
    pub instance_id: Option<String>,

    /// Metrics exporter (none, otlp)
    #[arg(long, env = "OTEL_METRICS_EXPORTER", value_enum, default_value_t = ExporterKind::Disabled)]
    pub metrics_exporter: ExporterKind,

    /// Logs exporter (none, otlp)
    #[arg(long, env = "OTEL_LOGS_EXPORTER", value_enum, default_value_t = ExporterKind::Disabled)]
    pub logs_exporter: ExporterKind,

    /// Metric export period in milliseconds
    #[arg(long = "metric-export-interval-ms", env = "OTEL_METRIC_EXPORT_INTERVAL", default_value_t = 10_000)]
    pub metric_export_interval_ms: u64,

    /// Log level filter (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Console log format
    #[arg(long, env = "AGENT_OBSERVE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Upper bound on how long shutdown waits for buffered telemetry
    #[arg(long = "shutdown-timeout-ms", env = "AGENT_OBSERVE_SHUTDOWN_TIMEOUT_MS", default_value_t = 5_000)]
    pub shutdown_timeout_ms: u64,

    #[arg(skip)]
    env_problems: Vec<String>,
}

impl ObservabilityConfig {
    /// Create a configuration with defaults for the given service.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    /// Build from environment variables only.
    ///
    /// Never fails; see [`from_lookup`](Self::from_lookup).
    pub fn from_env(service_name: impl Into<String>) -> Self {
        Self::from_lookup(service_name, |name| std::env::var(name).ok())
    }

    /// Build from any variable source, e.g. a map in tests.
    ///
    /// Each variable is read on its own. An unparseable value keeps that
    /// field's default and is recorded in [`env_problems`](Self::env_problems),
    /// which bootstrap logs once the console handler is installed.
    pub fn from_lookup(
        service_name: impl Into<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut config = Self::new(service_name);
        let mut problems = Vec::new();

        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        if let Some(raw) = lookup(ENV_HEADERS) {
            config.headers = parse_headers(&raw);
        }
        config.instance_id = lookup(ENV_INSTANCE_ID).filter(|id| !id.trim().is_empty());

        let kind = |raw: &str| <ExporterKind as ValueEnum>::from_str(raw, true);
        let millis = |raw: &str| raw.parse::<u64>().map_err(|e| e.to_string());

        if let Some(value) = env_value(&lookup, ENV_METRICS_EXPORTER, kind, &mut problems) {
            config.metrics_exporter = value;
        }
        if let Some(value) = env_value(&lookup, ENV_LOGS_EXPORTER, kind, &mut problems) {
            config.logs_exporter = value;
        }
        if let Some(value) = env_value(&lookup, ENV_METRIC_EXPORT_INTERVAL, millis, &mut problems) {
            config.metric_export_interval_ms = value;
        }
        if let Some(value) = env_value(&lookup, ENV_SHUTDOWN_TIMEOUT, millis, &mut problems) {
            config.shutdown_timeout_ms = value;
        }
        if let Some(value) = env_value(
            &lookup,
            ENV_LOG_FORMAT,
            |raw| <LogFormat as ValueEnum>::from_str(raw, true),
            &mut problems,
        ) {
            config.log_format = value;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|level| !level.trim().is_empty()) {
            config.log_level = level;
        }

        config.env_problems = problems;
        config
    }

    /// Environment values that were ignored, one message each.
    #[must_use]
    pub fn env_problems(&self) -> &[String] {
        &self.env_problems
    }

    /// Set the collector base URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Replace headers with those parsed from a `k=v,k2=v2` string.
    pub fn with_headers(mut self, raw: &str) -> Self {
        self.headers = parse_headers(raw);
        self
    }

    /// Pin `service.instance.id` instead of generating one.
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Enable or disable metrics export.
    pub fn with_metrics(mut self, kind: ExporterKind) -> Self {
        self.metrics_exporter = kind;
        self
    }

    /// Enable or disable OTLP log export.
    pub fn with_logs(mut self, kind: ExporterKind) -> Self {
        self.logs_exporter = kind;
        self
    }

    /// Set the console log format.
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Bound how long shutdown waits for buffered telemetry.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    #[must_use]
    pub fn metric_export_interval(&self) -> Duration {
        Duration::from_millis(self.metric_export_interval_ms)
    }

    /// Endpoint and headers shared by every exporter.
    #[must_use]
    pub fn exporter_config(&self) -> ExporterConfig {
        ExporterConfig::new(&self.endpoint, self.headers.clone())
    }

    /// Resource identity for this process.
    #[must_use]
    pub fn identity(&self) -> ServiceIdentity {
        ServiceIdentity::new(&self.service_name, self.instance_id.clone())
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: UNKNOWN_SERVICE.into(),
            endpoint: DEFAULT_ENDPOINT.into(),
            headers: HashMap::new(),
            instance_id: None,
            metrics_exporter: ExporterKind::Disabled,
            logs_exporter: ExporterKind::Disabled,
            metric_export_interval_ms: 10_000,
            log_level: "info".into(),
            log_format: LogFormat::Text,
            shutdown_timeout_ms: 5_000,
            env_problems: Vec::new(),
        }
    }
}

/// Collector endpoint plus request headers, fixed after bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterConfig {
    endpoint: String,
    headers: HashMap<String, String>,
}

impl ExporterConfig {
    /// Trailing slashes are stripped; a blank endpoint means [`DEFAULT_ENDPOINT`].
    pub fn new(endpoint: &str, headers: HashMap<String, String>) -> Self {
        let endpoint = endpoint.trim().trim_end_matches('/');
        let endpoint = if endpoint.is_empty() {
            DEFAULT_ENDPOINT
        } else {
            endpoint
        };
        Self {
            endpoint: endpoint.to_string(),
            headers,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Full URL for one signal, e.g. `{endpoint}/v1/traces`.
    #[must_use]
    pub fn signal_url(&self, signal: Signal) -> String {
        format!("{}{}", self.endpoint, signal.path())
    }
}

/// Parse OTLP headers from a string like `key=value,foo=bar`.
///
/// Keys and values are trimmed. Entries without `=` or with an empty key are
/// skipped; only the first `=` splits, so values may contain `=`.
pub fn parse_headers(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Read and parse one optional variable. Blank values count as unset.
fn env_value<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Result<T, String>,
    problems: &mut Vec<String>,
) -> Option<T> {
    let raw = lookup(name)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match parse(trimmed) {
        Ok(value) => Some(value),
        Err(e) => {
            problems.push(format!("ignoring {name}={trimmed:?}: {e}"));
            None
        }
    }
}

#[allow(clippy::unnecessary_wraps)]
fn parse_header_arg(raw: &str) -> Result<HashMap<String, String>, String> {
    Ok(parse_headers(raw))
}
