//! Test utilities for Agent Observe tests.
//!
//! Provides:
//! - In-memory telemetry harness (spans, optional metrics)
//! - Log line capture through a scoped `tracing` subscriber
//! - A plain HTTP collector stub that records OTLP requests

#![allow(dead_code)]

use agent_observe::{Observability, ServiceIdentity, Telemetry};
use opentelemetry::trace::{SpanId, TraceId};
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::metrics::data::{Histogram, ResourceMetrics, Sum};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::runtime;
use opentelemetry_sdk::testing::metrics::InMemoryMetricsExporter;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::TracerProvider;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing_subscriber::fmt::MakeWriter;

/// Observability client wired to in-memory exporters.
pub struct Harness {
    pub obs: Observability,
    pub spans: InMemorySpanExporter,
    pub metrics: Option<InMemoryMetricsExporter>,
    pub meter_provider: Option<SdkMeterProvider>,
}

impl Harness {
    /// Spans only; no runtime needed.
    pub fn new(service_name: &str) -> Self {
        let spans = InMemorySpanExporter::default();
        let telemetry = Telemetry::new(identity(service_name), tracer_provider(&spans));
        Self {
            obs: Observability::with_telemetry(service_name, Arc::new(telemetry)),
            spans,
            metrics: None,
            meter_provider: None,
        }
    }

    /// Spans plus run metrics. Must be called inside a multi-thread Tokio runtime.
    pub fn with_metrics(service_name: &str) -> Self {
        let spans = InMemorySpanExporter::default();
        let metrics = InMemoryMetricsExporter::default();
        let reader = PeriodicReader::builder(metrics.clone(), runtime::Tokio).build();
        let meter_provider = SdkMeterProvider::builder().with_reader(reader).build();

        let telemetry = Telemetry::new(identity(service_name), tracer_provider(&spans))
            .with_meter_provider(meter_provider.clone());

        Self {
            obs: Observability::with_telemetry(service_name, Arc::new(telemetry)),
            spans,
            metrics: Some(metrics),
            meter_provider: Some(meter_provider),
        }
    }

    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.spans.get_finished_spans().expect("span exporter poisoned")
    }

    /// The single finished span called `name`.
    pub fn span_named(&self, name: &str) -> SpanData {
        let mut matching: Vec<SpanData> = self
            .finished_spans()
            .into_iter()
            .filter(|span| span.name == name)
            .collect();
        assert_eq!(matching.len(), 1, "expected exactly one span named {name}");
        matching.remove(0)
    }

    /// Push recorded metrics into the in-memory exporter and return them.
    pub fn collect_metrics(&self) -> Vec<ResourceMetrics> {
        self.meter_provider
            .as_ref()
            .expect("harness built without metrics")
            .force_flush()
            .expect("metrics flush failed");
        self.metrics
            .as_ref()
            .expect("harness built without metrics")
            .get_finished_metrics()
            .expect("metrics exporter poisoned")
    }
}

fn identity(service_name: &str) -> ServiceIdentity {
    ServiceIdentity::new(service_name, Some("test-instance".into()))
}

fn tracer_provider(exporter: &InMemorySpanExporter) -> TracerProvider {
    TracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build()
}

/// Sum of all data points of the u64 counter `name`, with attribute `key=value`.
pub fn counter_value(metrics: &[ResourceMetrics], name: &str, key: &str, value: &str) -> u64 {
    let mut total = 0;
    for resource in metrics {
        for scope in &resource.scope_metrics {
            for metric in scope.metrics.iter().filter(|m| m.name == name) {
                if let Some(sum) = metric.data.as_any().downcast_ref::<Sum<u64>>() {
                    total += sum
                        .data_points
                        .iter()
                        .filter(|point| has_attribute(&point.attributes, key, value))
                        .map(|point| point.value)
                        .sum::<u64>();
                }
            }
        }
    }
    total
}

/// Number of observations in the f64 histogram `name`.
pub fn histogram_count(metrics: &[ResourceMetrics], name: &str) -> u64 {
    let mut total = 0;
    for resource in metrics {
        for scope in &resource.scope_metrics {
            for metric in scope.metrics.iter().filter(|m| m.name == name) {
                if let Some(histogram) = metric.data.as_any().downcast_ref::<Histogram<f64>>() {
                    total += histogram
                        .data_points
                        .iter()
                        .map(|point| point.count)
                        .sum::<u64>();
                }
            }
        }
    }
    total
}

fn has_attribute(attributes: &[opentelemetry::KeyValue], key: &str, value: &str) -> bool {
    attributes
        .iter()
        .any(|kv| kv.key.as_str() == key && kv.value.as_str() == value)
}

/// Names of a span's events, in attachment order.
pub fn event_names(span: &SpanData) -> Vec<String> {
    span.events
        .events
        .iter()
        .map(|event| event.name.to_string())
        .collect()
}

/// String value of a span attribute.
pub fn span_attribute(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.as_str().into_owned())
}

pub fn is_root(span: &SpanData) -> bool {
    span.parent_span_id == SpanId::INVALID
}

pub fn trace_id(span: &SpanData) -> TraceId {
    span.span_context.trace_id()
}

/// Captures formatted log lines written through a scoped subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain-text INFO subscriber writing into this buffer.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish()
    }

    pub fn lines(&self) -> Vec<String> {
        let buffer = self.buffer.lock().expect("log buffer poisoned");
        String::from_utf8_lossy(&buffer)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Lines containing `needle`.
    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.contains(needle))
            .collect()
    }
}

pub struct CapturedWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .expect("log buffer poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// One HTTP request received by [`CollectorStub`].
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    /// Header names lowercased.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// OTLP/HTTP collector stand-in answering every request with `200 OK`.
///
/// Runs on plain threads so it keeps serving while a test's runtime thread
/// is blocked in shutdown.
pub struct CollectorStub {
    port: u16,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl CollectorStub {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind collector stub");
        let port = listener.local_addr().expect("stub address").port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let sink = Arc::clone(&sink);
                thread::spawn(move || serve_connection(stream, &sink));
            }
        });

        Self { port, requests }
    }

    /// Base URL with a trailing slash, as users often configure it.
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().expect("stub requests poisoned").clone()
    }

    /// Requests to `path` that carried a non-empty body.
    pub fn exports_to(&self, path: &str) -> Vec<CapturedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path == path && !request.body.is_empty())
            .collect()
    }
}

fn serve_connection(stream: TcpStream, sink: &Mutex<Vec<CapturedRequest>>) {
    let Ok(write_half) = stream.try_clone() else {
        return;
    };
    let mut writer = write_half;
    let mut reader = BufReader::new(stream);

    // Keep-alive: serve requests until the client closes the connection.
    while let Some(request) = read_request(&mut reader) {
        sink.lock().expect("stub requests poisoned").push(request);
        let response = b"HTTP/1.1 200 OK\r\nContent-Type: application/x-protobuf\r\nContent-Length: 0\r\n\r\n";
        if writer.write_all(response).and_then(|()| writer.flush()).is_err() {
            return;
        }
    }
}

fn read_request(reader: &mut BufReader<TcpStream>) -> Option<CapturedRequest> {
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).ok()? == 0 {
        return None;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0; length];
    reader.read_exact(&mut body).ok()?;

    Some(CapturedRequest {
        method,
        path,
        headers,
        body,
    })
}
