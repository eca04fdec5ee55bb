//! Agent Observe: OpenTelemetry tracing and run records for LLM agent calls.
//!
//! Wraps a single agent invocation in a span, times the underlying model
//! call, annotates lifecycle events and logs one run summary per call.
//! Spans are exported over OTLP/HTTP in background batches; metrics and log
//! records can be switched on for collectors that accept them.
//!
//! # Architecture
//!
//! - **Bootstrap once**: process-wide providers behind a check-and-skip guard
//! - **Scoped spans**: always ended, parented by the active context
//! - **Dual-write**: every annotation is a span event and a log line
//! - **Side-channel only**: telemetry never fails or alters the wrapped call
//!
//! # Modules
//!
//! - [`attributes`]: Attribute maps for spans, logs and metrics
//! - [`client`]: The [`Observability`] client
//! - [`config`]: Environment and CLI configuration
//! - [`invocation`]: The standard instrumented agent call pattern
//! - [`observability`]: OTLP pipelines and the console log handler
//! - [`resource`]: Service identity
//! - [`run`]: Run summaries
//! - [`span`]: Scoped spans
//! - [`telemetry`]: Process-wide bootstrap and shutdown
//! - [`timer`]: Monotonic timing
//!
//! # Example
//!
//! ```no_run
//! use agent_observe::{Attributes, Observability, RunRecord};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let obs = Observability::new("crewai-agent");
//! let attrs = Attributes::new().with("framework", "CrewAI");
//!
//! obs.in_span("crew.run", &attrs, |_| {
//!     obs.annotate("crew_start", &Attributes::new().with("prompt", "hi"));
//!     let timed = obs.timed(|| "answer");
//!     obs.record_run(&RunRecord::new(timed.elapsed_ms, None, true, attrs.clone()));
//! });
//!
//! obs.shutdown();
//! # }
//! ```

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // run::RunRecord is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]

pub mod attributes;
pub mod client;
pub mod config;
pub mod error;
pub mod invocation;
pub mod observability;
pub mod resource;
pub mod run;
pub mod span;
pub mod telemetry;
pub mod timer;

pub use attributes::Attributes;
pub use client::Observability;
pub use config::{parse_headers, ExporterConfig, ExporterKind, LogFormat, ObservabilityConfig};
pub use error::ObservabilityError;
pub use invocation::{AgentRun, Completion, ErrorDescriptor};
pub use observability::tracing::console_handler_count;
pub use resource::ServiceIdentity;
pub use run::RunRecord;
pub use span::{SpanHandle, SpanScope};
pub use telemetry::{bootstrap, shutdown, Telemetry};
pub use timer::{timed, timed_async, Timed, Timer};
