//! OpenTelemetry pipeline construction.
//!
//! Provides:
//! - OTLP/HTTP span export and the console log handler
//! - Optional OTLP metrics for agent runs
//! - Optional OTLP log records mirroring console lines

pub mod logs;
pub mod metrics;
pub mod tracing;

use tokio::runtime::{Handle, RuntimeFlavor};

/// Where batch processors and periodic readers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchRuntime {
    /// Tasks on the caller's multi-thread Tokio runtime.
    MultiThread,
    /// A dedicated background thread, for current-thread runtimes whose only
    /// worker may be blocked in shutdown.
    CurrentThread,
}

impl BatchRuntime {
    /// Flavor of the Tokio runtime entered on this thread, if any.
    #[must_use]
    pub fn detect() -> Option<Self> {
        let handle = Handle::try_current().ok()?;
        Some(match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => Self::CurrentThread,
            _ => Self::MultiThread,
        })
    }
}
