//! Error types for telemetry setup and teardown.
//!
//! None of these reach the caller's invocation path: bootstrap and shutdown
//! log them and carry on.

use thiserror::Error;

/// Errors raised while building or tearing down telemetry pipelines.
#[derive(Error, Debug)]
pub enum ObservabilityError {
    /// An OTLP exporter or provider could not be built.
    #[error("failed to build {signal} exporter: {message}")]
    Exporter {
        signal: &'static str,
        message: String,
    },

    /// Configuration could not be read.
    #[error("configuration error: {0}")]
    Config(String),

    /// Flushing or shutting down a provider failed or timed out.
    #[error("shutdown failed: {0}")]
    Shutdown(String),
}

impl ObservabilityError {
    pub(crate) fn exporter(signal: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Exporter {
            signal,
            message: err.to_string(),
        }
    }
}
